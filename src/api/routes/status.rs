//! Supervisor status endpoint

use axum::{Json, extract::State};

use crate::actors::messages::SupervisorStatus;
use crate::api::{error::ApiResult, state::ApiState};

/// GET /ric/v1/status
pub async fn get_status(State(state): State<ApiState>) -> ApiResult<Json<SupervisorStatus>> {
    Ok(Json(state.supervisor.status().await?))
}
