//! Liveness and readiness probes

use axum::{Json, extract::State, http::StatusCode};

use crate::api::{error::ApiResult, state::ApiState, types::ReadinessResponse};

/// GET /ric/v1/health/alive
///
/// Answered by the supervision loop itself, so a wedged loop fails the probe
pub async fn alive(State(state): State<ApiState>) -> ApiResult<&'static str> {
    Ok(state.supervisor.liveness().await?)
}

/// GET /ric/v1/health/ready
pub async fn ready(
    State(state): State<ApiState>,
) -> ApiResult<(StatusCode, Json<ReadinessResponse>)> {
    let status = state.supervisor.status().await?;

    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    Ok((
        code,
        Json(ReadinessResponse {
            ready: status.is_ready(),
            state: status.state.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }),
    ))
}
