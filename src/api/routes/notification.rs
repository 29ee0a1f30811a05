//! xApp notification webhook

use axum::{Json, body::Bytes, extract::State};
use tracing::{debug, instrument, warn};

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{NotificationAck, XappNotification},
};

/// POST <notification path>
///
/// Any delivery triggers a re-query, including ones whose body cannot be parsed.
#[instrument(skip_all)]
pub async fn xapp_notification(
    State(state): State<ApiState>,
    body: Bytes,
) -> ApiResult<Json<NotificationAck>> {
    let notification = match serde_json::from_slice::<XappNotification>(&body) {
        Ok(notification) => {
            debug!("xApp notification: {notification:?}");
            notification
        }
        Err(e) => {
            warn!("cannot parse xApp notification ({} bytes): {e}", body.len());
            XappNotification::default()
        }
    };

    state
        .supervisor
        .notify_topology_changed(notification.event_type)
        .await?;

    Ok(Json(NotificationAck {
        status: "accepted".to_string(),
    }))
}
