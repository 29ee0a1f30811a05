//! API request/response types

use serde::{Deserialize, Serialize};

/// Notification body posted by the xApp manager
///
/// Only used for logging; the supervisor re-queries the full status either way.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XappNotification {
    pub id: Option<String>,
    pub version: Option<i64>,
    pub event_type: Option<String>,
}

/// Acknowledgement returned to the xApp manager
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationAck {
    pub status: String,
}

/// Readiness probe body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub state: String,
    pub timestamp: String,
}
