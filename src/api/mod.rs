//! HTTP surface of the supervisor
//!
//! The xApp manager delivers topology notifications here, and the platform probes
//! liveness/readiness. Handlers never touch supervisor state: each request becomes a
//! command on the supervisor mailbox.
//!
//! ## Endpoints
//!
//! - `POST <notification path>` - xApp topology notification (webhook)
//! - `GET /ric/v1/health/alive` - Liveness, answered by the event loop
//! - `GET /ric/v1/health/ready` - Readiness, 503 while telemetry is suspended
//! - `GET /ric/v1/status` - Supervisor status snapshot

pub mod error;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::{NotificationAck, XappNotification};

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::NotificationConfig;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Path the xApp manager posts notifications to
    pub notification_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&NotificationConfig::default())
    }
}

impl From<&NotificationConfig> for ApiConfig {
    fn from(config: &NotificationConfig) -> Self {
        Self {
            bind_addr: SocketAddr::new(config.bind, config.port),
            notification_path: config.path.clone(),
        }
    }
}

pub fn router(config: &ApiConfig, state: ApiState) -> Router {
    Router::new()
        .route(
            &config.notification_path,
            post(routes::notification::xapp_notification),
        )
        .route("/ric/v1/health/alive", get(routes::health::alive))
        .route("/ric/v1/health/ready", get(routes::health::ready))
        .route("/ric/v1/status", get(routes::status::get_status))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(&config, state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!(
        "API server listening on {addr}, notifications at {}",
        config.notification_path
    );

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
