//! Message types for supervisor communication
//!
//! Everything that can change supervisor state (webhook deliveries, probes, shutdown)
//! arrives as a [`SupervisorCommand`] on one mpsc mailbox. Queries carry a oneshot
//! channel for the reply.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;

/// Reply to a liveness probe
pub const LIVENESS_OK: &str = "OK";

/// Commands that can be sent to the SupervisorActor
#[derive(Debug)]
pub enum SupervisorCommand {
    /// The xApp manager reported a topology change
    ///
    /// The payload itself is not trusted; the supervisor re-queries the manager.
    TopologyChanged {
        /// Event type from the notification, when it could be parsed
        event: Option<String>,
    },

    /// Liveness probe, always answered with [`LIVENESS_OK`]
    Liveness {
        respond_to: oneshot::Sender<&'static str>,
    },

    /// Get a snapshot of the supervisor state
    GetStatus {
        respond_to: oneshot::Sender<SupervisorStatus>,
    },

    /// Kill the agent, wait for it to exit and stop the loop
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Supervision state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SupervisorState {
    /// Agent runs with a configuration derived from fresh topology
    Normal,

    /// Topology could not be fetched; the agent was killed and its exit is awaited
    Terminating,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupervisorState::Normal => write!(f, "normal"),
            SupervisorState::Terminating => write!(f, "terminating"),
        }
    }
}

/// Point-in-time view of the supervisor
#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub state: SupervisorState,

    /// Pid of the current agent, if one is running
    pub agent_pid: Option<u32>,

    /// When the current agent was launched
    pub agent_started_at: Option<DateTime<Utc>>,

    /// Number of agent launches (including failed ones)
    pub agent_starts: u64,

    pub subscription_id: Option<String>,

    /// Monitoring rules in the last written configuration
    pub rule_count: usize,

    pub last_config_write: Option<DateTime<Utc>>,
}

impl SupervisorStatus {
    /// Ready means telemetry is being collected
    pub fn is_ready(&self) -> bool {
        self.state == SupervisorState::Normal && self.agent_pid.is_some()
    }
}
