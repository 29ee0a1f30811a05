//! API shared state

use crate::actors::supervisor::SupervisorHandle;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Mailbox of the supervision loop
    pub supervisor: SupervisorHandle,
}

impl ApiState {
    pub fn new(supervisor: SupervisorHandle) -> Self {
        Self { supervisor }
    }
}
