//! Actor-based supervision
//!
//! The supervisor runs as a single async task owning all mutable state: the state
//! machine, the current agent process and the last good topology.
//!
//! ## Architecture Overview
//!
//! ```text
//!   xApp manager ──POST──▶ api (axum) ─┐
//!   kubelet probes ──GET──▶ api       ─┤ SupervisorCommand (mpsc)
//!   binary (signals) ─────────────────┘
//!                                      │
//!                           ┌──────────▼──────────┐
//!                           │  SupervisorActor    │──▶ AppmgrClient (status query)
//!                           │  Normal/Terminating │──▶ agent config file
//!                           └──────────▲──────────┘
//!                                      │ AgentExit (oneshot, once per instance)
//!                               ┌──────┴──────┐
//!                               │  ves-agent  │
//!                               └─────────────┘
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: the supervisor has one mpsc mailbox for notifications, probes and control
//! 2. **Exit events**: each agent instance resolves a oneshot exactly once
//! 3. **Request/Response**: oneshot channels for probe and status replies

pub mod messages;
pub mod supervisor;
