//! Lifecycle supervisor for the VES telemetry agent
//!
//! Discovers the deployed xApps through the xApp manager, derives the agent
//! configuration from the metrics they expose, and keeps exactly one agent running
//! with a configuration that matches the current topology.

pub mod actors;
pub mod agent_config;
pub mod api;
pub mod appmgr;
pub mod config;
pub mod error;
pub mod process;
pub mod rules;
pub mod util;

pub use actors::messages::{SupervisorState, SupervisorStatus};
pub use actors::supervisor::{SupervisorActor, SupervisorHandle, SupervisorSettings};
pub use agent_config::{AgentConfiguration, CollectorConfiguration, MonitoringRule};
pub use appmgr::{AppmgrClient, ModuleManager};
pub use error::{AppmgrError, ConfigError, ProcessError, SupervisorError};
pub use process::{AgentCommand, AgentExit, AgentProcess};
pub use rules::{MetricRuleCandidate, MetricSource, RuleSet, extract_rules};
