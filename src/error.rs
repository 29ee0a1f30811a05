//! Error types for supervisor operations

use thiserror::Error;

/// Errors talking to the module manager (xApp manager)
#[derive(Debug, Error)]
pub enum AppmgrError {
    /// Transport failure (connect, timeout, TLS)
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Unexpected HTTP status code
    #[error("unexpected status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// Response body could not be read
    #[error("failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response succeeded but carried no data
    #[error("empty response body from {url}")]
    EmptyResponse { url: String },

    /// Response body could not be interpreted
    #[error("invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },
}

/// Errors controlling the agent child process
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// The agent was never started or its kill was already requested
    #[error("agent process is not running")]
    NotRunning,

    /// The agent exited before the kill request reached it
    #[error("agent process (pid {pid:?}) already exited")]
    AlreadyExited { pid: Option<u32> },
}

/// Errors rendering or persisting the agent configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render agent configuration: {0}")]
    Render(#[from] serde_yaml::Error),

    #[error("failed to replace {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: tempfile::PersistError,
    },
}

/// Conditions that terminate the supervisor
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("subscription to module manager notifications failed: {0}")]
    Subscription(#[source] AppmgrError),

    #[error("agent exited unexpectedly: {0}")]
    AgentExited(String),

    #[error("cannot write agent configuration: {0}")]
    ConfigWrite(#[source] ConfigError),

    #[error("supervisor mailbox closed")]
    MailboxClosed,
}
