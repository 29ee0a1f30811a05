//! Supervised agent child process
//!
//! [`AgentProcess::start`] never fails: a spawn error is reported through the same exit
//! channel as a regular exit, so the supervisor handles "failed to start" and "started
//! then exited" identically.
//!
//! Each process instance delivers exactly one [`AgentExit`]. A background task owns the
//! child, waits for it and performs kills on request.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::error::ProcessError;

/// Program and arguments used to launch the agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl AgentCommand {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How an agent process instance ended
#[derive(Debug)]
pub enum ExitOutcome {
    /// The process ran and exited (or was killed)
    Exited(ExitStatus),

    /// The process could not be spawned
    StartFailed(String),

    /// Waiting on the process failed
    WaitFailed(String),
}

/// The single exit event of one agent process instance
#[derive(Debug)]
pub struct AgentExit {
    pub pid: Option<u32>,
    pub outcome: ExitOutcome,
}

impl AgentExit {
    pub fn started(&self) -> bool {
        !matches!(self.outcome, ExitOutcome::StartFailed(_))
    }
}

impl fmt::Display for AgentExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pid = self
            .pid
            .map_or_else(|| "-".to_string(), |pid| pid.to_string());
        match &self.outcome {
            ExitOutcome::Exited(status) => write!(f, "pid {pid} exited with {status}"),
            ExitOutcome::StartFailed(e) => write!(f, "start failed: {e}"),
            ExitOutcome::WaitFailed(e) => write!(f, "pid {pid} wait failed: {e}"),
        }
    }
}

/// Handle to one running (or failed) agent instance
#[derive(Debug)]
pub struct AgentProcess {
    pid: Option<u32>,
    started_at: DateTime<Utc>,

    /// Asks the watcher task to kill the child; taken on first kill
    kill_tx: Option<oneshot::Sender<()>>,

    /// Exit event; cleared once delivered
    exit_rx: Option<oneshot::Receiver<AgentExit>>,
}

impl AgentProcess {
    /// Launch the agent with inherited stdout/stderr
    pub fn start(command: &AgentCommand) -> Self {
        let (exit_tx, exit_rx) = oneshot::channel();

        let spawned = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(child) => {
                let pid = child.id();
                info!("agent started with pid {pid:?}: {command}");

                let (kill_tx, kill_rx) = oneshot::channel();
                tokio::spawn(watch(child, pid, kill_rx, exit_tx));

                Self {
                    pid,
                    started_at: Utc::now(),
                    kill_tx: Some(kill_tx),
                    exit_rx: Some(exit_rx),
                }
            }
            Err(e) => {
                error!("agent start failed ({command}): {e}");
                let _ = exit_tx.send(AgentExit {
                    pid: None,
                    outcome: ExitOutcome::StartFailed(e.to_string()),
                });

                Self {
                    pid: None,
                    started_at: Utc::now(),
                    kill_tx: None,
                    exit_rx: Some(exit_rx),
                }
            }
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Request the process to be killed.
    ///
    /// Best effort: the exit event must still be awaited with [`AgentProcess::exited`].
    pub fn kill(&mut self) -> Result<(), ProcessError> {
        let kill_tx = self.kill_tx.take().ok_or(ProcessError::NotRunning)?;

        kill_tx
            .send(())
            .map_err(|_| ProcessError::AlreadyExited { pid: self.pid })
    }

    /// Wait for the exit event.
    ///
    /// Cancel safe. After the event has been returned once, the future never completes.
    pub async fn exited(&mut self) -> AgentExit {
        let pid = self.pid;
        let Some(exit_rx) = self.exit_rx.as_mut() else {
            return std::future::pending().await;
        };

        let exit = exit_rx.await.unwrap_or_else(|_| AgentExit {
            pid,
            outcome: ExitOutcome::WaitFailed("exit watcher dropped".to_string()),
        });

        self.exit_rx = None;
        self.kill_tx = None;
        exit
    }
}

async fn watch(
    mut child: Child,
    pid: Option<u32>,
    kill_rx: oneshot::Receiver<()>,
    exit_tx: oneshot::Sender<AgentExit>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        Ok(()) = kill_rx => {
            debug!("killing agent pid {pid:?}");
            if let Err(e) = child.start_kill() {
                warn!("cannot kill agent pid {pid:?}: {e}");
            }
            child.wait().await
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome::Exited(status),
        Err(e) => ExitOutcome::WaitFailed(e.to_string()),
    };

    if exit_tx.send(AgentExit { pid, outcome }).is_err() {
        debug!("agent pid {pid:?} exited with nobody listening");
    }
}
