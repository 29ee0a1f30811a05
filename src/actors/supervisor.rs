//! SupervisorActor - Owns the VES agent and reacts to topology changes
//!
//! ## Message Flow
//!
//! ```text
//! Webhook → TopologyChanged → query xApp status → write config → restart agent
//!                                   │ fails
//!                                   └→ kill agent, Terminating
//! Agent exit ─┬─ Terminating → write config (last good topology) → start agent, Normal
//!             └─ Normal      → fatal, run() returns Err
//! ```
//!
//! All triggers go through one `select!` so state is only touched by this task.
//! Commands are processed strictly one after another: a notification arriving during a
//! restart waits until the restart has finished. While the loop waits on the xApp
//! manager, liveness probes are still answered and a shutdown aborts the wait; every
//! other command is kept in arrival order for later.

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::agent_config::{AgentConfiguration, CollectorConfiguration};
use crate::appmgr::ModuleManager;
use crate::error::SupervisorError;
use crate::process::{AgentCommand, AgentExit, AgentProcess};
use crate::rules::extract_rules;

use super::messages::{LIVENESS_OK, SupervisorCommand, SupervisorState, SupervisorStatus};

const MAILBOX_CAPACITY: usize = 64;

/// Whether the loop keeps serving after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Result of a manager call raced against the mailbox
enum Waited<T> {
    Done(T),
    Shutdown(oneshot::Sender<()>),
}

/// What the supervisor needs to run the agent
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub agent_command: AgentCommand,

    /// Agent configuration file, replaced on every rebuild
    pub config_file: PathBuf,

    /// Our webhook URL registered with the xApp manager
    pub callback_url: String,
}

/// Actor driving the supervision state machine
pub struct SupervisorActor<M> {
    manager: M,
    settings: SupervisorSettings,

    /// Command receiver for notifications, probes and queries
    command_rx: mpsc::Receiver<SupervisorCommand>,

    /// Commands received while waiting on the manager, handled before the mailbox
    deferred: VecDeque<SupervisorCommand>,

    state: SupervisorState,

    /// Current agent instance, until its exit event has been consumed
    agent: Option<AgentProcess>,

    /// Last successfully fetched xApp descriptor
    topology: Vec<u8>,

    subscription_id: Option<String>,
    agent_starts: u64,
    rule_count: usize,
    last_config_write: Option<DateTime<Utc>>,
}

impl<M: ModuleManager> SupervisorActor<M> {
    /// Create the actor and the handle feeding its mailbox
    pub fn new(manager: M, settings: SupervisorSettings) -> (Self, SupervisorHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(MAILBOX_CAPACITY);

        let actor = Self {
            manager,
            settings,
            command_rx: cmd_rx,
            deferred: VecDeque::new(),
            state: SupervisorState::Normal,
            agent: None,
            topology: Vec::new(),
            subscription_id: None,
            agent_starts: 0,
            rule_count: 0,
            last_config_write: None,
        };

        (actor, SupervisorHandle { sender: cmd_tx })
    }

    /// Run the supervisor until shutdown or a fatal condition.
    ///
    /// Subscribes to notifications (blocking until accepted), writes the initial
    /// configuration, starts the agent and then serves events. Returns `Err` for the
    /// fatal conditions: subscription failure, unsolicited agent exit, config write failure.
    #[instrument(skip(self), name = "supervisor")]
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        if self.bootstrap().await? == Flow::Stop {
            debug!("supervisor stopped during startup");
            return Ok(());
        }

        loop {
            let flow = tokio::select! {
                command = next_command(&mut self.deferred, &mut self.command_rx) => match command {
                    Some(command) => self.handle_command(command).await?,
                    None => {
                        warn!("command channel closed, shutting down");
                        self.stop_agent().await;
                        Flow::Stop
                    }
                },

                exit = next_exit(&mut self.agent) => {
                    self.handle_agent_exit(exit)?;
                    Flow::Continue
                }
            };

            if flow == Flow::Stop {
                break;
            }
        }

        debug!("supervisor stopped");
        Ok(())
    }

    async fn bootstrap(&mut self) -> Result<Flow, SupervisorError> {
        info!(
            "waiting for xApp notification subscription ({})",
            self.settings.callback_url
        );
        let subscribed = answer_liveness_until(
            self.manager.subscribe(&self.settings.callback_url),
            &mut self.command_rx,
            &mut self.deferred,
        )
        .await;
        let id = match subscribed {
            Waited::Done(result) => result.map_err(|e| {
                error!("failed to make xApp subscription: {e}");
                SupervisorError::Subscription(e)
            })?,
            Waited::Shutdown(respond_to) => return Ok(self.shutdown(respond_to).await),
        };
        self.subscription_id = Some(id);

        let fetched = answer_liveness_until(
            self.manager.fetch_status(),
            &mut self.command_rx,
            &mut self.deferred,
        )
        .await;
        match fetched {
            Waited::Done(Ok(topology)) => self.topology = topology,
            Waited::Done(Err(e)) => {
                warn!("initial xApp status query failed, starting agent without metric rules: {e}")
            }
            Waited::Shutdown(respond_to) => return Ok(self.shutdown(respond_to).await),
        }

        self.write_config()?;
        self.start_agent();
        self.state = SupervisorState::Normal;
        Ok(Flow::Continue)
    }

    async fn handle_command(
        &mut self,
        command: SupervisorCommand,
    ) -> Result<Flow, SupervisorError> {
        let flow = match command {
            SupervisorCommand::TopologyChanged { event } => {
                info!(
                    "xApp notification received (event: {})",
                    event.as_deref().unwrap_or("unknown")
                );
                self.handle_topology_change().await?
            }

            SupervisorCommand::Liveness { respond_to } => {
                debug!("liveness probe");
                let _ = respond_to.send(LIVENESS_OK);
                Flow::Continue
            }

            SupervisorCommand::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status());
                Flow::Continue
            }

            SupervisorCommand::Shutdown { respond_to } => self.shutdown(respond_to).await,
        };
        Ok(flow)
    }

    async fn shutdown(&mut self, respond_to: oneshot::Sender<()>) -> Flow {
        info!("received shutdown command");
        self.stop_agent().await;
        let _ = respond_to.send(());
        Flow::Stop
    }

    async fn handle_topology_change(&mut self) -> Result<Flow, SupervisorError> {
        let fetched = answer_liveness_until(
            self.manager.fetch_status(),
            &mut self.command_rx,
            &mut self.deferred,
        )
        .await;
        let fetched = match fetched {
            Waited::Done(result) => result,
            Waited::Shutdown(respond_to) => return Ok(self.shutdown(respond_to).await),
        };

        match fetched {
            Ok(topology) => {
                self.topology = topology;
                match self.state {
                    SupervisorState::Normal => {
                        self.write_config()?;
                        self.restart_agent().await;
                    }
                    SupervisorState::Terminating => {
                        debug!("agent is terminating, new topology is applied on its exit");
                    }
                }
            }
            Err(e) => match self.state {
                SupervisorState::Normal => {
                    error!(
                        "xApp status query failed, stopping agent until topology is available: {e}"
                    );
                    self.kill_agent();
                    self.state = SupervisorState::Terminating;
                }
                SupervisorState::Terminating => {
                    warn!("xApp status query failed while agent is terminating: {e}");
                }
            },
        }
        Ok(Flow::Continue)
    }

    fn handle_agent_exit(&mut self, exit: AgentExit) -> Result<(), SupervisorError> {
        self.agent = None;

        match self.state {
            SupervisorState::Terminating => {
                info!("agent exited ({exit}), restarting with latest configuration");
                self.write_config()?;
                self.start_agent();
                self.state = SupervisorState::Normal;
                Ok(())
            }
            SupervisorState::Normal => {
                error!("agent exited: {exit}");
                Err(SupervisorError::AgentExited(exit.to_string()))
            }
        }
    }

    /// Rebuild the agent configuration from the last good topology and persist it
    fn write_config(&mut self) -> Result<(), SupervisorError> {
        let rules = extract_rules(&self.topology);
        let config = AgentConfiguration::build(&rules, CollectorConfiguration::from_env());

        config.persist(&self.settings.config_file).map_err(|e| {
            error!(
                "cannot write agent configuration to {}: {e}",
                self.settings.config_file.display()
            );
            SupervisorError::ConfigWrite(e)
        })?;

        self.rule_count = rules.len();
        self.last_config_write = Some(Utc::now());
        Ok(())
    }

    fn start_agent(&mut self) {
        self.agent = Some(AgentProcess::start(&self.settings.agent_command));
        self.agent_starts += 1;
    }

    fn kill_agent(&mut self) {
        if let Some(agent) = self.agent.as_mut()
            && let Err(e) = agent.kill()
        {
            warn!("cannot kill agent: {e}");
        }
    }

    /// Kill the agent and wait for its exit; never leaves two agents running
    async fn stop_agent(&mut self) {
        if let Some(mut agent) = self.agent.take() {
            if let Err(e) = agent.kill() {
                warn!("cannot kill agent: {e}");
            }
            let exit = agent.exited().await;
            info!("agent stopped: {exit}");
        }
    }

    async fn restart_agent(&mut self) {
        self.stop_agent().await;
        self.start_agent();
    }

    fn status(&self) -> SupervisorStatus {
        SupervisorStatus {
            state: self.state,
            agent_pid: self.agent.as_ref().and_then(AgentProcess::pid),
            agent_started_at: self.agent.as_ref().map(AgentProcess::started_at),
            agent_starts: self.agent_starts,
            subscription_id: self.subscription_id.clone(),
            rule_count: self.rule_count,
            last_config_write: self.last_config_write,
        }
    }
}

/// Next command to handle: deferred ones first, then the mailbox
async fn next_command(
    deferred: &mut VecDeque<SupervisorCommand>,
    command_rx: &mut mpsc::Receiver<SupervisorCommand>,
) -> Option<SupervisorCommand> {
    match deferred.pop_front() {
        Some(command) => Some(command),
        None => command_rx.recv().await,
    }
}

/// Drive `work` to completion while answering liveness probes from the mailbox.
///
/// A shutdown abandons `work`. Any other command is deferred in arrival order.
async fn answer_liveness_until<F: Future>(
    work: F,
    command_rx: &mut mpsc::Receiver<SupervisorCommand>,
    deferred: &mut VecDeque<SupervisorCommand>,
) -> Waited<F::Output> {
    tokio::pin!(work);
    let mut mailbox_open = true;

    loop {
        tokio::select! {
            output = &mut work => return Waited::Done(output),

            command = command_rx.recv(), if mailbox_open => match command {
                Some(SupervisorCommand::Liveness { respond_to }) => {
                    debug!("liveness probe while waiting on xApp manager");
                    let _ = respond_to.send(LIVENESS_OK);
                }
                Some(SupervisorCommand::Shutdown { respond_to }) => {
                    return Waited::Shutdown(respond_to);
                }
                Some(command) => deferred.push_back(command),
                None => mailbox_open = false,
            },
        }
    }
}

/// Exit event of the current agent; pending while there is none
async fn next_exit(agent: &mut Option<AgentProcess>) -> AgentExit {
    match agent {
        Some(agent) => agent.exited().await,
        None => std::future::pending().await,
    }
}

/// Handle for controlling the SupervisorActor
///
/// Cloneable; used by the HTTP handlers and the binary.
#[derive(Clone)]
pub struct SupervisorHandle {
    sender: mpsc::Sender<SupervisorCommand>,
}

impl SupervisorHandle {
    /// Create the actor, spawn it as a tokio task and return a handle plus the task
    pub fn spawn<M: ModuleManager>(
        manager: M,
        settings: SupervisorSettings,
    ) -> (Self, JoinHandle<Result<(), SupervisorError>>) {
        let (actor, handle) = SupervisorActor::new(manager, settings);
        let task = tokio::spawn(actor.run());
        (handle, task)
    }

    /// Report a topology change notification
    pub async fn notify_topology_changed(&self, event: Option<String>) -> Result<()> {
        self.sender
            .send(SupervisorCommand::TopologyChanged { event })
            .await
            .context("failed to send TopologyChanged command")
    }

    /// Liveness probe through the event loop
    pub async fn liveness(&self) -> Result<&'static str> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorCommand::Liveness { respond_to: tx })
            .await
            .context("failed to send Liveness command")?;

        rx.await.context("failed to receive liveness response")
    }

    pub async fn status(&self) -> Result<SupervisorStatus> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorCommand::GetStatus { respond_to: tx })
            .await
            .context("failed to send GetStatus command")?;

        rx.await.context("failed to receive status")
    }

    /// Stop the agent and the supervisor loop
    pub async fn shutdown(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SupervisorCommand::Shutdown { respond_to: tx })
            .await
            .context("failed to send Shutdown command")?;

        rx.await.context("failed to receive shutdown confirmation")
    }
}
