use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use tracing::trace;

use crate::actors::supervisor::SupervisorSettings;
use crate::error::ConfigError;
use crate::process::AgentCommand;
use crate::util::env_var;

const HB_INTERVAL: &str = "VESMGR_HB_INTERVAL";
const MEAS_INTERVAL: &str = "VESMGR_MEAS_INTERVAL";
const PROMETHEUS_ADDR: &str = "VESMGR_PROMETHEUS_ADDR";
const ALERTMANAGER_BIND_ADDR: &str = "VESMGR_ALERTMANAGER_BIND_ADDR";
const APPMGR_HOST: &str = "VESMGR_APPMGR_HOST";

/// Supervisor configuration
///
/// Every section and field is optional in the file; missing values take defaults
/// matching a standard platform deployment.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub appmgr: AppmgrConfig,
    pub notification: NotificationConfig,
    pub agent: AgentConfig,
}

/// Where and how to reach the xApp manager
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AppmgrConfig {
    pub host: String,
    pub status_path: String,
    pub subscription_path: String,

    /// Attempt bound for status queries
    pub retries: usize,
    /// Fixed delay between status and subscription attempts
    pub retry_delay_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,

    /// Delivery retry settings requested from the manager for our webhook
    pub notification_max_retries: u32,
    pub notification_retry_timer: u32,
}

/// Inbound webhook / probe server
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub path: String,

    /// Host advertised to the manager; detected from the network interfaces when unset
    pub host: Option<String>,
}

/// The supervised VES agent
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub binary: String,
    pub config_file: PathBuf,
    pub hb_interval: String,
    pub meas_interval: String,
    pub prometheus_addr: String,
    pub alert_manager_bind: Option<String>,
    pub debug: bool,
}

impl Default for AppmgrConfig {
    fn default() -> Self {
        Self {
            host: "http://service-ricplt-appmgr-http.ricplt.svc.cluster.local:8080".to_string(),
            status_path: "/ric/v1/xapps".to_string(),
            subscription_path: "/ric/v1/subscriptions".to_string(),
            retries: 5,
            retry_delay_ms: 5000,
            timeout_secs: 10,
            notification_max_retries: 5,
            notification_retry_timer: 5,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            path: "/vesmgr_xappnotif/".to_string(),
            host: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            binary: "ves-agent".to_string(),
            config_file: PathBuf::from("/etc/ves-agent/ves-agent.yaml"),
            hb_interval: "60s".to_string(),
            meas_interval: "30s".to_string(),
            prometheus_addr: "http://r4-infrastructure-prometheus-server.ricplt".to_string(),
            alert_manager_bind: None,
            debug: true,
        }
    }
}

impl AppmgrConfig {
    pub fn status_url(&self) -> String {
        join_url(&self.host, &self.status_path)
    }

    pub fn subscription_url(&self) -> String {
        join_url(&self.host, &self.subscription_path)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl NotificationConfig {
    /// Webhook URL handed to the manager when subscribing
    pub fn target_url(&self, host: &str) -> String {
        format!("http://{host}:{}{}", self.port, self.path)
    }
}

impl AgentConfig {
    /// Command line the agent is launched with
    pub fn command(&self) -> AgentCommand {
        let mut args = vec![
            "-i".to_string(),
            self.hb_interval.clone(),
            "-m".to_string(),
            self.meas_interval.clone(),
        ];
        if self.debug {
            args.push("--Debug".to_string());
        }
        args.push("--Measurement.Prometheus.Address".to_string());
        args.push(self.prometheus_addr.clone());
        if let Some(bind) = &self.alert_manager_bind {
            args.push("--AlertManager.Bind".to_string());
            args.push(bind.clone());
        }

        AgentCommand::new(&self.binary, args)
    }
}

impl Config {
    /// Apply `VESMGR_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env_var);
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(HB_INTERVAL) {
            self.agent.hb_interval = value;
        }
        if let Some(value) = lookup(MEAS_INTERVAL) {
            self.agent.meas_interval = value;
        }
        if let Some(value) = lookup(PROMETHEUS_ADDR) {
            self.agent.prometheus_addr = value;
        }
        if let Some(value) = lookup(ALERTMANAGER_BIND_ADDR) {
            self.agent.alert_manager_bind = Some(value);
        }
        if let Some(value) = lookup(APPMGR_HOST) {
            self.appmgr.host = value;
        }
    }

    pub fn supervisor_settings(&self, callback_url: String) -> SupervisorSettings {
        SupervisorSettings {
            agent_command: self.agent.command(),
            config_file: self.agent.config_file.clone(),
            callback_url,
        }
    }
}

fn join_url(host: &str, path: &str) -> String {
    format!(
        "{}/{}",
        host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub fn read_config_file(path: &str) -> Result<Config, ConfigError> {
    let file_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&file_content)
        .map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
        .inspect(|config| trace!("loaded config: {config:?}"))
}
