//! VES agent configuration document
//!
//! The agent reads a single YAML document at startup. It is derived from three parts:
//!
//! 1. a fixed base (event identity, naming codes, buffering windows)
//! 2. the monitoring rules rendered from the xApp metric [`RuleSet`]
//! 3. the primary collector endpoint taken from the `VESMGR_PRICOLLECTOR_*` environment
//!
//! The document is rewritten as a whole on every rebuild, through a temporary file in the
//! same directory that is renamed over the target.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use serde::{Serialize, Serializer};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::rules::RuleSet;

const PRICOLLECTOR_USER: &str = "VESMGR_PRICOLLECTOR_USER";
const PRICOLLECTOR_PASSWORD: &str = "VESMGR_PRICOLLECTOR_PASSWORD";
const PRICOLLECTOR_PASSPHRASE: &str = "VESMGR_PRICOLLECTOR_PASSPHRASE";
const PRICOLLECTOR_ADDR: &str = "VESMGR_PRICOLLECTOR_ADDR";
const PRICOLLECTOR_SERVERROOT: &str = "VESMGR_PRICOLLECTOR_SERVERROOT";
const PRICOLLECTOR_TOPIC: &str = "VESMGR_PRICOLLECTOR_TOPIC";
const PRICOLLECTOR_PORT: &str = "VESMGR_PRICOLLECTOR_PORT";
const PRICOLLECTOR_SECURE: &str = "VESMGR_PRICOLLECTOR_SECURE";

const DEFAULT_COLLECTOR_PORT: u16 = 8443;

/// Target kind for rules that add objects to the measurement event
pub const ADDITIONAL_OBJECTS_TARGET: &str = "AdditionalObjects";

/// Label carrying the platform-assigned name of the reporting component
pub const COMPONENT_NAME_LABEL: &str = "ricComponentName";
const COMPONENT_NAME_EXPR: &str = "'{{.labels.kubernetes_name}}'";
const VM_ID_EXPR: &str = "'{{.labels.instance}}'";

/// Root of the agent configuration document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfiguration {
    pub primary_collector: CollectorConfiguration,
    pub measurement: MeasurementConfiguration,
    pub event: EventConfiguration,
    pub debug: bool,
    #[serde(rename = "datadir")]
    pub data_dir: String,
}

/// Remote collector the agent forwards events to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorConfiguration {
    pub server_root: String,
    #[serde(rename = "fqdn")]
    pub address: String,
    pub port: u16,
    pub secure: bool,
    pub topic: String,
    pub user: String,
    pub password: String,
    #[serde(rename = "passphrase")]
    pub pass_phrase: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventConfiguration {
    pub vnf_name: String,
    pub reporting_entity_id: String,
    pub max_size: u64,
    pub nf_naming_code: String,
    pub nfc_naming_codes: Vec<NfcNamingCode>,
    #[serde(serialize_with = "serialize_go_duration")]
    pub retry_interval: Duration,
    pub max_missed: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NfcNamingCode {
    #[serde(rename = "type")]
    pub kind: String,
    pub vnfcs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementConfiguration {
    pub domain_abbreviation: String,
    #[serde(serialize_with = "serialize_go_duration")]
    pub max_buffering_duration: Duration,
    pub prometheus: PrometheusConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusConfiguration {
    #[serde(serialize_with = "serialize_go_duration")]
    pub timeout: Duration,
    #[serde(serialize_with = "serialize_go_duration")]
    pub keep_alive: Duration,
    pub rules: MetricRules,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRules {
    #[serde(rename = "defaults")]
    pub default_values: MonitoringRule,
    pub metrics: Vec<MonitoringRule>,
}

/// One rule telling the agent which metric to scrape and how to label it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitoringRule {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub expr: String,
    #[serde(rename = "vmId", skip_serializing_if = "String::is_empty")]
    pub vm_id_label: String,
    #[serde(rename = "object_name", skip_serializing_if = "String::is_empty")]
    pub object_name: String,
    #[serde(rename = "object_instance", skip_serializing_if = "String::is_empty")]
    pub object_instance: String,
    #[serde(rename = "object_keys", skip_serializing_if = "Vec::is_empty")]
    pub object_keys: Vec<Label>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
    pub expr: String,
}

impl MonitoringRule {
    /// Render an additional-objects rule for a single metric
    pub fn for_metric(name: &str, object_name: &str, object_instance: &str) -> Self {
        Self {
            target: ADDITIONAL_OBJECTS_TARGET.to_string(),
            expr: name.to_string(),
            object_name: object_name.to_string(),
            object_instance: object_instance.to_string(),
            object_keys: vec![Label {
                name: COMPONENT_NAME_LABEL.to_string(),
                expr: COMPONENT_NAME_EXPR.to_string(),
            }],
            ..Default::default()
        }
    }
}

impl CollectorConfiguration {
    /// Read the collector endpoint from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the collector endpoint through an arbitrary variable lookup.
    ///
    /// Missing strings default to empty, a missing or unparseable port to 8443, and
    /// `secure` is only set by the literal value `true`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str| lookup(key).unwrap_or_default();

        let port = lookup(PRICOLLECTOR_PORT)
            .filter(|port| !port.is_empty())
            .map_or(DEFAULT_COLLECTOR_PORT, |port| {
                port.trim().parse().unwrap_or(DEFAULT_COLLECTOR_PORT)
            });

        Self {
            server_root: string(PRICOLLECTOR_SERVERROOT),
            address: string(PRICOLLECTOR_ADDR),
            port,
            secure: lookup(PRICOLLECTOR_SECURE).as_deref() == Some("true"),
            topic: string(PRICOLLECTOR_TOPIC),
            user: string(PRICOLLECTOR_USER),
            password: string(PRICOLLECTOR_PASSWORD),
            pass_phrase: string(PRICOLLECTOR_PASSPHRASE),
        }
    }
}

impl AgentConfiguration {
    /// The static part of the document: everything except rules and collector
    pub fn base() -> Self {
        Self {
            primary_collector: CollectorConfiguration::from_lookup(|_| None),
            measurement: MeasurementConfiguration {
                domain_abbreviation: "Mvfs".to_string(),
                max_buffering_duration: Duration::from_secs(3600),
                prometheus: PrometheusConfiguration {
                    timeout: Duration::from_secs(30),
                    keep_alive: Duration::from_secs(30),
                    rules: MetricRules {
                        default_values: MonitoringRule {
                            vm_id_label: VM_ID_EXPR.to_string(),
                            ..Default::default()
                        },
                        metrics: Vec::new(),
                    },
                },
            },
            event: EventConfiguration {
                vnf_name: "vespa-demo".to_string(),
                reporting_entity_id: "1af5bfa9-40b4-4522-b045-40e54f0310f".to_string(),
                max_size: 2_000_000,
                nf_naming_code: "hsxp".to_string(),
                nfc_naming_codes: vec![
                    NfcNamingCode {
                        kind: "oam".to_string(),
                        vnfcs: vec![
                            "lr-ope-0".to_string(),
                            "lr-ope-1".to_string(),
                            "lr-ope-2".to_string(),
                        ],
                    },
                    NfcNamingCode {
                        kind: "etl".to_string(),
                        vnfcs: vec!["lr-pro-0".to_string(), "lr-pro-1".to_string()],
                    },
                ],
                retry_interval: Duration::from_secs(5),
                max_missed: 2,
            },
            debug: false,
            data_dir: "/tmp/data".to_string(),
        }
    }

    /// Combine the base document, the metric rules and the collector endpoint
    pub fn build(rules: &RuleSet, collector: CollectorConfiguration) -> Self {
        let mut config = Self::base();

        config.measurement.prometheus.rules.metrics = rules
            .iter()
            .map(|(name, source)| {
                MonitoringRule::for_metric(name, &source.object_name, &source.object_instance)
            })
            .collect();

        if config.measurement.prometheus.rules.metrics.is_empty() {
            info!("agent configuration has no metric rules");
        }

        config.primary_collector = collector;
        config
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Atomically replace `path` with the YAML rendering of this document
    pub fn persist(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = self.to_yaml()?;

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
        file.write_all(yaml.as_bytes()).map_err(io_error)?;
        file.as_file().sync_all().map_err(io_error)?;
        file.persist(path).map_err(|source| ConfigError::Persist {
            path: path.display().to_string(),
            source,
        })?;

        debug!(
            "wrote agent configuration to {} ({} rules)",
            path.display(),
            self.measurement.prometheus.rules.metrics.len()
        );
        Ok(())
    }
}

/// Render a duration the way Go's `time.Duration.String` does for whole seconds
fn go_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

fn serialize_go_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&go_duration(*duration))
}
