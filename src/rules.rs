//! Metric rule extraction from xApp descriptors
//!
//! The module manager returns a JSON array with one object per deployed xApp. Each
//! xApp may expose counters under `config.metrics`:
//!
//! ```json
//! [
//!   { "name": "xapp-a",
//!     "config": {
//!       "metrics": [
//!         { "name": "UEContextCreated", "objectName": "UEContext", "objectInstance": "SgNB" }
//!       ]
//!     }
//!   }
//! ]
//! ```
//!
//! Descriptors are written by independently deployed xApps, so parsing is lenient:
//! malformed JSON yields an empty set and incomplete entries are skipped.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, trace};

/// A metric exposed by some xApp, before it is rendered into an agent rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRuleCandidate {
    pub name: String,
    pub object_name: String,
    pub object_instance: String,
}

/// Identity of the object a metric is reported under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSource {
    pub object_name: String,
    pub object_instance: String,
}

/// Deduplicated metric name -> source mapping
///
/// At most one entry per metric name; the first one seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<String, MetricSource>,

    /// Names dropped because an earlier entry already claimed them
    skipped_duplicates: Vec<String>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate unless its name is already present.
    ///
    /// Returns `false` (and records the skip) for duplicates.
    pub fn insert(&mut self, candidate: MetricRuleCandidate) -> bool {
        if self.rules.contains_key(&candidate.name) {
            self.record_duplicate(candidate.name);
            return false;
        }

        info!(
            "parsed counter {} {} {}",
            candidate.name, candidate.object_name, candidate.object_instance
        );
        self.rules.insert(
            candidate.name,
            MetricSource {
                object_name: candidate.object_name,
                object_instance: candidate.object_instance,
            },
        );
        true
    }

    fn record_duplicate(&mut self, name: String) {
        info!("skipped duplicate counter {name}");
        self.skipped_duplicates.push(name);
    }

    pub fn get(&self, name: &str) -> Option<&MetricSource> {
        self.rules.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricSource)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn skipped_duplicates(&self) -> &[String] {
        &self.skipped_duplicates
    }
}

/// Extract the metric rule set from a module descriptor payload.
///
/// Never fails. Accepts either the array form (one object per xApp, metrics under
/// `config.metrics`) or a single object carrying a top-level `metrics` list.
pub fn extract_rules(descriptor: &[u8]) -> RuleSet {
    let mut rules = RuleSet::new();

    let tree: Value = match serde_json::from_slice(descriptor) {
        Ok(tree) => tree,
        Err(e) => {
            if !descriptor.is_empty() {
                debug!("ignoring undecodable xApp descriptor: {e}");
            }
            return rules;
        }
    };

    match &tree {
        Value::Array(apps) => {
            for app in apps {
                if let Some(metrics) = app
                    .get("config")
                    .and_then(|config| config.get("metrics"))
                    .and_then(Value::as_array)
                {
                    collect_metrics(metrics, &mut rules);
                }
            }
        }
        Value::Object(object) => {
            if let Some(metrics) = object.get("metrics").and_then(Value::as_array) {
                collect_metrics(metrics, &mut rules);
            }
        }
        _ => trace!("xApp descriptor is neither an array nor an object"),
    }

    rules
}

fn collect_metrics(entries: &[Value], rules: &mut RuleSet) {
    for entry in entries {
        // A claimed name is a duplicate even when the repeat is incomplete
        if let Some(name) = entry.get("name").and_then(Value::as_str)
            && rules.get(name).is_some()
        {
            rules.record_duplicate(name.to_string());
            continue;
        }

        match candidate_from_entry(entry) {
            Some(candidate) => {
                rules.insert(candidate);
            }
            None => trace!("skipping incomplete metric entry: {entry}"),
        }
    }
}

/// Read one `{name, objectName, objectInstance}` entry; all three must be strings.
fn candidate_from_entry(entry: &Value) -> Option<MetricRuleCandidate> {
    let field = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_owned);

    Some(MetricRuleCandidate {
        name: field("name")?,
        object_name: field("objectName")?,
        object_instance: field("objectInstance")?,
    })
}
