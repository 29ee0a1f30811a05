//! Helper functions for integration tests

use std::time::Duration;

use serde_json::{Value, json};
use tempfile::TempDir;
use vesmgr::{
    AgentCommand, SupervisorHandle, SupervisorSettings, SupervisorStatus, config::AppmgrConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STATUS_PATH: &str = "/ric/v1/xapps";
pub const SUBSCRIPTION_PATH: &str = "/ric/v1/subscriptions";

/// xApp descriptor exposing the given counters, one xApp per counter
pub fn descriptor(counters: &[&str]) -> Value {
    Value::Array(
        counters
            .iter()
            .map(|name| {
                json!({
                    "name": format!("xapp-{name}"),
                    "config": {
                        "metrics": [
                            {"name": name, "objectName": "obj", "objectInstance": "inst"}
                        ]
                    }
                })
            })
            .collect(),
    )
}

/// Client config pointing at the mock manager with short delays
pub fn appmgr_config(server: &MockServer, retries: usize) -> AppmgrConfig {
    AppmgrConfig {
        host: server.uri(),
        retries,
        retry_delay_ms: 10,
        timeout_secs: 2,
        ..Default::default()
    }
}

pub fn supervisor_settings(dir: &TempDir, program: &str, args: &[&str]) -> SupervisorSettings {
    SupervisorSettings {
        agent_command: AgentCommand::new(program, args.iter().copied()),
        config_file: dir.path().join("ves-agent.yaml"),
        callback_url: "http://127.0.0.1:8080/vesmgr_xappnotif/".to_string(),
    }
}

/// Accept subscriptions with the given id
pub async fn mount_subscription(server: &MockServer, id: &str) {
    Mock::given(method("POST"))
        .and(path(SUBSCRIPTION_PATH))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": id })))
        .mount(server)
        .await;
}

/// Serve `body` for status queries, optionally only for the first `times` queries
pub async fn mount_status(server: &MockServer, body: &Value, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(body));

    match times {
        Some(times) => mock.up_to_n_times(times).mount(server).await,
        None => mock.mount(server).await,
    }
}

pub async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path() == STATUS_PATH)
        .count()
}

/// Poll the supervisor until `predicate` holds or five seconds pass
pub async fn wait_for_status<F>(handle: &SupervisorHandle, predicate: F) -> SupervisorStatus
where
    F: Fn(&SupervisorStatus) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = handle.status().await.unwrap();
            if predicate(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("supervisor did not reach the expected status")
}
