//! Integration tests for the HTTP surface
//!
//! These tests verify that:
//! - Probes are answered through the supervision loop
//! - Webhook deliveries trigger a re-query, even with unparseable bodies
//! - A stopped loop is reported as unavailable

use std::net::SocketAddr;

use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use vesmgr::{
    AppmgrClient, SupervisorError, SupervisorHandle,
    api::{ApiConfig, ApiState, NotificationAck, spawn_api_server},
};
use wiremock::MockServer;

use crate::helpers::*;

const NOTIFICATION_PATH: &str = "/vesmgr_xappnotif/";

struct TestApi {
    addr: SocketAddr,
    handle: SupervisorHandle,
    task: JoinHandle<Result<(), SupervisorError>>,
    _server: MockServer,
    _dir: TempDir,
}

impl TestApi {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

// Helper to create test API server in front of a running supervisor
async fn spawn_test_api() -> TestApi {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1", "counter2"]), None).await;

    let dir = tempfile::tempdir().unwrap();
    let (handle, task) = SupervisorHandle::spawn(
        AppmgrClient::new(&appmgr_config(&server, 2)),
        supervisor_settings(&dir, "sleep", &["30"]),
    );

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(), // Random port
        notification_path: NOTIFICATION_PATH.to_string(),
    };
    let addr = spawn_api_server(config, ApiState::new(handle.clone()))
        .await
        .unwrap();

    TestApi {
        addr,
        handle,
        task,
        _server: server,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_alive_returns_ok() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/ric/v1/health/alive")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "OK");

    api.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_ready_when_agent_running() {
    let api = spawn_test_api().await;

    let response = reqwest::get(api.url("/ric/v1/health/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ready"], true);
    assert_eq!(body["state"], "normal");

    api.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_status_endpoint() {
    let api = spawn_test_api().await;

    let body: Value = reqwest::get(api.url("/ric/v1/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["state"], "normal");
    assert_eq!(body["subscription_id"], "sub");
    assert_eq!(body["rule_count"], 2);
    assert_eq!(body["agent_starts"], 1);

    api.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notification_triggers_restart() {
    let api = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .post(api.url(NOTIFICATION_PATH))
        .json(&serde_json::json!({
            "id": "sub",
            "version": 3,
            "eventType": "deployed",
            "xApps": "[]"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack: NotificationAck = response.json().await.unwrap();
    assert_eq!(ack.status, "accepted");

    let status = api.handle.status().await.unwrap();
    assert_eq!(status.agent_starts, 2);

    api.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unparseable_notification_still_triggers() {
    let api = spawn_test_api().await;

    let response = reqwest::Client::new()
        .post(api.url(NOTIFICATION_PATH))
        .body("definitely not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(api.handle.status().await.unwrap().agent_starts, 2);

    api.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_stopped_supervisor_is_unavailable() {
    let api = spawn_test_api().await;
    let alive_url = api.url("/ric/v1/health/alive");

    api.handle.shutdown().await.unwrap();
    api.task.await.unwrap().unwrap();

    let response = reqwest::get(alive_url).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}
