//! End-to-end supervision: real xApp manager client against a mock, real agent processes

use std::time::Duration;

use vesmgr::{AppmgrClient, SupervisorHandle, SupervisorState};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_startup_writes_config_and_starts_agent() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub-42").await;
    mount_status(&server, &descriptor(&["counter1", "counter2"]), None).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = supervisor_settings(&dir, "sleep", &["30"]);
    let config_file = settings.config_file.clone();
    let (handle, task) =
        SupervisorHandle::spawn(AppmgrClient::new(&appmgr_config(&server, 3)), settings);

    let status = handle.status().await.unwrap();
    assert_eq!(status.state, SupervisorState::Normal);
    assert_eq!(status.subscription_id.as_deref(), Some("sub-42"));
    assert_eq!(status.agent_starts, 1);
    assert_eq!(status.rule_count, 2);
    assert!(status.agent_pid.is_some());

    let written = std::fs::read_to_string(&config_file).unwrap();
    assert!(written.contains("counter1"));
    assert!(written.contains("counter2"));

    handle.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_notification_restarts_agent_with_new_rules() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1"]), Some(1)).await;
    mount_status(&server, &descriptor(&["counter1", "counter2", "counter3"]), None).await;

    let dir = tempfile::tempdir().unwrap();
    let settings = supervisor_settings(&dir, "sleep", &["30"]);
    let config_file = settings.config_file.clone();
    let (handle, task) =
        SupervisorHandle::spawn(AppmgrClient::new(&appmgr_config(&server, 3)), settings);

    let before = handle.status().await.unwrap();
    assert_eq!(before.rule_count, 1);

    handle
        .notify_topology_changed(Some("deployed".to_string()))
        .await
        .unwrap();
    let after = handle.status().await.unwrap();

    assert_eq!(after.state, SupervisorState::Normal);
    assert_eq!(after.rule_count, 3);
    assert_eq!(after.agent_starts, 2);
    assert_ne!(after.agent_pid, before.agent_pid);
    assert!(std::fs::read_to_string(&config_file).unwrap().contains("counter3"));

    handle.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_failed_query_suspends_and_recovers_agent() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1"]), Some(1)).await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let settings = supervisor_settings(&dir, "sleep", &["30"]);
    let config_file = settings.config_file.clone();
    let (handle, task) =
        SupervisorHandle::spawn(AppmgrClient::new(&appmgr_config(&server, 2)), settings);

    let before = handle.status().await.unwrap();
    std::fs::remove_file(&config_file).unwrap();

    handle.notify_topology_changed(None).await.unwrap();

    // Agent killed, its exit brings it back with the last good topology
    let after = wait_for_status(&handle, |status| {
        status.agent_starts == 2 && status.state == SupervisorState::Normal
    })
    .await;

    assert_ne!(after.agent_pid, before.agent_pid);
    assert!(after.agent_pid.is_some());
    assert_eq!(after.rule_count, 1);
    assert!(std::fs::read_to_string(&config_file).unwrap().contains("counter1"));
    // One initial query plus the bounded attempts of the failed one
    assert_eq!(status_requests(&server).await, 3);

    handle.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_notifications_are_processed_one_at_a_time() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1"]), None).await;

    let dir = tempfile::tempdir().unwrap();
    let (handle, task) = SupervisorHandle::spawn(
        AppmgrClient::new(&appmgr_config(&server, 3)),
        supervisor_settings(&dir, "sleep", &["30"]),
    );

    for _ in 0..3 {
        handle.notify_topology_changed(None).await.unwrap();
    }
    let status = handle.status().await.unwrap();

    assert_eq!(status.agent_starts, 4);
    assert_eq!(status.state, SupervisorState::Normal);
    assert_eq!(status_requests(&server).await, 4);

    handle.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_shutdown_stops_agent() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&[]), None).await;

    let dir = tempfile::tempdir().unwrap();
    let (handle, task) = SupervisorHandle::spawn(
        AppmgrClient::new(&appmgr_config(&server, 1)),
        supervisor_settings(&dir, "sleep", &["30"]),
    );

    assert!(handle.status().await.unwrap().is_ready());
    handle.shutdown().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert!(handle.status().await.is_err(), "loop must be gone after shutdown");
}

#[tokio::test]
async fn test_liveness_answered_during_slow_status_query() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1"]), Some(1)).await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(descriptor(&["counter1", "counter2"]))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (handle, task) = SupervisorHandle::spawn(
        AppmgrClient::new(&appmgr_config(&server, 3)),
        supervisor_settings(&dir, "sleep", &["30"]),
    );
    wait_for_status(&handle, |status| status.agent_starts == 1).await;

    handle.notify_topology_changed(None).await.unwrap();
    let reply = tokio::time::timeout(Duration::from_millis(400), handle.liveness())
        .await
        .expect("liveness probe waited for the status query")
        .unwrap();
    assert_eq!(reply, "OK");

    // Status stays ordered behind the notification
    let status = handle.status().await.unwrap();
    assert_eq!(status.rule_count, 2);
    assert_eq!(status.agent_starts, 2);

    handle.shutdown().await.unwrap();
    assert!(task.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_shutdown_interrupts_status_query() {
    let server = MockServer::start().await;
    mount_subscription(&server, "sub").await;
    mount_status(&server, &descriptor(&["counter1"]), Some(1)).await;
    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(descriptor(&["counter1"]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (handle, task) = SupervisorHandle::spawn(
        AppmgrClient::new(&appmgr_config(&server, 1)),
        supervisor_settings(&dir, "sleep", &["30"]),
    );
    let before = wait_for_status(&handle, |status| status.agent_pid.is_some()).await;
    assert!(before.agent_started_at.is_some());

    handle.notify_topology_changed(None).await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("shutdown waited for the status query")
        .unwrap();

    assert!(task.await.unwrap().is_ok());
}
