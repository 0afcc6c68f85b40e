//! Read-only control-plane endpoints.

use crate::prelude::{start_daemon, touch};
use serde_json::json;

#[tokio::test]
async fn health_reports_ok() {
    let d = start_daemon(|_| {}).await;

    let body: serde_json::Value = d
        .client
        .get(d.url("/api/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn status_reports_counters_and_monitored_set() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");
    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t"}]}))
        .send()
        .await
        .unwrap();

    let body: serde_json::Value = d
        .client
        .get(d.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["node_ip"], "10.0.0.7");
    assert_eq!(body["monitored_files"], 2);
    assert_eq!(body["suppression"]["enabled"], false);
    assert_eq!(body["outbox"]["len"], 0);
    assert!(body["events"]["lines_seen"].is_u64());
}

#[tokio::test]
async fn config_endpoint_serves_persisted_shape() {
    let d = start_daemon(|_| {}).await;

    let body: serde_json::Value = d
        .client
        .get(d.url("/api/config"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let files = body["monitoring"]["log_files"].as_array().unwrap();
    assert!(files
        .iter()
        .any(|f| f["label"] == "resolvix_daemon" && f["auto_monitor"] == true));
}

#[tokio::test]
async fn reload_without_external_changes_is_a_noop() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");
    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t"}]}))
        .send()
        .await
        .unwrap();

    let before: serde_json::Value = d
        .client
        .get(d.url("/api/monitored-files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let reload = d
        .client
        .post(d.url("/api/config/reload"))
        .send()
        .await
        .unwrap();
    assert_eq!(reload.status(), 200);
    let body: serde_json::Value = reload.json().await.unwrap();
    assert_eq!(body["reloaded"], true);

    let after: serde_json::Value = d
        .client
        .get(d.url("/api/monitored-files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before["count"], after["count"]);
}

#[tokio::test]
async fn processes_serves_the_latest_sample() {
    let d = start_daemon(|c| {
        c.telemetry_period = std::time::Duration::from_millis(200);
    })
    .await;

    // Poll until the first collector sample lands
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(10);
    loop {
        let body: serde_json::Value = d
            .client
            .get(d.url("/api/processes"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if body["sampled_at"].is_string() {
            assert_eq!(body["count"], body["processes"].as_array().unwrap().len());
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no telemetry sample arrived"
        );
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn alerts_starts_empty() {
    let d = start_daemon(|_| {}).await;

    let body: serde_json::Value = d
        .client
        .get(d.url("/api/alerts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 0);
}
