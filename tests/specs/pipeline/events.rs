//! End-to-end: appended error lines surface as alerts.

use crate::prelude::{eventually, start_daemon, touch};
use serde_json::json;
use std::io::Write;
use std::time::Duration;

fn append(path: &str, text: &str) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(text.as_bytes()).unwrap();
}

#[tokio::test]
async fn appended_error_line_becomes_exactly_one_alert() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");

    let added = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t", "priority": "high"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(added.status(), 200);

    // Let the tailer reach EOF before writing
    tokio::time::sleep(Duration::from_millis(100)).await;
    append(&path, "ERROR xyz\n");

    let daemon = std::sync::Arc::clone(&d.startup.daemon);
    assert!(
        eventually(
            || daemon.log_hub.recent().len() == 1,
            Duration::from_secs(5)
        )
        .await
    );

    let body: serde_json::Value = d
        .client
        .get(d.url("/api/alerts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["alerts"][0]["label"], "t");
    assert_eq!(body["alerts"][0]["severity"], "error");
    assert_eq!(body["alerts"][0]["priority"], "high");
    assert_eq!(body["alerts"][0]["line"], "ERROR xyz");

    // A benign line must not produce another alert
    append(&path, "all quiet\n");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(daemon.log_hub.recent().len(), 1);
}

#[tokio::test]
async fn history_is_not_replayed_on_add() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");
    std::fs::write(&path, "ERROR old event\nERROR older event\n").unwrap();

    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t"}]}))
        .send()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(d.startup.daemon.log_hub.recent().is_empty());

    append(&path, "ERROR fresh\n");
    let daemon = std::sync::Arc::clone(&d.startup.daemon);
    assert!(
        eventually(
            || {
                let recent = daemon.log_hub.recent();
                recent.len() == 1 && recent[0].line == "ERROR fresh"
            },
            Duration::from_secs(5)
        )
        .await
    );
}

#[tokio::test]
async fn rotation_during_monitoring_yields_one_event() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "r.log");
    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "r"}]}))
        .send()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // logrotate-style: rename away, recreate, write
    let rotated = format!("{path}.1");
    std::fs::rename(&path, &rotated).unwrap();
    std::fs::write(&path, "ERROR r\n").unwrap();

    let daemon = std::sync::Arc::clone(&d.startup.daemon);
    assert!(
        eventually(
            || {
                let recent = daemon.log_hub.recent();
                recent.len() == 1 && recent[0].line == "ERROR r"
            },
            Duration::from_secs(5)
        )
        .await
    );

    // And nothing further
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(daemon.log_hub.recent().len(), 1);
}
