//! Add/remove response matrices on the control plane.

use crate::prelude::{start_daemon, touch};
use serde_json::json;

#[tokio::test]
async fn add_valid_spec_returns_200_success() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");

    let response = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t", "priority": "high"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["added_files"][0], path);
    assert_eq!(body["monitoring"], true);
}

#[tokio::test]
async fn add_mixed_specs_returns_207_partial() {
    let d = start_daemon(|_| {}).await;
    let good = touch(&d, "t.log");

    let response = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": good, "label": "t"}, {"path": "nope.log"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 207);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "partial");
    assert_eq!(body["added_files"][0], good);
    assert_eq!(body["failed_files"][0]["path"], "nope.log");
    assert_eq!(body["failed_files"][0]["error"], "Path must be absolute");
}

#[tokio::test]
async fn add_with_no_valid_specs_returns_400() {
    let d = start_daemon(|_| {}).await;

    let response = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": "relative.log"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["failed_files"][0]["error"], "Path must be absolute");
}

#[tokio::test]
async fn add_with_empty_body_returns_400() {
    let d = start_daemon(|_| {}).await;

    let response = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "No files provided");
}

#[tokio::test]
async fn remove_auto_monitored_daemon_log_returns_400() {
    let d = start_daemon(|_| {}).await;

    let response = d
        .client
        .delete(d.url("/api/config/monitored_files/remove"))
        .json(&json!({"labels": ["resolvix_daemon"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
    assert_eq!(body["cannot_remove"][0], "resolvix_daemon");
}

#[tokio::test]
async fn remove_mixed_labels_returns_207() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");
    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": path, "label": "t"}]}))
        .send()
        .await
        .unwrap();

    let response = d
        .client
        .delete(d.url("/api/config/monitored_files/remove"))
        .json(&json!({"labels": ["t", "ghost"]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 207);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "partial");
    assert_eq!(body["removed_labels"][0], "t");
    assert_eq!(body["not_found"][0], "ghost");
}

#[tokio::test]
async fn add_remove_add_leaves_single_entry() {
    let d = start_daemon(|_| {}).await;
    let path = touch(&d, "t.log");
    let add_body = json!({"files": [{"path": path, "label": "t", "priority": "high"}]});

    let first = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&add_body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let removed = d
        .client
        .delete(d.url("/api/config/monitored_files/remove"))
        .json(&json!({"labels": ["t"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(removed.status(), 200);
    let body: serde_json::Value = removed.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["removed_labels"][0], "t");

    let second = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&add_body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 200);

    let listing: serde_json::Value = d
        .client
        .get(d.url("/api/monitored-files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    // The daemon's own log plus "t"
    assert_eq!(listing["count"], 2);
    let labels: Vec<&str> = listing["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"t"));
    assert!(labels.contains(&"resolvix_daemon"));
}

#[tokio::test]
async fn duplicate_label_is_rejected() {
    let d = start_daemon(|_| {}).await;
    let a = touch(&d, "a.log");
    let b = touch(&d, "b.log");

    d.client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": a, "label": "same"}]}))
        .send()
        .await
        .unwrap();

    let response = d
        .client
        .post(d.url("/api/config/monitored_files/add"))
        .json(&json!({"files": [{"path": b, "label": "same"}]}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["failed_files"][0]["error"], "Label already exists: same");
}
