// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{LogEvent, StreamMessage};
use crate::priority::Priority;
use crate::severity::Severity;
use chrono::Utc;
use std::path::PathBuf;

fn sample_event() -> LogEvent {
    LogEvent {
        ts: Utc::now(),
        label: "nginx_error".to_string(),
        path: PathBuf::from("/var/log/nginx/error.log"),
        priority: Priority::High,
        severity: Severity::Error,
        line: "ERROR upstream timed out".to_string(),
        node_ip: "10.0.0.7".to_string(),
    }
}

// The wire envelope is a compatibility surface for stream clients; these
// fixtures pin the exact field names and kind tags.

#[test]
fn event_envelope_fixture() {
    let msg = StreamMessage::Event {
        event: sample_event(),
    };
    let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["kind"], "event");
    assert_eq!(value["label"], "nginx_error");
    assert_eq!(value["priority"], "high");
    assert_eq!(value["severity"], "error");
    assert_eq!(value["line"], "ERROR upstream timed out");
    assert_eq!(value["node_ip"], "10.0.0.7");
}

#[test]
fn heartbeat_envelope_fixture() {
    let value: serde_json::Value = serde_json::to_value(StreamMessage::heartbeat()).unwrap();
    assert_eq!(value["kind"], "heartbeat");
    assert!(value.get("ts").is_some());
}

#[test]
fn envelope_round_trips() {
    let msg = StreamMessage::Event {
        event: sample_event(),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: StreamMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(msg, back);
}
