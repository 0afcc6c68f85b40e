// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log events and the streaming-socket envelope.

use crate::priority::Priority;
use crate::severity::Severity;
use crate::telemetry::TelemetrySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An error-class line that survived classification.
///
/// Created by the tailer + classifier, broadcast to live subscribers and
/// submitted to the ticket bus, then dropped. There is no stored history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub label: String,
    pub path: PathBuf,
    pub priority: Priority,
    pub severity: Severity,
    pub line: String,
    pub node_ip: String,
}

/// Envelope for the streaming sockets.
///
/// Serializes with a `kind` tag:
/// `{"kind":"event",...}`, `{"kind":"telemetry",...}`, `{"kind":"heartbeat","ts":...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamMessage {
    Event {
        #[serde(flatten)]
        event: LogEvent,
    },
    Telemetry {
        #[serde(flatten)]
        snapshot: TelemetrySnapshot,
    },
    Heartbeat {
        ts: DateTime<Utc>,
    },
}

impl StreamMessage {
    pub fn heartbeat() -> Self {
        StreamMessage::Heartbeat { ts: Utc::now() }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
