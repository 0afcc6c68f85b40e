// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DTO structs for the control-plane HTTP API.

use resolvix_core::{LogEvent, MonitoredFile, ProcessSample};
use resolvix_engine::SuppressionStats;
use resolvix_storage::OutboxStats;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/config/monitored_files/add`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddFilesRequest {
    #[serde(default)]
    pub files: Vec<resolvix_core::MonitoredFileSpec>,
}

/// Body of `DELETE /api/config/monitored_files/remove`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoveFilesRequest {
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Response for the add endpoint: 200 success / 207 partial / 400 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddFilesResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_files: Vec<FailedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Response for the remove endpoint: 200 success / 207 partial / 400 error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveFilesResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_found: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cannot_remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Generic error body for 4xx/5xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredFilesResponse {
    pub files: Vec<MonitoredFile>,
    pub count: usize,
}

/// Counters reported under `events` in `/api/status`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EventCounters {
    pub lines_seen: u64,
    pub issues: u64,
    pub suppressed: u64,
    pub published: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SubscriberCounts {
    pub logs: usize,
    pub telemetry: usize,
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub node_ip: String,
    pub uptime_secs: u64,
    pub monitored_files: usize,
    /// Labels whose tailer is paused because the path is missing.
    pub paused: Vec<String>,
    pub outbox: OutboxStats,
    pub suppression: SuppressionStats,
    pub events: EventCounters,
    pub subscribers: SubscriberCounts,
}

/// Body of `GET /api/processes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessesResponse {
    pub processes: Vec<ProcessSample>,
    pub count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampled_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Body of `GET /api/alerts`: the replay ring plus counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub alerts: Vec<LogEvent>,
    pub count: usize,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
