// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Telemetry snapshot records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One process sampled into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// A point-in-time sample of host and process metrics.
///
/// Produced on a fixed cadence by the telemetry collector; its lifecycle ends
/// when the outbox has POSTed it to the ingestion endpoint or dropped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub ts: DateTime<Utc>,
    pub node_id: String,
    pub node_ip: String,
    pub hostname: String,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    /// Usage of the volume holding `/`.
    pub disk_percent: f32,
    pub uptime_secs: u64,
    pub load_avg_one: f64,
    pub load_avg_five: f64,
    pub load_avg_fifteen: f64,
    /// Top processes by CPU, descending.
    pub processes: Vec<ProcessSample>,
}
