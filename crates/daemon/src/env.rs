// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

/// State directory override: RESOLVIX_STATE_DIR
pub fn state_dir() -> Option<PathBuf> {
    std::env::var("RESOLVIX_STATE_DIR").ok().map(PathBuf::from)
}

/// Tailer poll interval override (milliseconds)
pub fn poll_interval() -> Option<Duration> {
    parsed::<u64>("RESOLVIX_POLL_MS").map(Duration::from_millis)
}

/// Telemetry cadence override (seconds)
pub fn telemetry_period() -> Option<Duration> {
    parsed::<u64>("RESOLVIX_TELEMETRY_SECS").map(Duration::from_secs)
}

/// Stream heartbeat period override (seconds)
pub fn heartbeat_period() -> Option<Duration> {
    parsed::<u64>("RESOLVIX_HEARTBEAT_SECS").map(Duration::from_secs)
}

/// Suppression cache TTL override (seconds)
pub fn rule_ttl() -> Option<Duration> {
    parsed::<u64>("RESOLVIX_RULE_TTL_SECS").map(Duration::from_secs)
}

/// Outbox capacity override
pub fn max_queue() -> Option<usize> {
    parsed("RESOLVIX_MAX_QUEUE")
}

pub fn control_port() -> Option<u16> {
    parsed("RESOLVIX_CONTROL_PORT")
}

pub fn logs_port() -> Option<u16> {
    parsed("RESOLVIX_LOGS_PORT")
}

pub fn telemetry_port() -> Option<u16> {
    parsed("RESOLVIX_TELEMETRY_PORT")
}
