// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! resolvix-engine: the collector's moving parts.
//!
//! Tailers follow files and emit lines; the supervisor owns the monitored
//! set and one tailer task per entry; the suppression cache filters
//! classified issues against the rule store; the telemetry collector samples
//! the host; the sender drains the outbox to the ingestion endpoint; the
//! publisher fires events at the ticket bus.

pub mod publisher;
pub mod sender;
pub mod supervisor;
pub mod suppression;
pub mod tailer;
pub mod telemetry;

pub use publisher::TicketPublisher;
pub use sender::{run_sender, SenderConfig};
pub use supervisor::{
    AddOutcome, FailedSpec, RemoveOutcome, Supervisor, SupervisorError, TailerStatus,
};
pub use suppression::{RuleCache, RuleError, SuppressionStats, SuppressionVerdict};
pub use tailer::{TailedLine, TailerConfig};
pub use telemetry::TelemetryCollector;
