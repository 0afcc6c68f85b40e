// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! resolvix-core: domain types and pure logic for the resolvix collector

pub mod classify;
pub mod event;
pub mod monitored_file;
pub mod priority;
pub mod rule;
pub mod severity;
pub mod telemetry;

pub use classify::classify;
pub use event::{LogEvent, StreamMessage};
pub use monitored_file::{derive_label, unique_label, MonitoredFile, MonitoredFileSpec};
pub use priority::{ParsePriorityError, Priority};
pub use rule::SuppressionRule;
pub use severity::Severity;
pub use telemetry::{ProcessSample, TelemetrySnapshot};
