// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The line pipeline: tailed lines → classifier → suppression → ticket bus
//! + live broadcast.
//!
//! A single task consumes the shared line channel, so lines from one file
//! keep their file order. A bad line, rule lookup, or bus failure never
//! stops the loop.

use resolvix_core::{classify, LogEvent};
use resolvix_engine::tailer::TailedLine;
use resolvix_engine::{RuleCache, TicketPublisher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::broadcast::LogHub;
use crate::protocol::EventCounters;

/// Monotonic counters exposed in `/api/status`.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub lines_seen: AtomicU64,
    pub issues: AtomicU64,
    pub suppressed: AtomicU64,
    pub published: AtomicU64,
}

impl PipelineCounters {
    pub fn snapshot(&self) -> EventCounters {
        EventCounters {
            lines_seen: self.lines_seen.load(Ordering::Relaxed),
            issues: self.issues.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
        }
    }
}

/// Consume tailed lines until the channel closes or the token fires.
pub async fn run_pipeline(
    mut lines: mpsc::Receiver<TailedLine>,
    rules: Arc<RuleCache>,
    publisher: TicketPublisher,
    log_hub: Arc<LogHub>,
    counters: Arc<PipelineCounters>,
    node_ip: String,
    cancel: CancellationToken,
) {
    loop {
        let tailed = tokio::select! {
            _ = cancel.cancelled() => return,
            line = lines.recv() => match line {
                Some(l) => l,
                None => return,
            },
        };

        counters.lines_seen.fetch_add(1, Ordering::Relaxed);

        let Some(severity) = classify(&tailed.line) else {
            continue;
        };
        counters.issues.fetch_add(1, Ordering::Relaxed);

        let event = LogEvent {
            ts: tailed.detected_at,
            label: tailed.label,
            path: tailed.file.path,
            priority: tailed.file.priority,
            severity,
            line: tailed.line,
            node_ip: node_ip.clone(),
        };

        let verdict = rules.should_suppress(&event.line).await;
        if verdict.is_suppressed() {
            counters.suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(label = %event.label, "event suppressed");
            continue;
        }

        publisher.publish(&event);
        log_hub.publish(&event);
        counters.published.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
