// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbox sender loop.
//!
//! Drains the durable outbox to the remote ingestion endpoint with a single
//! in-flight POST, exponential backoff with jitter, and a bounded attempt
//! count per entry. Timeouts and non-2xx responses are treated identically
//! to network errors.

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use resolvix_storage::{Outbox, OutboxEntry};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sender tuning. `url` is the full snapshot-ingestion endpoint.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub url: String,
    pub token: Option<String>,
    pub idle_interval: Duration,
    pub post_timeout: Duration,
    pub backoff_base: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: None,
            idle_interval: Duration::from_secs(5),
            post_timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            max_attempts: 10,
        }
    }
}

/// Backoff before attempt `attempts + 1`: `base * 2^(attempts-1)` capped at
/// `max`. Jitter is applied separately so the schedule stays testable.
pub fn backoff_delay(attempts: u32, base: Duration, max: Duration) -> Duration {
    if attempts == 0 {
        return Duration::ZERO;
    }
    let exp = attempts.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exp).min(max)
}

/// Multiply by a random factor in [0.75, 1.25).
fn with_jitter(delay: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.75..1.25);
    delay.mul_f64(factor)
}

/// Run the sender until cancelled. At-least-once, in enqueue order.
pub async fn run_sender(
    outbox: Arc<Mutex<Outbox>>,
    config: SenderConfig,
    cancel: CancellationToken,
) {
    let client = match reqwest::Client::builder()
        .timeout(config.post_timeout)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to build HTTP client, telemetry sender disabled");
            return;
        }
    };

    info!(url = %config.url, "telemetry sender started");

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let head: Option<OutboxEntry> = outbox.lock().head().cloned();
        let Some(entry) = head else {
            if sleep_or_cancel(&cancel, config.idle_interval).await {
                return;
            }
            continue;
        };

        // Honour the persisted backoff deadline
        let now = Utc::now();
        if entry.next_attempt_ts > now {
            let wait = (entry.next_attempt_ts - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(config.idle_interval);
            if sleep_or_cancel(&cancel, wait).await {
                return;
            }
            continue;
        }

        match post_snapshot(&client, &config, &entry).await {
            Ok(()) => {
                debug!(seq = entry.seq, "snapshot delivered");
                if let Err(e) = outbox.lock().ack_head() {
                    warn!(error = %e, "failed to ack outbox head");
                }
            }
            Err(reason) => {
                let attempts = entry.attempts + 1;
                if attempts >= config.max_attempts {
                    warn!(
                        seq = entry.seq,
                        attempts,
                        reason = %reason,
                        "giving up on snapshot"
                    );
                    if let Err(e) = outbox.lock().drop_head_exhausted() {
                        warn!(error = %e, "failed to drop exhausted outbox head");
                    }
                } else {
                    let delay = with_jitter(backoff_delay(
                        attempts,
                        config.backoff_base,
                        config.max_backoff,
                    ));
                    warn!(
                        seq = entry.seq,
                        attempts,
                        retry_in_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "snapshot delivery failed"
                    );
                    let next = Utc::now()
                        + chrono::Duration::from_std(delay)
                            .unwrap_or_else(|_| chrono::Duration::seconds(1));
                    if let Err(e) = outbox.lock().record_failure(next) {
                        warn!(error = %e, "failed to record outbox failure");
                    }
                }
            }
        }
    }
}

/// POST one payload. `Err` carries a short human-readable reason.
async fn post_snapshot(
    client: &reqwest::Client,
    config: &SenderConfig,
    entry: &OutboxEntry,
) -> Result<(), String> {
    let mut request = client.post(&config.url).json(&entry.payload);
    if let Some(token) = &config.token {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => Ok(()),
        Ok(response) => Err(format!("status {}", response.status())),
        Err(e) => Err(e.to_string()),
    }
}

async fn sleep_or_cancel(cancel: &CancellationToken, dur: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(dur) => false,
    }
}

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;
