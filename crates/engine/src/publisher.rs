// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget ticket-bus publisher.
//!
//! Events that survive suppression are submitted for ticket creation. There
//! is no local queue or retry on this path: a failed publish logs a warning
//! and the event is gone. Durable delivery exists only for telemetry.

use resolvix_core::LogEvent;
use std::time::Duration;
use tracing::{debug, warn};

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Publishes surviving log events to the remote ticket bus.
#[derive(Clone)]
pub struct TicketPublisher {
    client: Option<reqwest::Client>,
    url: String,
}

impl TicketPublisher {
    /// `url` is the bus submission endpoint; `None` disables publication.
    pub fn new(url: Option<String>) -> Self {
        let client = url.as_ref().and_then(|_| {
            reqwest::Client::builder()
                .timeout(PUBLISH_TIMEOUT)
                .build()
                .ok()
        });
        Self {
            client,
            url: url.unwrap_or_default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Submit one event. Spawns the POST so the caller never waits on the
    /// bus; failures are logged and dropped.
    pub fn publish(&self, event: &LogEvent) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let url = self.url.clone();
        let event = event.clone();

        tokio::spawn(async move {
            let result = client.post(&url).json(&event).send().await;
            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(label = %event.label, "event published to ticket bus");
                }
                Ok(response) => {
                    warn!(
                        label = %event.label,
                        status = %response.status(),
                        "ticket bus rejected event"
                    );
                }
                Err(e) => {
                    warn!(label = %event.label, error = %e, "ticket bus unreachable");
                }
            }
        });
    }
}
