// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out hubs for the streaming sockets.
//!
//! Each subscriber owns a bounded channel. The hubs only `try_send`: a full
//! buffer disconnects that subscriber so one slow client never delays the
//! rest. The log hub keeps a small replay ring so a reconnecting client does
//! not start from nothing; telemetry snapshots are periodic, so that hub
//! carries no replay.

use parking_lot::Mutex;
use resolvix_core::{LogEvent, Priority, StreamMessage, TelemetrySnapshot};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Per-subscriber delivery filter, set by the client's first message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriberFilter {
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub min_priority: Option<Priority>,
}

impl SubscriberFilter {
    pub fn matches(&self, event: &LogEvent) -> bool {
        if let Some(labels) = &self.labels {
            if !labels.is_empty() && !labels.iter().any(|l| l == &event.label) {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if event.priority < min {
                return false;
            }
        }
        true
    }
}

struct Subscriber {
    tx: mpsc::Sender<StreamMessage>,
    filter: SubscriberFilter,
}

/// Broadcast hub for live log events.
pub struct LogHub {
    subscribers: Mutex<HashMap<Uuid, Subscriber>>,
    ring: Mutex<VecDeque<LogEvent>>,
    buffer_capacity: usize,
    ring_capacity: usize,
}

impl LogHub {
    pub fn new(buffer_capacity: usize, ring_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            ring: Mutex::new(VecDeque::with_capacity(ring_capacity)),
            buffer_capacity,
            ring_capacity,
        }
    }

    /// Register a subscriber. Returns its id, the receive half of its
    /// buffer, and a replay of recent events.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<StreamMessage>, Vec<LogEvent>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        self.subscribers.lock().insert(
            id,
            Subscriber {
                tx,
                filter: SubscriberFilter::default(),
            },
        );
        let replay = self.ring.lock().iter().cloned().collect();
        debug!(subscriber = %id, "log subscriber connected");
        (id, rx, replay)
    }

    pub fn set_filter(&self, id: Uuid, filter: SubscriberFilter) {
        if let Some(sub) = self.subscribers.lock().get_mut(&id) {
            sub.filter = filter;
        }
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.lock().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Events currently in the replay ring, oldest first.
    pub fn recent(&self) -> Vec<LogEvent> {
        self.ring.lock().iter().cloned().collect()
    }

    /// Deliver an event to matching subscribers and record it in the ring.
    /// Subscribers with a full buffer are disconnected.
    pub fn publish(&self, event: &LogEvent) {
        {
            let mut ring = self.ring.lock();
            if ring.len() >= self.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }

        let message = StreamMessage::Event {
            event: event.clone(),
        };
        self.fan_out(message, |sub| sub.filter.matches(event));
    }

    pub fn heartbeat(&self) {
        self.fan_out(StreamMessage::heartbeat(), |_| true);
    }

    fn fan_out<F: Fn(&Subscriber) -> bool>(&self, message: StreamMessage, wants: F) {
        let mut dropped = Vec::new();
        {
            let subscribers = self.subscribers.lock();
            for (id, sub) in subscribers.iter() {
                if !wants(sub) {
                    continue;
                }
                match sub.tx.try_send(message.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(subscriber = %id, "subscriber buffer full, disconnecting");
                        dropped.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dropped.push(*id);
                    }
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in dropped {
                subscribers.remove(&id);
            }
        }
    }
}

/// Broadcast hub for telemetry snapshots. Same delivery policy as
/// [`LogHub`], no filters, no replay.
pub struct TelemetryHub {
    subscribers: Mutex<HashMap<Uuid, mpsc::Sender<StreamMessage>>>,
    buffer_capacity: usize,
}

impl TelemetryHub {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            buffer_capacity,
        }
    }

    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<StreamMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        self.subscribers.lock().insert(id, tx);
        debug!(subscriber = %id, "telemetry subscriber connected");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.subscribers.lock().remove(&id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn publish(&self, snapshot: &TelemetrySnapshot) {
        self.send_all(StreamMessage::Telemetry {
            snapshot: snapshot.clone(),
        });
    }

    pub fn heartbeat(&self) {
        self.send_all(StreamMessage::heartbeat());
    }

    fn send_all(&self, message: StreamMessage) {
        let mut dropped = Vec::new();
        {
            let subscribers = self.subscribers.lock();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(message.clone()) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!(subscriber = %id, "telemetry subscriber buffer full, disconnecting");
                        dropped.push(*id);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        dropped.push(*id);
                    }
                }
            }
        }
        if !dropped.is_empty() {
            let mut subscribers = self.subscribers.lock();
            for id in dropped {
                subscribers.remove(&id);
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
