// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming WebSocket endpoints.
//!
//! `/logs` replays the recent-event ring on connect and then streams
//! events and heartbeats; the client's first text message may carry a
//! delivery filter. `/telemetry` streams snapshots and heartbeats with no
//! replay. Backpressure is handled upstream: the hub disconnects a
//! subscriber whose buffer fills, which closes the socket here.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use resolvix_core::StreamMessage;
use std::sync::Arc;
use tracing::debug;

use crate::broadcast::SubscriberFilter;
use crate::lifecycle::Daemon;

pub fn logs_router(daemon: Arc<Daemon>) -> Router {
    Router::new()
        .route("/logs", get(logs_upgrade))
        .with_state(daemon)
}

pub fn telemetry_router(daemon: Arc<Daemon>) -> Router {
    Router::new()
        .route("/telemetry", get(telemetry_upgrade))
        .with_state(daemon)
}

async fn logs_upgrade(ws: WebSocketUpgrade, State(daemon): State<Arc<Daemon>>) -> Response {
    ws.on_upgrade(move |socket| logs_session(socket, daemon))
}

async fn telemetry_upgrade(ws: WebSocketUpgrade, State(daemon): State<Arc<Daemon>>) -> Response {
    ws.on_upgrade(move |socket| telemetry_session(socket, daemon))
}

async fn logs_session(mut socket: WebSocket, daemon: Arc<Daemon>) {
    let (id, mut rx, replay) = daemon.log_hub.subscribe();

    // Replay the ring so a reconnecting client does not start empty
    for event in replay {
        let message = StreamMessage::Event { event };
        if send_json(&mut socket, &message).await.is_err() {
            daemon.log_hub.unsubscribe(id);
            return;
        }
    }

    loop {
        tokio::select! {
            _ = daemon.shutdown.cancelled() => break,

            outgoing = rx.recv() => {
                let Some(message) = outgoing else { break };
                if send_json(&mut socket, &message).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SubscriberFilter>(&text) {
                            Ok(filter) => daemon.log_hub.set_filter(id, filter),
                            Err(e) => debug!(error = %e, "ignoring malformed filter message"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    daemon.log_hub.unsubscribe(id);
}

async fn telemetry_session(mut socket: WebSocket, daemon: Arc<Daemon>) {
    let (id, mut rx) = daemon.telemetry_hub.subscribe();

    loop {
        tokio::select! {
            _ = daemon.shutdown.cancelled() => break,

            outgoing = rx.recv() => {
                let Some(message) = outgoing else { break };
                if send_json(&mut socket, &message).await.is_err() {
                    break;
                }
            }

            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    daemon.telemetry_hub.unsubscribe(id);
}

async fn send_json(socket: &mut WebSocket, message: &StreamMessage) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(message) {
        Ok(t) => t,
        Err(e) => {
            debug!(error = %e, "failed to serialize stream message");
            return Ok(());
        }
    };
    socket.send(Message::Text(text.into())).await
}
