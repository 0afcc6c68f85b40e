// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only control-plane endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use crate::lifecycle::Daemon;
use crate::protocol::{
    AlertsResponse, ErrorResponse, ProcessesResponse, StatusResponse, SubscriberCounts,
};

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub(crate) async fn status(State(daemon): State<Arc<Daemon>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        node_ip: daemon.node_ip.clone(),
        uptime_secs: daemon.uptime_secs(),
        monitored_files: daemon.supervisor.list().len(),
        paused: daemon.supervisor.paused_labels(),
        outbox: daemon.outbox.lock().stats(),
        suppression: daemon.rules.stats(),
        events: daemon.counters.snapshot(),
        subscribers: SubscriberCounts {
            logs: daemon.log_hub.subscriber_count(),
            telemetry: daemon.telemetry_hub.subscriber_count(),
        },
    })
}

/// Serve the persisted config in its on-disk shape.
pub(crate) async fn config(State(daemon): State<Arc<Daemon>>) -> Response {
    match daemon.config_store.load() {
        Ok(files) => Json(json!({"monitoring": {"log_files": files}})).into_response(),
        Err(e) => {
            error!(error = %e, "failed to read persisted config");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// Re-read the persisted config and refresh the suppression cache.
pub(crate) async fn reload(State(daemon): State<Arc<Daemon>>) -> Response {
    if let Err(e) = daemon.supervisor.reload() {
        error!(error = %e, "config reload failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response();
    }
    if daemon.rules.is_enabled() {
        if let Err(e) = daemon.rules.force_reload().await {
            error!(error = %e, "suppression rule reload failed");
        }
    }
    Json(json!({"reloaded": true})).into_response()
}

/// Process list from the most recent telemetry snapshot.
pub(crate) async fn processes(State(daemon): State<Arc<Daemon>>) -> Json<ProcessesResponse> {
    let snapshot = daemon.latest_snapshot.read().clone();
    let (processes, sampled_at) = match snapshot {
        Some(s) => (s.processes, Some(s.ts)),
        None => (Vec::new(), None),
    };
    let count = processes.len();
    Json(ProcessesResponse {
        processes,
        count,
        sampled_at,
    })
}

/// Recent issue events (the live-stream replay ring).
pub(crate) async fn alerts(State(daemon): State<Arc<Daemon>>) -> Json<AlertsResponse> {
    let alerts = daemon.log_hub.recent();
    let count = alerts.len();
    Json(AlertsResponse { alerts, count })
}
