// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane HTTP surface.
//!
//! A small axum router over the shared [`Daemon`] state. All bodies are
//! JSON; add/remove follow the 200/207/400 matrices, anything unhandled
//! surfaces as 500 `{"status":"error","message":...}`. Every request runs
//! under a deadline so a stuck handler cannot pin a connection.

mod files;
mod status;

use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;

use crate::lifecycle::Daemon;
use crate::protocol::ErrorResponse;

/// Handler deadline for control-plane requests.
const REQUEST_DEADLINE: Duration = Duration::from_secs(15);

/// Build the control-plane router.
pub fn router(daemon: Arc<Daemon>) -> Router {
    Router::new()
        .route("/api/health", get(status::health))
        .route("/api/status", get(status::status))
        .route("/api/config", get(status::config))
        .route("/api/config/reload", post(status::reload))
        .route("/api/monitored-files", get(files::list))
        .route("/api/config/monitored_files/add", post(files::add))
        .route("/api/config/monitored_files/remove", delete(files::remove))
        .route("/api/processes", get(status::processes))
        .route("/api/alerts", get(status::alerts))
        .layer(middleware::from_fn(deadline))
        .with_state(daemon)
}

async fn deadline(request: Request, next: Next) -> Response {
    match tokio::time::timeout(REQUEST_DEADLINE, next.run(request)).await {
        Ok(response) => response,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("request deadline exceeded")),
        )
            .into_response(),
    }
}
