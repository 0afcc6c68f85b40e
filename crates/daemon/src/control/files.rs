// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitored-file mutation endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::lifecycle::Daemon;
use crate::protocol::{
    AddFilesRequest, AddFilesResponse, ErrorResponse, FailedFile, MonitoredFilesResponse,
    RemoveFilesRequest, RemoveFilesResponse,
};

pub(crate) async fn list(State(daemon): State<Arc<Daemon>>) -> Json<MonitoredFilesResponse> {
    let files = daemon.supervisor.list();
    let count = files.len();
    Json(MonitoredFilesResponse { files, count })
}

/// `POST /api/config/monitored_files/add`
///
/// 200 when every spec registered, 207 on partial success, 400 when the
/// body is malformed, empty, or nothing registered.
pub(crate) async fn add(
    State(daemon): State<Arc<Daemon>>,
    body: Result<Json<AddFilesRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Invalid body: {rejection}"))),
            )
                .into_response();
        }
    };

    if request.files.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(AddFilesResponse {
                status: "error".to_string(),
                added_files: Vec::new(),
                monitoring: None,
                failed_files: Vec::new(),
                message: Some("No files provided".to_string()),
            }),
        )
            .into_response();
    }

    let outcome = daemon.supervisor.add(request.files);
    let added_files: Vec<String> = outcome
        .added
        .iter()
        .map(|f| f.path.to_string_lossy().into_owned())
        .collect();
    let failed_files: Vec<FailedFile> = outcome
        .failed
        .into_iter()
        .map(|f| FailedFile {
            path: f.path,
            error: f.error,
        })
        .collect();

    let (code, response) = match (added_files.is_empty(), failed_files.is_empty()) {
        (false, true) => (
            StatusCode::OK,
            AddFilesResponse {
                status: "success".to_string(),
                added_files,
                monitoring: Some(true),
                failed_files,
                message: None,
            },
        ),
        (false, false) => (
            StatusCode::MULTI_STATUS,
            AddFilesResponse {
                status: "partial".to_string(),
                added_files,
                monitoring: None,
                failed_files,
                message: None,
            },
        ),
        (true, _) => (
            StatusCode::BAD_REQUEST,
            AddFilesResponse {
                status: "error".to_string(),
                added_files,
                monitoring: None,
                failed_files,
                message: Some("No files were added".to_string()),
            },
        ),
    };
    (code, Json(response)).into_response()
}

/// `DELETE /api/config/monitored_files/remove`
///
/// 200 when every label was removed, 207 on partial success, 400 when the
/// body is malformed, empty, or nothing was removed.
pub(crate) async fn remove(
    State(daemon): State<Arc<Daemon>>,
    body: Result<Json<RemoveFilesRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(format!("Invalid body: {rejection}"))),
            )
                .into_response();
        }
    };

    if request.labels.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No labels provided")),
        )
            .into_response();
    }

    let outcome = daemon.supervisor.remove(request.labels);
    let clean = outcome.not_found.is_empty() && outcome.cannot_remove.is_empty();

    let (code, status) = if outcome.removed.is_empty() {
        (StatusCode::BAD_REQUEST, "error")
    } else if clean {
        (StatusCode::OK, "success")
    } else {
        (StatusCode::MULTI_STATUS, "partial")
    };

    (
        code,
        Json(RemoveFilesResponse {
            status: status.to_string(),
            removed_labels: outcome.removed,
            not_found: outcome.not_found,
            cannot_remove: outcome.cannot_remove,
            message: None,
        }),
    )
        .into_response()
}
