//! Outbox delivery through the daemon's sender loop.

use crate::prelude::{eventually, start_daemon};
use axum::{http::StatusCode, routing::post, Router};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Ingestion stub whose behavior can be flipped from 500 to 200 mid-test.
async fn spawn_sink() -> (String, Arc<AtomicBool>, Arc<AtomicUsize>) {
    let healthy = Arc::new(AtomicBool::new(true));
    let requests = Arc::new(AtomicUsize::new(0));
    let state = (Arc::clone(&healthy), Arc::clone(&requests));

    let app = Router::new().route(
        "/api/telemetry/snapshot",
        post(
            |axum::extract::State((healthy, requests)): axum::extract::State<(
                Arc<AtomicBool>,
                Arc<AtomicUsize>,
            )>| async move {
                requests.fetch_add(1, Ordering::SeqCst);
                if healthy.load(Ordering::SeqCst) {
                    StatusCode::OK
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        ),
    )
    .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), healthy, requests)
}

#[tokio::test]
async fn enqueued_snapshots_drain_to_a_healthy_sink() {
    let (backend, _healthy, requests) = spawn_sink().await;
    let d = start_daemon(|c| {
        c.telemetry_backend_url = Some(backend.clone());
        c.telemetry_jwt_token = Some("jwt".to_string());
    })
    .await;

    for n in 0..3 {
        d.startup
            .daemon
            .outbox
            .lock()
            .enqueue(json!({"n": n}))
            .unwrap();
    }

    let daemon = Arc::clone(&d.startup.daemon);
    assert!(
        eventually(
            || daemon.outbox.lock().is_empty(),
            Duration::from_secs(15)
        )
        .await,
        "outbox did not drain"
    );
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn failing_sink_grows_attempts_without_losing_entries() {
    let (backend, healthy, _requests) = spawn_sink().await;
    healthy.store(false, Ordering::SeqCst);

    let d = start_daemon(|c| {
        c.telemetry_backend_url = Some(backend.clone());
    })
    .await;

    for n in 0..3 {
        d.startup
            .daemon
            .outbox
            .lock()
            .enqueue(json!({"n": n}))
            .unwrap();
    }

    // Head entry accumulates attempts while the queue holds steady
    let daemon = Arc::clone(&d.startup.daemon);
    assert!(
        eventually(
            || {
                let outbox = daemon.outbox.lock();
                outbox.len() == 3 && outbox.head().map(|h| h.attempts).unwrap_or(0) >= 1
            },
            Duration::from_secs(15)
        )
        .await,
        "head attempts never grew"
    );

    // Flip the sink healthy: the queue drains in order
    healthy.store(true, Ordering::SeqCst);
    assert!(
        eventually(
            || daemon.outbox.lock().is_empty(),
            Duration::from_secs(30)
        )
        .await,
        "outbox did not drain after recovery"
    );
}
