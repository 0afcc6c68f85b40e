// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Outbox, OutboxError};
use chrono::{Duration, Utc};
use proptest::prelude::*;
use serde_json::json;

fn open(dir: &tempfile::TempDir, max: usize) -> Outbox {
    Outbox::open(dir.path().join("telemetry_queue"), max).unwrap()
}

#[test]
fn enqueue_assigns_increasing_seqs() {
    let dir = tempfile::tempdir().unwrap();
    let mut outbox = open(&dir, 10);

    let a = outbox.enqueue(json!({"n": 1})).unwrap();
    let b = outbox.enqueue(json!({"n": 2})).unwrap();
    let c = outbox.enqueue(json!({"n": 3})).unwrap();

    assert!(a < b && b < c);
    assert_eq!(outbox.len(), 3);
    assert_eq!(outbox.head().unwrap().seq, a);
}

#[test]
fn overflow_drops_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let mut outbox = open(&dir, 3);

    for n in 0..5 {
        outbox.enqueue(json!({"n": n})).unwrap();
    }

    assert_eq!(outbox.len(), 3);
    assert_eq!(outbox.head().unwrap().payload, json!({"n": 2}));
    assert_eq!(outbox.stats().dropped_overflow, 2);
}

#[test]
fn ack_pops_head_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut outbox = open(&dir, 10);
    outbox.enqueue(json!({"n": 1})).unwrap();
    outbox.enqueue(json!({"n": 2})).unwrap();

    let popped = outbox.ack_head().unwrap().unwrap();
    assert_eq!(popped.payload, json!({"n": 1}));
    assert_eq!(outbox.head().unwrap().payload, json!({"n": 2}));
}

#[test]
fn record_failure_bumps_attempts_and_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let mut outbox = open(&dir, 10);
    outbox.enqueue(json!({"n": 1})).unwrap();

    let later = Utc::now() + Duration::seconds(30);
    assert_eq!(outbox.record_failure(later).unwrap(), Some(1));
    assert_eq!(outbox.record_failure(later).unwrap(), Some(2));

    let head = outbox.head().unwrap();
    assert_eq!(head.attempts, 2);
    assert_eq!(head.next_attempt_ts, later);
}

#[test]
fn drop_head_exhausted_counts() {
    let dir = tempfile::tempdir().unwrap();
    let mut outbox = open(&dir, 10);
    outbox.enqueue(json!({"n": 1})).unwrap();

    outbox.drop_head_exhausted().unwrap();
    assert!(outbox.is_empty());
    assert_eq!(outbox.stats().dropped_exhausted, 1);
}

#[test]
fn reopen_resumes_queue_and_seq() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry_queue");

    {
        let mut outbox = Outbox::open(&path, 10).unwrap();
        outbox.enqueue(json!({"n": 1})).unwrap();
        outbox.enqueue(json!({"n": 2})).unwrap();
        outbox
            .record_failure(Utc::now() + Duration::seconds(5))
            .unwrap();
    }

    let mut outbox = Outbox::open(&path, 10).unwrap();
    assert_eq!(outbox.len(), 2);
    assert_eq!(outbox.head().unwrap().attempts, 1);

    // New seqs continue past what is on disk
    let seq = outbox.enqueue(json!({"n": 3})).unwrap();
    assert_eq!(seq, 3);
}

#[test]
fn file_starts_with_version_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry_queue");
    let mut outbox = Outbox::open(&path, 10).unwrap();
    outbox.enqueue(json!({"n": 1})).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let first = raw.lines().next().unwrap();
    assert_eq!(first, "{\"version\":1}");
}

#[test]
fn corrupt_line_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry_queue");
    {
        let mut outbox = Outbox::open(&path, 10).unwrap();
        outbox.enqueue(json!({"n": 1})).unwrap();
        outbox.enqueue(json!({"n": 2})).unwrap();
    }

    // Clobber the middle line
    let raw = std::fs::read_to_string(&path).unwrap();
    let mangled: Vec<String> = raw
        .lines()
        .enumerate()
        .map(|(i, l)| {
            if i == 1 {
                "{broken".to_string()
            } else {
                l.to_string()
            }
        })
        .collect();
    std::fs::write(&path, mangled.join("\n")).unwrap();

    let outbox = Outbox::open(&path, 10).unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox.head().unwrap().payload, json!({"n": 2}));
}

#[test]
fn second_open_fails_while_locked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry_queue");
    let _held = Outbox::open(&path, 10).unwrap();

    match Outbox::open(&path, 10) {
        Err(OutboxError::Locked(_)) => {}
        other => panic!("expected Locked, got {:?}", other.map(|o| o.stats())),
    }
}

#[test]
fn lock_released_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("telemetry_queue");
    {
        let _outbox = Outbox::open(&path, 10).unwrap();
    }
    assert!(Outbox::open(&path, 10).is_ok());
}

proptest! {
    // Each case pays real fsyncs; keep the case count modest
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// The queue never exceeds its bound, and after any sequence of
    /// enqueues the head is the oldest surviving entry.
    #[test]
    fn bounded_and_fifo(count in 1usize..40, max in 1usize..10) {
        let dir = tempfile::tempdir().unwrap();
        let mut outbox = Outbox::open(dir.path().join("q"), max).unwrap();

        for n in 0..count {
            outbox.enqueue(json!({"n": n})).unwrap();
            prop_assert!(outbox.len() <= max);
        }

        let expected_head = count.saturating_sub(max);
        prop_assert_eq!(
            outbox.head().unwrap().payload.clone(),
            json!({"n": expected_head})
        );

        // Seqs strictly increase front to back
        let mut prev = 0u64;
        while let Some(entry) = outbox.ack_head().unwrap() {
            prop_assert!(entry.seq > prev);
            prev = entry.seq;
        }
    }
}
