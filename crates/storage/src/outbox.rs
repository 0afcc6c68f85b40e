// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable telemetry outbox.
//!
//! A single on-disk file holds the queue: a header line `{"version":1}`
//! followed by one JSON entry per line. The queue is bounded; overflow drops
//! the oldest entry. Every mutation rewrites the whole file through a temp
//! file plus atomic rename — the queue is small enough that rewrite-on-change
//! beats a log-structured format and its compaction machinery.
//!
//! Cross-process exclusivity comes from an advisory `fs2` lock on a sidecar
//! `.lock` file, held for the lifetime of the handle. In-process callers
//! serialize through their own mutex.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// On-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Errors that can occur in outbox operations
#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Outbox is locked by another process: {0}")]
    Locked(PathBuf),
}

/// Header line preceding the entries.
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    version: u32,
}

/// A queued telemetry payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub seq: u64,
    pub created_ts: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub attempts: u32,
    pub next_attempt_ts: DateTime<Utc>,
}

/// Counters surfaced in `/api/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxStats {
    pub len: usize,
    pub last_seq: u64,
    /// Entries dropped because the queue was full.
    pub dropped_overflow: u64,
    /// Entries dropped after exhausting delivery attempts.
    pub dropped_exhausted: u64,
}

/// Bounded, persistent FIFO between the telemetry collector and the sender
/// loop. At-least-once: entries leave the queue only on ack or explicit drop.
pub struct Outbox {
    path: PathBuf,
    /// Sidecar lock file handle; the advisory lock is released on drop.
    _lock_file: File,
    entries: Vec<OutboxEntry>,
    max_queue: usize,
    last_seq: u64,
    dropped_overflow: u64,
    dropped_exhausted: u64,
}

impl Outbox {
    /// Open (or create) the outbox, acquiring the cross-process lock.
    ///
    /// Fails with [`OutboxError::Locked`] when another process holds the
    /// lock. Entries with `attempts > 0` are kept as-is; the sender resumes
    /// them from wherever their `next_attempt_ts` lands.
    pub fn open(path: impl Into<PathBuf>, max_queue: usize) -> Result<Self, OutboxError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_path = lock_path(&path);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| OutboxError::Locked(lock_path))?;

        let entries = if path.exists() {
            read_entries(&path)?
        } else {
            Vec::new()
        };
        let last_seq = entries.iter().map(|e| e.seq).max().unwrap_or(0);

        Ok(Self {
            path,
            _lock_file: lock_file,
            entries,
            max_queue,
            last_seq,
            dropped_overflow: 0,
            dropped_exhausted: 0,
        })
    }

    /// Append a payload. When the queue is full the oldest entry is dropped
    /// first. Returns the assigned sequence number.
    pub fn enqueue(&mut self, payload: serde_json::Value) -> Result<u64, OutboxError> {
        self.last_seq += 1;
        let seq = self.last_seq;
        let now = Utc::now();
        self.entries.push(OutboxEntry {
            seq,
            created_ts: now,
            payload,
            attempts: 0,
            next_attempt_ts: now,
        });

        while self.entries.len() > self.max_queue {
            let dropped = self.entries.remove(0);
            self.dropped_overflow += 1;
            warn!(seq = dropped.seq, "outbox full, dropping oldest entry");
        }

        self.persist()?;
        Ok(seq)
    }

    /// Oldest not-yet-acked entry.
    pub fn head(&self) -> Option<&OutboxEntry> {
        self.entries.first()
    }

    /// Remove the head after a successful delivery.
    pub fn ack_head(&mut self) -> Result<Option<OutboxEntry>, OutboxError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let entry = self.entries.remove(0);
        self.persist()?;
        Ok(Some(entry))
    }

    /// Record a failed delivery attempt on the head. Returns the new attempt
    /// count, or `None` when the queue is empty.
    pub fn record_failure(
        &mut self,
        next_attempt_ts: DateTime<Utc>,
    ) -> Result<Option<u32>, OutboxError> {
        let Some(head) = self.entries.first_mut() else {
            return Ok(None);
        };
        head.attempts += 1;
        head.next_attempt_ts = next_attempt_ts;
        let attempts = head.attempts;
        self.persist()?;
        Ok(Some(attempts))
    }

    /// Drop the head after it exhausted its delivery attempts.
    pub fn drop_head_exhausted(&mut self) -> Result<Option<OutboxEntry>, OutboxError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let entry = self.entries.remove(0);
        self.dropped_exhausted += 1;
        warn!(
            seq = entry.seq,
            attempts = entry.attempts,
            "dropping outbox entry after exhausting delivery attempts"
        );
        self.persist()?;
        Ok(Some(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> OutboxStats {
        OutboxStats {
            len: self.entries.len(),
            last_seq: self.last_seq,
            dropped_overflow: self.dropped_overflow,
            dropped_exhausted: self.dropped_exhausted,
        }
    }

    /// Rewrite the whole file: header, then one entry per line, through a
    /// temp file, fsync, atomic rename.
    fn persist(&self) -> Result<(), OutboxError> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            let header = serde_json::to_vec(&Header {
                version: FORMAT_VERSION,
            })?;
            file.write_all(&header)?;
            file.write_all(b"\n")?;
            for entry in &self.entries {
                let line = serde_json::to_vec(entry)?;
                file.write_all(&line)?;
                file.write_all(b"\n")?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "outbox".to_string());
    name.push_str(".lock");
    path.with_file_name(name)
}

/// Read entries, skipping the header and any corrupt lines (with a warning).
fn read_entries(path: &Path) -> Result<Vec<OutboxEntry>, OutboxError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if idx == 0 {
            match serde_json::from_str::<Header>(trimmed) {
                Ok(header) if header.version == FORMAT_VERSION => continue,
                Ok(header) => {
                    warn!(
                        version = header.version,
                        "unexpected outbox format version, reading anyway"
                    );
                    continue;
                }
                // No header line: legacy file, fall through and try as entry
                Err(_) => {}
            }
        }
        match serde_json::from_str::<OutboxEntry>(trimmed) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "corrupt outbox entry, skipping");
            }
        }
    }

    // Head must stay the oldest entry even if the file was edited by hand
    entries.sort_by_key(|e| e.seq);
    Ok(entries)
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
