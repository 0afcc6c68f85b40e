// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Poll-based file tailer.
//!
//! One tailer task per monitored file. Starts at the current EOF and never
//! replays bytes written before start; reopening at offset 0 happens only
//! after rotation, truncation, or the path coming back from the dead.

use chrono::{DateTime, Utc};
use resolvix_core::MonitoredFile;
use std::io::SeekFrom;
use std::os::unix::fs::MetadataExt;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::supervisor::{Registry, TailerStatus};

/// A complete line read from a tailed file.
#[derive(Debug, Clone)]
pub struct TailedLine {
    pub label: String,
    pub file: MonitoredFile,
    pub line: String,
    /// Byte offset of the end of this line within the current file.
    pub offset: u64,
    pub detected_at: DateTime<Utc>,
}

/// Tuning knobs for a tailer task.
#[derive(Debug, Clone)]
pub struct TailerConfig {
    pub poll_interval: Duration,
    /// Poll interval while the path is missing.
    pub paused_poll_interval: Duration,
    /// Reopen attempts (with backoff) before entering the paused state.
    pub reopen_attempts: u32,
    pub reopen_backoff: Duration,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            paused_poll_interval: Duration::from_secs(5),
            reopen_attempts: 5,
            reopen_backoff: Duration::from_millis(500),
        }
    }
}

const READ_CHUNK: usize = 8 * 1024;

/// Follow one file until the label is deregistered or the token fires.
pub(crate) async fn run_tailer(
    file: MonitoredFile,
    registry: Registry,
    tx: mpsc::Sender<TailedLine>,
    cancel: CancellationToken,
    config: TailerConfig,
) {
    let label = file.label.clone();
    let mut tailer = Tailer {
        file,
        registry,
        tx,
        cancel,
        config,
        carry: Vec::new(),
    };
    tailer.run().await;
    debug!(label = %label, "tailer exited");
}

struct Tailer {
    file: MonitoredFile,
    registry: Registry,
    tx: mpsc::Sender<TailedLine>,
    cancel: CancellationToken,
    config: TailerConfig,
    /// Incomplete trailing line carried across reads.
    carry: Vec<u8>,
}

impl Tailer {
    async fn run(&mut self) {
        // Initial open seeks to EOF so history is never replayed.
        let Some((mut handle, mut inode, mut offset)) = self.open_at_end().await else {
            return;
        };
        self.set_status(TailerStatus::Running);
        info!(label = %self.file.label, path = %self.file.path.display(), offset, "tailing from EOF");

        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            if self.should_stop() {
                return;
            }

            // Rotation / truncation / disappearance check
            match tokio::fs::metadata(&self.file.path).await {
                Ok(meta) => {
                    if meta.ino() != inode || meta.len() < offset {
                        info!(
                            label = %self.file.label,
                            "file rotated or truncated, reopening from start"
                        );
                        self.carry.clear();
                        match self.reopen_from_start().await {
                            Some((h, i)) => {
                                handle = h;
                                inode = i;
                                offset = 0;
                                self.set_status(TailerStatus::Running);
                            }
                            None => return,
                        }
                    }
                }
                Err(_) => {
                    // Path gone: bounded backoff, then paused until it returns
                    self.carry.clear();
                    match self.wait_for_path().await {
                        Some((h, i)) => {
                            handle = h;
                            inode = i;
                            offset = 0;
                            self.set_status(TailerStatus::Running);
                        }
                        None => return,
                    }
                }
            }

            match handle.read(&mut buf).await {
                Ok(0) => {
                    if self.sleep_or_stop(self.config.poll_interval).await {
                        return;
                    }
                }
                Ok(n) => {
                    offset += n as u64;
                    self.carry.extend_from_slice(&buf[..n]);
                    if self.emit_complete_lines(offset).await {
                        return;
                    }
                }
                Err(e) => {
                    warn!(label = %self.file.label, error = %e, "read error, reopening");
                    if self.sleep_or_stop(self.config.poll_interval).await {
                        return;
                    }
                    match self.reopen_from_start().await {
                        Some((h, i)) => {
                            handle = h;
                            inode = i;
                            offset = 0;
                            self.carry.clear();
                            self.set_status(TailerStatus::Running);
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Drain complete lines out of the carry buffer. Returns true when the
    /// line channel is closed and the tailer should exit.
    async fn emit_complete_lines(&mut self, offset: u64) -> bool {
        while let Some(pos) = self.carry.iter().position(|&b| b == b'\n') {
            let mut line_bytes: Vec<u8> = self.carry.drain(..=pos).collect();
            line_bytes.pop();
            if line_bytes.last() == Some(&b'\r') {
                line_bytes.pop();
            }
            let line = String::from_utf8_lossy(&line_bytes).into_owned();
            if line.is_empty() {
                continue;
            }
            let tailed = TailedLine {
                label: self.file.label.clone(),
                file: self.file.clone(),
                line,
                offset,
                detected_at: Utc::now(),
            };
            if self.tx.send(tailed).await.is_err() {
                return true;
            }
        }
        false
    }

    /// Open seeking to EOF. When the path is missing at start, fall into the
    /// paused state and come back at offset 0 once it appears.
    async fn open_at_end(&self) -> Option<(File, u64, u64)> {
        let mut handle = match File::open(&self.file.path).await {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    label = %self.file.label,
                    path = %self.file.path.display(),
                    error = %e,
                    "cannot open file at start"
                );
                return self.wait_for_path().await.map(|(h, i)| (h, i, 0));
            }
        };
        let meta = match handle.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!(label = %self.file.label, error = %e, "stat failed on open");
                self.set_status(TailerStatus::Stopped);
                return None;
            }
        };
        let offset = meta.len();
        if handle.seek(SeekFrom::Start(offset)).await.is_err() {
            self.set_status(TailerStatus::Stopped);
            return None;
        }
        Some((handle, meta.ino(), offset))
    }

    async fn reopen_from_start(&self) -> Option<(File, u64)> {
        let mut attempt = 0u32;
        loop {
            if self.should_stop() {
                return None;
            }
            match File::open(&self.file.path).await {
                Ok(handle) => match handle.metadata().await {
                    Ok(meta) => return Some((handle, meta.ino())),
                    Err(_) => {}
                },
                Err(_) => {}
            }
            attempt += 1;
            if attempt >= self.config.reopen_attempts {
                match self.wait_for_path().await {
                    Some(reopened) => return Some(reopened),
                    None => return None,
                }
            }
            if self
                .sleep_or_stop(self.config.reopen_backoff * attempt)
                .await
            {
                return None;
            }
        }
    }

    /// Paused state: the path is missing. Poll slowly until it returns, then
    /// reopen from offset 0.
    async fn wait_for_path(&self) -> Option<(File, u64)> {
        self.set_status(TailerStatus::Paused);
        info!(label = %self.file.label, "file gone, tailer paused");
        loop {
            if self.should_stop() {
                return None;
            }
            if self.sleep_or_stop(self.config.paused_poll_interval).await {
                return None;
            }
            if let Ok(handle) = File::open(&self.file.path).await {
                if let Ok(meta) = handle.metadata().await {
                    info!(label = %self.file.label, "file returned, resuming from start");
                    return Some((handle, meta.ino()));
                }
            }
        }
    }

    /// Cooperative exit: deregistered from the supervisor or cancelled.
    fn should_stop(&self) -> bool {
        if self.cancel.is_cancelled() {
            self.set_status(TailerStatus::Stopped);
            return true;
        }
        if !self.registry.read().contains_key(&self.file.label) {
            debug!(label = %self.file.label, "label deregistered, tailer exiting");
            self.set_status(TailerStatus::Stopped);
            return true;
        }
        false
    }

    /// Sleep, returning true when cancelled mid-sleep.
    async fn sleep_or_stop(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => true,
            _ = tokio::time::sleep(dur) => false,
        }
    }

    fn set_status(&self, status: TailerStatus) {
        if let Some(handle) = self.registry.read().get(&self.file.label) {
            *handle.status.lock() = status;
        }
    }
}

#[cfg(test)]
#[path = "tailer_tests.rs"]
mod tests;
