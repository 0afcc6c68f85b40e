// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitor supervisor: owns the authoritative label → monitored-file map
//! plus one tailer task per entry.
//!
//! Mutations (add/remove/reload) take the write lock; tailers observe their
//! own deregistration by read-lock checks on each poll, with a cancellation
//! token for prompt teardown. After every mutation the new set is persisted;
//! a persist failure is logged and never rolls back the in-memory state.

use parking_lot::{Mutex, RwLock};
use resolvix_core::{derive_label, unique_label, MonitoredFile, MonitoredFileSpec, Priority};
use resolvix_storage::ConfigStore;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::tailer::{run_tailer, TailedLine, TailerConfig};

/// Errors from supervisor operations
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Config error: {0}")]
    Config(#[from] resolvix_storage::ConfigError),
}

/// Lifecycle state of a tailer task, surfaced in `/api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerStatus {
    Starting,
    Running,
    /// The tailed path is currently missing.
    Paused,
    Stopped,
}

/// Registry entry: the record plus the handles of its tailer task.
pub struct TailerHandle {
    pub file: MonitoredFile,
    pub cancel: CancellationToken,
    pub status: Arc<Mutex<TailerStatus>>,
}

/// Shared label → entry map. Tailers hold this to poll for their own
/// presence; the supervisor is the only writer.
pub type Registry = Arc<RwLock<HashMap<String, TailerHandle>>>;

/// Outcome of an add batch. Partial success is allowed.
#[derive(Debug, Clone, Default)]
pub struct AddOutcome {
    pub added: Vec<MonitoredFile>,
    pub failed: Vec<FailedSpec>,
}

#[derive(Debug, Clone)]
pub struct FailedSpec {
    pub path: String,
    pub error: String,
}

/// Outcome of a remove batch.
#[derive(Debug, Clone, Default)]
pub struct RemoveOutcome {
    pub removed: Vec<String>,
    pub not_found: Vec<String>,
    pub cannot_remove: Vec<String>,
}

/// Owns the monitored-file set and its tailer tasks.
pub struct Supervisor {
    registry: Registry,
    config: ConfigStore,
    line_tx: mpsc::Sender<TailedLine>,
    shutdown: CancellationToken,
    tailer_config: TailerConfig,
}

impl Supervisor {
    pub fn new(
        config: ConfigStore,
        line_tx: mpsc::Sender<TailedLine>,
        shutdown: CancellationToken,
        tailer_config: TailerConfig,
    ) -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            config,
            line_tx,
            shutdown,
            tailer_config,
        }
    }

    /// Snapshot of the live set, sorted by label for stable output.
    pub fn list(&self) -> Vec<MonitoredFile> {
        let mut files: Vec<MonitoredFile> = self
            .registry
            .read()
            .values()
            .map(|h| h.file.clone())
            .collect();
        files.sort_by(|a, b| a.label.cmp(&b.label));
        files
    }

    /// Labels whose tailer is currently paused (path missing).
    pub fn paused_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .registry
            .read()
            .iter()
            .filter(|(_, h)| *h.status.lock() == TailerStatus::Paused)
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// Validate and register each spec; spawn a tailer per accepted entry.
    ///
    /// Must run inside a tokio runtime. Partial success is allowed; the
    /// persisted config is rewritten once at the end of the batch.
    pub fn add(&self, specs: Vec<MonitoredFileSpec>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        for spec in specs {
            match self.register_one(&spec) {
                Ok(file) => outcome.added.push(file),
                Err(reason) => outcome.failed.push(FailedSpec {
                    path: spec.path.clone(),
                    error: reason,
                }),
            }
        }

        if !outcome.added.is_empty() {
            self.persist();
        }
        outcome
    }

    /// Remove entries by label. Auto-monitored entries are refused; tailer
    /// shutdown is cooperative (the token fires, and the tailer also notices
    /// the registry no longer holds its label).
    pub fn remove(&self, labels: Vec<String>) -> RemoveOutcome {
        let mut outcome = RemoveOutcome::default();

        {
            let mut registry = self.registry.write();
            for label in labels {
                let auto_monitor = match registry.get(&label) {
                    None => {
                        outcome.not_found.push(label);
                        continue;
                    }
                    Some(handle) => handle.file.auto_monitor,
                };
                if auto_monitor {
                    outcome.cannot_remove.push(label);
                    continue;
                }
                if let Some(handle) = registry.remove(&label) {
                    handle.cancel.cancel();
                    info!(label = %label, "monitored file removed");
                    outcome.removed.push(label);
                }
            }
        }

        if !outcome.removed.is_empty() {
            self.persist();
        }
        outcome
    }

    /// Re-read the persisted config and reconcile: add new entries, leave
    /// running entries alone, stop entries no longer present.
    pub fn reload(&self) -> Result<(), SupervisorError> {
        let desired = self.config.load()?;
        let desired_labels: HashSet<String> = desired.iter().map(|f| f.label.clone()).collect();

        let mut registry = self.registry.write();

        let stale: Vec<String> = registry
            .keys()
            .filter(|label| !desired_labels.contains(*label))
            .cloned()
            .collect();
        for label in stale {
            if let Some(handle) = registry.remove(&label) {
                handle.cancel.cancel();
                info!(label = %label, "monitored file dropped by reload");
            }
        }

        for file in desired {
            if !registry.contains_key(&file.label) {
                let label = file.label.clone();
                self.spawn_entry(&mut registry, file);
                info!(label = %label, "monitored file added by reload");
            }
        }

        Ok(())
    }

    /// Register a pre-built record without validation. Used at bootstrap for
    /// config rows and auto-monitored entries.
    pub fn adopt(&self, file: MonitoredFile) {
        let mut registry = self.registry.write();
        if registry.contains_key(&file.label) {
            return;
        }
        self.spawn_entry(&mut registry, file);
    }

    /// Persist the current set. Failures are logged, not propagated.
    pub fn persist(&self) {
        let files = self.list();
        if let Err(e) = self.config.save(&files) {
            error!(error = %e, "failed to persist monitoring config");
        }
    }

    fn register_one(&self, spec: &MonitoredFileSpec) -> Result<MonitoredFile, String> {
        if spec.path.is_empty() {
            return Err("Path is required".to_string());
        }
        let path = Path::new(&spec.path);
        if !path.is_absolute() {
            return Err("Path must be absolute".to_string());
        }
        let meta = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err("File not found".to_string());
            }
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return Err("Permission denied".to_string());
            }
            Err(e) => return Err(format!("Cannot stat file: {e}")),
        };
        if !meta.is_file() {
            return Err("Not a regular file".to_string());
        }
        if std::fs::File::open(path).is_err() {
            return Err("Permission denied".to_string());
        }

        let mut registry = self.registry.write();

        let taken: HashSet<String> = registry.keys().cloned().collect();
        let label = match &spec.label {
            Some(label) => {
                if taken.contains(label) {
                    return Err(format!("Label already exists: {label}"));
                }
                label.clone()
            }
            None => unique_label(&derive_label(path), &taken),
        };

        if registry
            .values()
            .any(|h| h.file.path == PathBuf::from(&spec.path))
        {
            return Err("File already being monitored".to_string());
        }

        let priority = match &spec.priority {
            Some(p) => p
                .parse::<Priority>()
                .map_err(|_| format!("Invalid priority: {p}"))?,
            None => Priority::default(),
        };

        let file = MonitoredFile::new(PathBuf::from(&spec.path), label, priority);
        let registered = file.clone();
        self.spawn_entry(&mut registry, file);
        info!(
            label = %registered.label,
            path = %registered.path.display(),
            "monitored file added"
        );
        Ok(registered)
    }

    /// Insert the entry and spawn its tailer. Caller holds the write lock.
    fn spawn_entry(&self, registry: &mut HashMap<String, TailerHandle>, file: MonitoredFile) {
        let cancel = self.shutdown.child_token();
        let status = Arc::new(Mutex::new(TailerStatus::Starting));

        registry.insert(
            file.label.clone(),
            TailerHandle {
                file: file.clone(),
                cancel: cancel.clone(),
                status,
            },
        );

        tokio::spawn(run_tailer(
            file,
            Arc::clone(&self.registry),
            self.line_tx.clone(),
            cancel,
            self.tailer_config.clone(),
        ));
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
