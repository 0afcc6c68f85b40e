// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted monitoring config.
//!
//! JSON file with shape `{"monitoring":{"log_files":[...]}}`. Writes go
//! through a temp file, fsync, then atomic rename so a crash mid-save never
//! corrupts the config. An absent file reads as an empty set; a corrupt file
//! is rotated to `.bak` and also reads as empty.

use resolvix_core::MonitoredFile;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur in config store operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    monitoring: MonitoringSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MonitoringSection {
    #[serde(default)]
    log_files: Vec<MonitoredFile>,
}

/// Store for the monitored-file set.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the monitored-file set.
    ///
    /// Returns an empty set when the file does not exist. A file that fails
    /// to parse is moved to `.bak` and treated as empty so the daemon still
    /// starts.
    pub fn load(&self) -> Result<Vec<MonitoredFile>, ConfigError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, ConfigFile>(reader) {
            Ok(config) => Ok(config.monitoring.log_files),
            Err(e) => {
                let bak_path = self.path.with_extension("bak");
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    bak = %bak_path.display(),
                    "Corrupt config, moving to .bak and starting empty",
                );
                fs::rename(&self.path, &bak_path)?;
                Ok(Vec::new())
            }
        }
    }

    /// Save the monitored-file set atomically (write to .tmp, fsync, rename).
    pub fn save(&self, files: &[MonitoredFile]) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config = ConfigFile {
            monitoring: MonitoringSection {
                log_files: files.to_vec(),
            },
        };

        let tmp_path = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &config)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
