// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monitored-file records and label derivation.

use crate::priority::Priority;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A file registered for monitoring.
///
/// `label` and `path` are unique across the live set. `auto_monitor` entries
/// are injected by the daemon itself and cannot be removed via the control
/// plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredFile {
    /// Opaque id, stable across restarts.
    pub id: String,
    pub path: PathBuf,
    pub label: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub auto_monitor: bool,
}

fn default_true() -> bool {
    true
}

impl MonitoredFile {
    /// Create a fresh record with a random id and current timestamps.
    pub fn new(path: PathBuf, label: String, priority: Priority) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            label,
            priority,
            enabled: true,
            created_at: now,
            last_modified: now,
            auto_monitor: false,
        }
    }

    /// Same as [`MonitoredFile::new`] but flagged as auto-monitored.
    pub fn auto(path: PathBuf, label: String, priority: Priority) -> Self {
        Self {
            auto_monitor: true,
            ..Self::new(path, label, priority)
        }
    }
}

/// Operator-supplied spec for registering a file.
///
/// `label` and `priority` are optional: the label is derived from the path
/// when absent, the priority defaults to medium.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredFileSpec {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

/// Derive a label from a path: the parent directory name plus the file stem,
/// sanitized. `/var/log/apache2/error.log` becomes `apache2_error`.
pub fn derive_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parent = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|s| s.to_string_lossy().into_owned());

    let raw = match parent {
        Some(dir) => format!("{dir}_{stem}"),
        None => stem,
    };

    let sanitized = sanitize(&raw);
    if sanitized.is_empty() {
        "log".to_string()
    } else {
        sanitized
    }
}

/// Make `label` unique against `taken` by suffixing `_2`, `_3`, ...
pub fn unique_label(label: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(label) {
        return label.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{label}_{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Lowercase and collapse runs of non-alphanumerics to a single `_`,
/// trimming leading/trailing underscores.
fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[cfg(test)]
#[path = "monitored_file_tests.rs"]
mod tests;
