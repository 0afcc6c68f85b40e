// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suppression rules.
//!
//! The rule store is authoritative; the collector only reads rules and
//! increments match counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A suppression rule loaded from the rule store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressionRule {
    pub id: i64,
    pub name: String,
    pub match_text: String,
    /// `None` means the rule applies to any node.
    pub node_ip: Option<String>,
    pub duration_type: Option<String>,
    /// `None` means the rule never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub match_count: i64,
    pub last_matched_at: Option<DateTime<Utc>>,
}

impl SuppressionRule {
    /// A rule is active iff it is enabled, not expired, and either
    /// node-agnostic or pinned to this node's IP.
    pub fn is_active(&self, now: DateTime<Utc>, node_ip: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at <= now {
                return false;
            }
        }
        match &self.node_ip {
            Some(ip) => ip == node_ip,
            None => true,
        }
    }

    /// Case-insensitive substring test against a pre-lowercased line.
    pub fn matches_lowered(&self, line_lower: &str) -> bool {
        line_lower.contains(&self.match_text.to_lowercase())
    }
}

#[cfg(test)]
#[path = "rule_tests.rs"]
mod tests;
