// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Suppression rule cache.
//!
//! Rules live in the external store; the cache holds them in memory and
//! refreshes on access once the TTL elapses. The verdict type encodes the
//! fail-open contract: any internal error yields `PassThrough`, never a
//! dropped event. Counter updates run off the verdict path and cannot change
//! the outcome.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use resolvix_core::SuppressionRule;
use sqlx::postgres::PgPool;
use sqlx::Row;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from rule store access
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Rule store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Result of evaluating a line against the rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionVerdict {
    Suppressed { rule_id: i64 },
    PassThrough,
}

impl SuppressionVerdict {
    pub fn is_suppressed(&self) -> bool {
        matches!(self, SuppressionVerdict::Suppressed { .. })
    }
}

/// Stats surfaced in `/api/status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SuppressionStats {
    pub enabled: bool,
    pub rule_count: usize,
    pub hits: u64,
    pub last_refresh_secs_ago: Option<u64>,
}

struct CacheInner {
    rules: Arc<Vec<SuppressionRule>>,
    last_refresh: Option<Instant>,
}

/// TTL-cached view of the suppression rules.
pub struct RuleCache {
    /// `None` when the daemon runs without a rule store: suppression
    /// disabled, every verdict passes through.
    pool: Option<PgPool>,
    node_ip: String,
    ttl: Duration,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
}

impl RuleCache {
    pub fn new(pool: Option<PgPool>, node_ip: String, ttl: Duration) -> Self {
        Self {
            pool,
            node_ip,
            ttl,
            inner: Mutex::new(CacheInner {
                rules: Arc::new(Vec::new()),
                last_refresh: None,
            }),
            hits: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.pool.is_some()
    }

    /// Decide whether `line` is suppressed by an active rule.
    ///
    /// Fail-open: a store error (cache never loaded, refresh failing) yields
    /// `PassThrough`. A successful match increments the rule's counters in
    /// the store without blocking or affecting the verdict.
    pub async fn should_suppress(&self, line: &str) -> SuppressionVerdict {
        let Some(pool) = &self.pool else {
            return SuppressionVerdict::PassThrough;
        };

        let rules = self.rules_fresh().await;
        let verdict = evaluate(&rules, Utc::now(), &self.node_ip, line);

        if let SuppressionVerdict::Suppressed { rule_id } = verdict {
            self.hits.fetch_add(1, Ordering::Relaxed);
            let pool = pool.clone();
            tokio::spawn(async move {
                if let Err(e) = bump_counters(&pool, rule_id).await {
                    warn!(rule_id, error = %e, "failed to update suppression counters");
                }
            });
        }
        verdict
    }

    /// Drop the TTL and reload immediately. Exposed for tests and for
    /// post-mutation reloads from the control plane.
    pub async fn force_reload(&self) -> Result<usize, RuleError> {
        let Some(pool) = &self.pool else {
            return Ok(0);
        };
        let rules = fetch_rules(pool).await?;
        let count = rules.len();
        let mut inner = self.inner.lock();
        inner.rules = Arc::new(rules);
        inner.last_refresh = Some(Instant::now());
        debug!(count, "suppression rules reloaded");
        Ok(count)
    }

    pub fn stats(&self) -> SuppressionStats {
        let inner = self.inner.lock();
        SuppressionStats {
            enabled: self.pool.is_some(),
            rule_count: inner.rules.len(),
            hits: self.hits.load(Ordering::Relaxed),
            last_refresh_secs_ago: inner.last_refresh.map(|t| t.elapsed().as_secs()),
        }
    }

    /// Current rule slice, refreshed when stale. A failed refresh keeps the
    /// previous cache and logs.
    async fn rules_fresh(&self) -> Arc<Vec<SuppressionRule>> {
        let needs_refresh = {
            let inner = self.inner.lock();
            match inner.last_refresh {
                Some(at) => at.elapsed() >= self.ttl,
                None => true,
            }
        };

        if needs_refresh {
            match self.force_reload().await {
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "suppression rule refresh failed, keeping cached rules");
                }
            }
        }

        self.inner.lock().rules.clone()
    }
}

/// Pure evaluation: rules in ascending id order, first active match wins.
/// Matching lowercases both sides before the substring test.
pub(crate) fn evaluate(
    rules: &[SuppressionRule],
    now: DateTime<Utc>,
    node_ip: &str,
    line: &str,
) -> SuppressionVerdict {
    let line_lower = line.to_lowercase();
    for rule in rules {
        if rule.is_active(now, node_ip) && rule.matches_lowered(&line_lower) {
            return SuppressionVerdict::Suppressed { rule_id: rule.id };
        }
    }
    SuppressionVerdict::PassThrough
}

async fn fetch_rules(pool: &PgPool) -> Result<Vec<SuppressionRule>, RuleError> {
    let rows = sqlx::query(
        "SELECT id, name, match_text, node_ip, duration_type, expires_at, \
         enabled, match_count, last_matched_at \
         FROM suppression_rules WHERE enabled = true ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut rules = Vec::with_capacity(rows.len());
    for row in rows {
        rules.push(SuppressionRule {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            match_text: row.try_get("match_text")?,
            node_ip: row.try_get("node_ip")?,
            duration_type: row.try_get("duration_type")?,
            expires_at: row.try_get("expires_at")?,
            enabled: row.try_get("enabled")?,
            match_count: row.try_get("match_count")?,
            last_matched_at: row.try_get("last_matched_at")?,
        });
    }
    Ok(rules)
}

async fn bump_counters(pool: &PgPool, rule_id: i64) -> Result<(), RuleError> {
    sqlx::query(
        "UPDATE suppression_rules \
         SET match_count = match_count + 1, last_matched_at = now() \
         WHERE id = $1",
    )
    .bind(rule_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
#[path = "suppression_tests.rs"]
mod tests;
