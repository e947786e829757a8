//! Lightweight global metrics for the projection store.
//!
//! Потокобезопасные атомарные счётчики для подсистем:
//! - Commit log (append / scan)
//! - Snapshots
//! - DDL и кэши подготовленных выражений
//! - Local session backends

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

// ----- Commits -----
static COMMITS_APPENDED: AtomicU64 = AtomicU64::new(0);
static COMMIT_SCANS: AtomicU64 = AtomicU64::new(0);
static SCAN_BUCKETS_READ: AtomicU64 = AtomicU64::new(0);
static SCAN_COMMITS_RETURNED: AtomicU64 = AtomicU64::new(0);
static SCAN_CAPACITY_WARNINGS: AtomicU64 = AtomicU64::new(0);

// ----- Snapshots -----
static SNAPSHOT_LOADS: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_MISSING: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_SAVES: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_SKIPPED: AtomicU64 = AtomicU64::new(0);

// ----- DDL / prepared -----
static DDL_CREATES: AtomicU64 = AtomicU64::new(0);
static DDL_DROPS: AtomicU64 = AtomicU64::new(0);
static PREPARED_BUILT: AtomicU64 = AtomicU64::new(0);
static PREPARED_CACHE_HITS: AtomicU64 = AtomicU64::new(0);

// ----- Sessions -----
static SESSION_EXECUTIONS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    // Commits
    pub commits_appended: u64,
    pub commit_scans: u64,
    pub scan_buckets_read: u64,
    pub scan_commits_returned: u64,
    pub scan_capacity_warnings: u64,

    // Snapshots
    pub snapshot_loads: u64,
    pub snapshot_missing: u64,
    pub snapshot_saves: u64,
    pub snapshot_skipped: u64,

    // DDL / prepared
    pub ddl_creates: u64,
    pub ddl_drops: u64,
    pub prepared_built: u64,
    pub prepared_cache_hits: u64,

    // Sessions
    pub session_executions: u64,
}

impl MetricsSnapshot {
    /// Среднее число непустых бакетов на скан (последний, пустой, тоже считается).
    pub fn avg_buckets_per_scan(&self) -> f64 {
        if self.commit_scans == 0 {
            0.0
        } else {
            self.scan_buckets_read as f64 / self.commit_scans as f64
        }
    }

    pub fn prepared_hit_ratio(&self) -> f64 {
        let total = self.prepared_built + self.prepared_cache_hits;
        if total == 0 {
            0.0
        } else {
            self.prepared_cache_hits as f64 / total as f64
        }
    }
}

// ----- Recorders (Commits) -----
pub fn record_commit_appended() {
    COMMITS_APPENDED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_scan(buckets: u64, commits: u64) {
    COMMIT_SCANS.fetch_add(1, Ordering::Relaxed);
    SCAN_BUCKETS_READ.fetch_add(buckets, Ordering::Relaxed);
    SCAN_COMMITS_RETURNED.fetch_add(commits, Ordering::Relaxed);
}

pub fn record_scan_capacity_warning() {
    SCAN_CAPACITY_WARNINGS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Snapshots) -----
pub fn record_snapshot_load(found: bool) {
    SNAPSHOT_LOADS.fetch_add(1, Ordering::Relaxed);
    if !found {
        SNAPSHOT_MISSING.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn record_snapshot_save() {
    SNAPSHOT_SAVES.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_skipped() {
    SNAPSHOT_SKIPPED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (DDL / prepared) -----
pub fn record_ddl_create() {
    DDL_CREATES.fetch_add(1, Ordering::Relaxed);
}
pub fn record_ddl_drop() {
    DDL_DROPS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_prepared_built() {
    PREPARED_BUILT.fetch_add(1, Ordering::Relaxed);
}
pub fn record_prepared_hit() {
    PREPARED_CACHE_HITS.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Sessions) -----
pub fn record_session_execution() {
    SESSION_EXECUTIONS.fetch_add(1, Ordering::Relaxed);
}

/// Снимок всех счётчиков.
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        commits_appended: COMMITS_APPENDED.load(Ordering::Relaxed),
        commit_scans: COMMIT_SCANS.load(Ordering::Relaxed),
        scan_buckets_read: SCAN_BUCKETS_READ.load(Ordering::Relaxed),
        scan_commits_returned: SCAN_COMMITS_RETURNED.load(Ordering::Relaxed),
        scan_capacity_warnings: SCAN_CAPACITY_WARNINGS.load(Ordering::Relaxed),

        snapshot_loads: SNAPSHOT_LOADS.load(Ordering::Relaxed),
        snapshot_missing: SNAPSHOT_MISSING.load(Ordering::Relaxed),
        snapshot_saves: SNAPSHOT_SAVES.load(Ordering::Relaxed),
        snapshot_skipped: SNAPSHOT_SKIPPED.load(Ordering::Relaxed),

        ddl_creates: DDL_CREATES.load(Ordering::Relaxed),
        ddl_drops: DDL_DROPS.load(Ordering::Relaxed),
        prepared_built: PREPARED_BUILT.load(Ordering::Relaxed),
        prepared_cache_hits: PREPARED_CACHE_HITS.load(Ordering::Relaxed),

        session_executions: SESSION_EXECUTIONS.load(Ordering::Relaxed),
    }
}

/// Сбросить все счётчики (удобно в тестах).
pub fn reset() {
    for c in [
        &COMMITS_APPENDED,
        &COMMIT_SCANS,
        &SCAN_BUCKETS_READ,
        &SCAN_COMMITS_RETURNED,
        &SCAN_CAPACITY_WARNINGS,
        &SNAPSHOT_LOADS,
        &SNAPSHOT_MISSING,
        &SNAPSHOT_SAVES,
        &SNAPSHOT_SKIPPED,
        &DDL_CREATES,
        &DDL_DROPS,
        &PREPARED_BUILT,
        &PREPARED_CACHE_HITS,
        &SESSION_EXECUTIONS,
    ] {
        c.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_every_counter() -> anyhow::Result<()> {
        let doc = serde_json::to_value(MetricsSnapshot {
            scan_capacity_warnings: 3,
            ..MetricsSnapshot::default()
        })?;
        assert_eq!(doc["scan_capacity_warnings"], 3);
        assert_eq!(doc["session_executions"], 0);
        assert_eq!(doc.as_object().map(|o| o.len()), Some(14));
        Ok(())
    }
}
