//! Centralized configuration for the projection store.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - ProjConfig::from_env() reads QP_* env vars; fluent with_* setters override.
//!
//! Env:
//! - QP_ROOT                 - корень файлового бэкенда (FileSession); нет => in-memory.
//! - QP_KEYSPACE             - keyspace (default "projections").
//! - QP_SCAN_WARN_COMMITS    - мягкий порог скана (default 1000).
//! - QP_SNAPSHOT_OFFSET_SECS - макс. возраст снапшота (default 10 дней).
//! - QP_SNAPSHOT_EVENTS      - макс. коммитов между снапшотами (default 500).
//! - QP_DATA_FSYNC           - fsync после каждой записи в FileSession ("1|true|on|yes").

use std::fmt;
use std::time::Duration;

use crate::consts::{
    DEFAULT_EVENTS_IN_SNAPSHOT, DEFAULT_KEYSPACE, DEFAULT_SNAPSHOT_OFFSET_SECS, SCAN_WARN_COMMITS,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjConfig {
    /// Root directory for the file-backed session. None => in-memory session.
    /// Env: QP_ROOT
    pub root: Option<String>,

    /// Keyspace (подкаталог под root у FileSession).
    /// Env: QP_KEYSPACE (default "projections")
    pub keyspace: String,

    /// Soft guard: warn when one scan accumulates more commits than this.
    /// Env: QP_SCAN_WARN_COMMITS (default 1000)
    pub scan_warn_commits: usize,

    /// Max age of the last snapshot before a new one is due.
    /// Env: QP_SNAPSHOT_OFFSET_SECS (default 864000)
    pub snapshot_offset_secs: u64,

    /// Max commits accumulated since the last snapshot.
    /// Env: QP_SNAPSHOT_EVENTS (default 500)
    pub events_in_snapshot: u32,

    /// fsync partition files after every append (FileSession).
    /// Env: QP_DATA_FSYNC (default false)
    pub data_fsync: bool,
}

impl Default for ProjConfig {
    fn default() -> Self {
        Self {
            root: None,
            keyspace: DEFAULT_KEYSPACE.to_string(),
            scan_warn_commits: SCAN_WARN_COMMITS,
            snapshot_offset_secs: DEFAULT_SNAPSHOT_OFFSET_SECS,
            events_in_snapshot: DEFAULT_EVENTS_IN_SNAPSHOT,
            data_fsync: false,
        }
    }
}

fn env_flag(v: &str) -> bool {
    let s = v.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "on" || s == "yes"
}

impl ProjConfig {
    /// Load configuration from environment variables (unset => default).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("QP_ROOT") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.root = Some(s.to_string());
            }
        }

        if let Ok(v) = std::env::var("QP_KEYSPACE") {
            let s = v.trim();
            if !s.is_empty() {
                cfg.keyspace = s.to_ascii_lowercase();
            }
        }

        if let Ok(v) = std::env::var("QP_SCAN_WARN_COMMITS") {
            if let Ok(n) = v.trim().parse::<usize>() {
                cfg.scan_warn_commits = n;
            }
        }

        if let Ok(v) = std::env::var("QP_SNAPSHOT_OFFSET_SECS") {
            if let Ok(n) = v.trim().parse::<u64>() {
                cfg.snapshot_offset_secs = n;
            }
        }

        if let Ok(v) = std::env::var("QP_SNAPSHOT_EVENTS") {
            if let Ok(n) = v.trim().parse::<u32>() {
                cfg.events_in_snapshot = n;
            }
        }

        if let Ok(v) = std::env::var("QP_DATA_FSYNC") {
            cfg.data_fsync = env_flag(&v);
        }

        cfg
    }

    pub fn with_root<S: Into<String>>(mut self, root: Option<S>) -> Self {
        self.root = root.map(Into::into);
        self
    }

    pub fn with_keyspace<S: Into<String>>(mut self, keyspace: S) -> Self {
        self.keyspace = keyspace.into().to_ascii_lowercase();
        self
    }

    pub fn with_scan_warn_commits(mut self, n: usize) -> Self {
        self.scan_warn_commits = n;
        self
    }

    pub fn with_snapshot_offset_secs(mut self, secs: u64) -> Self {
        self.snapshot_offset_secs = secs;
        self
    }

    pub fn with_events_in_snapshot(mut self, n: u32) -> Self {
        self.events_in_snapshot = n;
        self
    }

    pub fn with_data_fsync(mut self, on: bool) -> Self {
        self.data_fsync = on;
        self
    }

    #[inline]
    pub fn snapshot_offset(&self) -> Duration {
        Duration::from_secs(self.snapshot_offset_secs)
    }
}

impl fmt::Display for ProjConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ProjConfig {{ \
             root: {}, \
             keyspace: {}, \
             scan_warn_commits: {}, \
             snapshot_offset_secs: {}, \
             events_in_snapshot: {}, \
             data_fsync: {} \
             }}",
            self.root.as_deref().unwrap_or("in-memory"),
            self.keyspace,
            self.scan_warn_commits,
            self.snapshot_offset_secs,
            self.events_in_snapshot,
            self.data_fsync,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_framework_values() {
        let c = ProjConfig::default();
        assert_eq!(c.scan_warn_commits, 1000);
        assert_eq!(c.events_in_snapshot, 500);
        assert_eq!(c.snapshot_offset(), Duration::from_secs(10 * 24 * 3600));
        assert!(c.root.is_none());
    }

    #[test]
    fn keyspace_is_lowercased() {
        let c = ProjConfig::default().with_keyspace("Read_Models");
        assert_eq!(c.keyspace, "read_models");
    }
}
