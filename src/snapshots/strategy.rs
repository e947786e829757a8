//! Политика снапшотов: пора ли материализовать новый снапшот.
//!
//! Решение чистое (без побочных эффектов); строит и сохраняет снапшот вызывающая сторона.

use std::time::Duration;

use crate::config::ProjConfig;

pub trait SnapshotStrategy: Send + Sync {
    /// `last_snapshot_ts` и `now` - epoch millis; ревизии - snapshot markers.
    fn should_snapshot(
        &self,
        last_snapshot_ts: i64,
        last_snapshot_revision: i32,
        current_revision: i32,
        now: i64,
    ) -> bool;
}

/// Снапшот, если с прошлого прошло >= offset ИЛИ накопилось >= events_in_snapshot коммитов.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSnapshotStrategy {
    offset: Duration,
    events_in_snapshot: u32,
}

impl DefaultSnapshotStrategy {
    pub fn new(offset: Duration, events_in_snapshot: u32) -> Self {
        Self {
            offset,
            events_in_snapshot,
        }
    }

    pub fn from_config(cfg: &ProjConfig) -> Self {
        Self::new(cfg.snapshot_offset(), cfg.events_in_snapshot)
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn events_in_snapshot(&self) -> u32 {
        self.events_in_snapshot
    }
}

impl Default for DefaultSnapshotStrategy {
    fn default() -> Self {
        Self::from_config(&ProjConfig::default())
    }
}

impl SnapshotStrategy for DefaultSnapshotStrategy {
    fn should_snapshot(
        &self,
        last_snapshot_ts: i64,
        last_snapshot_revision: i32,
        current_revision: i32,
        now: i64,
    ) -> bool {
        let accumulated = i64::from(current_revision) - i64::from(last_snapshot_revision);
        if accumulated >= i64::from(self.events_in_snapshot) {
            return true;
        }
        let offset_ms = i64::try_from(self.offset.as_millis()).unwrap_or(i64::MAX);
        now.saturating_sub(last_snapshot_ts) >= offset_ms
    }
}

/// Никогда не делать снапшоты.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshotStrategy;

impl SnapshotStrategy for NoSnapshotStrategy {
    fn should_snapshot(&self, _: i64, _: i32, _: i32, _: i64) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    #[test]
    fn commit_threshold_triggers() {
        let s = DefaultSnapshotStrategy::new(Duration::from_secs(3600), 500);
        let now = 10 * HOUR_MS;
        assert!(!s.should_snapshot(now, 100, 599, now));
        assert!(s.should_snapshot(now, 100, 600, now));
    }

    #[test]
    fn time_threshold_triggers() {
        let s = DefaultSnapshotStrategy::new(Duration::from_secs(3600), 500);
        let last = 5 * HOUR_MS;
        assert!(!s.should_snapshot(last, 1, 2, last + HOUR_MS - 1));
        assert!(s.should_snapshot(last, 1, 2, last + HOUR_MS));
    }

    #[test]
    fn defaults_are_ten_days_and_five_hundred() {
        let s = DefaultSnapshotStrategy::default();
        assert_eq!(s.offset(), Duration::from_secs(10 * 24 * 3600));
        assert_eq!(s.events_in_snapshot(), 500);
    }

    #[test]
    fn never_strategy_says_no() {
        assert!(!NoSnapshotStrategy.should_snapshot(0, 0, i32::MAX, i64::MAX));
    }
}
