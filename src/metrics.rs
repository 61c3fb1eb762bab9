//! # Migration Metrics
//!
//! Aggregate counters for one orchestrator instance. Apart from resolved handles these are
//! the only state the core makes visible to its caller.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, shared between the retry executor, the reconciler and the row loader
#[derive(Debug, Default)]
pub struct MigrationMetrics {
    sheets_created: AtomicU64,
    sheets_reused: AtomicU64,
    columns_created: AtomicU64,
    columns_reused: AtomicU64,
    duplicate_races: AtomicU64,
    rows_written: AtomicU64,
    remote_calls: AtomicU64,
    retries: AtomicU64,
    structural_warnings: AtomicU64,
}

/// Point-in-time copy of [`MigrationMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sheets_created: u64,
    pub sheets_reused: u64,
    pub columns_created: u64,
    pub columns_reused: u64,
    /// Creates that lost a race and resolved to the existing resource
    pub duplicate_races: u64,
    pub rows_written: u64,
    /// Every attempt of every remote call
    pub remote_calls: u64,
    pub retries: u64,
    pub structural_warnings: u64,
}

impl MetricsSnapshot {
    pub fn resources_created(&self) -> u64 {
        self.sheets_created + self.columns_created
    }

    pub fn resources_reused(&self) -> u64 {
        self.sheets_reused + self.columns_reused
    }

    /// Counter deltas since an earlier snapshot
    pub fn since(&self, earlier: &MetricsSnapshot) -> MetricsSnapshot {
        MetricsSnapshot {
            sheets_created: self.sheets_created.saturating_sub(earlier.sheets_created),
            sheets_reused: self.sheets_reused.saturating_sub(earlier.sheets_reused),
            columns_created: self.columns_created.saturating_sub(earlier.columns_created),
            columns_reused: self.columns_reused.saturating_sub(earlier.columns_reused),
            duplicate_races: self.duplicate_races.saturating_sub(earlier.duplicate_races),
            rows_written: self.rows_written.saturating_sub(earlier.rows_written),
            remote_calls: self.remote_calls.saturating_sub(earlier.remote_calls),
            retries: self.retries.saturating_sub(earlier.retries),
            structural_warnings: self
                .structural_warnings
                .saturating_sub(earlier.structural_warnings),
        }
    }
}

impl MigrationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sheet_created(&self) {
        self.sheets_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sheet_reused(&self) {
        self.sheets_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_column_created(&self) {
        self.columns_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_column_reused(&self) {
        self.columns_reused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate_race(&self) {
        self.duplicate_races.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rows_written(&self, count: u64) {
        self.rows_written.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_remote_call(&self) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_structural_warnings(&self, count: u64) {
        self.structural_warnings.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sheets_created: self.sheets_created.load(Ordering::Relaxed),
            sheets_reused: self.sheets_reused.load(Ordering::Relaxed),
            columns_created: self.columns_created.load(Ordering::Relaxed),
            columns_reused: self.columns_reused.load(Ordering::Relaxed),
            duplicate_races: self.duplicate_races.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            structural_warnings: self.structural_warnings.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_delta() {
        let metrics = MigrationMetrics::new();
        metrics.record_sheet_created();
        metrics.record_column_created();
        let before = metrics.snapshot();

        metrics.record_sheet_reused();
        metrics.record_rows_written(3);
        let delta = metrics.snapshot().since(&before);

        assert_eq!(delta.resources_created(), 0);
        assert_eq!(delta.resources_reused(), 1);
        assert_eq!(delta.rows_written, 3);
        assert_eq!(before.resources_created(), 2);
    }
}
