//! Counters for one fetcher's lifetime
//!
//! Atomic counters so every per-file task can record into the same
//! instance without locking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about verification and fetch activity
#[derive(Debug, Default)]
pub struct FetchMetrics {
    pub files_checked: AtomicU64,
    pub already_valid: AtomicU64,
    pub fetches_started: AtomicU64,
    pub fetches_completed: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub verification_failures: AtomicU64,
    pub files_removed: AtomicU64,
    pub bytes_downloaded: AtomicU64,
}

impl FetchMetrics {
    /// Record that a file was checked before any fetch decision
    pub fn record_file_checked(&self) {
        self.files_checked.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a file was valid without fetching
    pub fn record_already_valid(&self) {
        self.already_valid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_completed(&self, bytes: u64) {
        self.fetches_completed.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_fetch_failed(&self) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that a fetched file still failed verification
    pub fn record_verification_failed(&self) {
        self.verification_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_file_removed(&self) {
        self.files_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> FetchMetricsSnapshot {
        FetchMetricsSnapshot {
            files_checked: self.files_checked.load(Ordering::Relaxed),
            already_valid: self.already_valid.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_completed: self.fetches_completed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchMetricsSnapshot {
    pub files_checked: u64,
    pub already_valid: u64,
    pub fetches_started: u64,
    pub fetches_completed: u64,
    pub fetch_failures: u64,
    pub verification_failures: u64,
    pub files_removed: u64,
    pub bytes_downloaded: u64,
}

impl FetchMetricsSnapshot {
    /// Share of checked files that needed no network activity
    pub fn cache_hit_rate(&self) -> f64 {
        if self.files_checked == 0 {
            0.0
        } else {
            self.already_valid as f64 / self.files_checked as f64
        }
    }
}
