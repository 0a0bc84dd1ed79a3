use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time counters for one decision cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub refreshes: u64,
    pub refresh_denials: u64,
    pub purges: u64,
    pub backend_errors: u64,
    /// Eligible refreshes not dispatched, because the limiter was full or a
    /// query for the key was already running.
    pub refreshes_skipped: u64,
    pub entries: usize,
    pub pending_refreshes: usize,
    pub hit_rate: f64,
}

impl CacheStats {
    /// Hit rate as a percentage of all lookups.
    pub fn calculate_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_denials: AtomicU64,
    purges: AtomicU64,
    backend_errors: AtomicU64,
    refreshes_skipped: AtomicU64,
}

impl StatsRecorder {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refreshed(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_denied(&self) {
        self.refresh_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn purged(&self) {
        self.purges.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refresh_skipped(&self) {
        self.refreshes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, entries: usize, pending_refreshes: usize) -> CacheStats {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_denials: self.refresh_denials.load(Ordering::Relaxed),
            purges: self.purges.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
            entries,
            pending_refreshes,
            hit_rate: 0.0,
        };
        stats.hit_rate = stats.calculate_hit_rate();
        stats
    }
}
