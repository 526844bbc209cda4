//! Cache Statistics
//!
//! Counters shared by every bounded cache, the limiter's counter store
//! included.

use serde::Serialize;

// == Cache Stats ==
/// Per-cache counters, reset only when the cache is rebuilt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads that found a live entry
    pub hits: u64,
    /// Reads that found nothing, or only an expired entry
    pub misses: u64,
    /// Entries dropped to make room for a new key
    pub evictions: u64,
    /// Number of expired entries reclaimed by a purge
    pub purged: u64,
    /// Stored entries, expired ones awaiting a purge included
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of reads that hit; 0.0 before the first read.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_purged(&mut self, count: usize) {
        self.purged += count as u64;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
