//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::Duration;

use tokio::time::Instant;

// == Cache Entry ==
/// A stored value plus the bookkeeping the store needs for TTL and recency.
///
/// Timestamps come from tokio's monotonic clock, which tests can pause and
/// advance.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// When the value was written
    pub inserted_at: Instant,
    /// Last `get` hit (or the write itself)
    pub last_accessed_at: Instant,
    /// Expiration instant, None = size eviction only
    pub expires_at: Option<Instant>,
    /// Recency tick held by the LRU tracker
    pub(crate) tick: u64,
    /// Tick assigned at insertion, orders iteration
    pub(crate) inserted_tick: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new entry written at `now` with an optional TTL.
    pub fn new(value: V, now: Instant, ttl: Option<Duration>, tick: u64) -> Self {
        Self {
            value,
            inserted_at: now,
            last_accessed_at: now,
            expires_at: ttl.map(|ttl| now + ttl),
            tick,
            inserted_tick: tick,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`, so it stops being visible
    /// the instant its TTL has fully elapsed.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Checks if the entry has expired right now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// Expired entries report `Some(Duration::ZERO)`.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}
