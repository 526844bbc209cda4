//! LRU Tracker Module
//!
//! Implements Least Recently Used ordering for cache eviction.

use std::collections::BTreeMap;

// == LRU Tracker ==
/// Tracks access order for LRU eviction strategy.
///
/// Every insert or touch hands out a fresh, strictly increasing tick. Keys are
/// kept in a BTreeMap ordered by tick, so:
/// - First entry = Least recently used
/// - Last entry = Most recently used
///
/// Ticks are never reused, so two keys can never tie; among keys that were
/// never touched the oldest insertion is evicted first.
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys by recency tick
    order: BTreeMap<u64, K>,
    /// Next tick to hand out
    next_tick: u64,
}

impl<K> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_tick: 0,
        }
    }

    // == Insert ==
    /// Starts tracking a key as the most recently used one.
    ///
    /// Returns the tick the caller must keep to touch or remove the key later.
    pub fn insert(&mut self, key: K) -> u64 {
        let tick = self.bump();
        self.order.insert(tick, key);
        tick
    }

    // == Touch ==
    /// Marks the key held at `tick` as most recently used.
    ///
    /// Returns the key's new tick, or None if `tick` is not tracked.
    pub fn touch(&mut self, tick: u64) -> Option<u64> {
        let key = self.order.remove(&tick)?;
        Some(self.insert(key))
    }

    // == Remove ==
    /// Stops tracking the key held at `tick`.
    pub fn remove(&mut self, tick: u64) -> Option<K> {
        self.order.remove(&tick)
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if tracker is empty.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_first().map(|(_, key)| key)
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.first_key_value().map(|(_, key)| key)
    }

    /// Removes every tracked key.
    pub fn clear(&mut self) {
        self.order.clear();
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }
}
