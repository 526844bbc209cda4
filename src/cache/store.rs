//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking and TTL expiration.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, LruTracker};
use crate::error::{CacheError, Result};

// == TTL Policy ==
/// How an entry's expiry moves after it was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlPolicy {
    /// Expiry counted from the last write only
    #[default]
    Fixed,
    /// Every hit pushes expiry out to `now + ttl`
    Sliding,
}

// == Cache Options ==
/// Construction parameters for a [`BoundedCache`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Maximum number of entries held at once
    pub max: usize,
    /// Lifetime of each entry, None = size eviction only
    pub ttl: Option<Duration>,
    pub ttl_policy: TtlPolicy,
}

impl CacheOptions {
    /// Capacity-only options: no TTL, fixed policy.
    pub fn new(max: usize) -> Self {
        Self {
            max,
            ttl: None,
            ttl_policy: TtlPolicy::Fixed,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Switches to sliding expiration.
    pub fn sliding(mut self) -> Self {
        self.ttl_policy = TtlPolicy::Sliding;
        self
    }
}

// == Bounded Cache ==
/// Size-bounded key/value store with optional TTL and LRU eviction.
///
/// Expired entries stop being visible to `get`/`has` but stay physically
/// stored until they are overwritten, evicted, deleted or purged, which is
/// what lets [`peek_stale`](Self::peek_stale) serve them as a fallback.
/// A new key arriving at capacity reclaims an expired entry before it evicts
/// a live one.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    /// Key-value storage
    entries: HashMap<K, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker<K>,
    /// Keys with a TTL by (expires_at, inserted_tick), soonest first
    expiry: BTreeMap<(Instant, u64), K>,
    /// Performance statistics
    stats: CacheStats,
    options: CacheOptions,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates a new cache, rejecting a zero capacity.
    pub fn new(options: CacheOptions) -> Result<Self> {
        if options.max == 0 {
            return Err(CacheError::InvalidConfig(
                "cache capacity must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::with_capacity(options.max.min(1024)),
            lru: LruTracker::new(),
            expiry: BTreeMap::new(),
            stats: CacheStats::new(),
            options,
        })
    }

    // == Set ==
    /// Stores a value, replacing any previous entry for the key.
    ///
    /// An overwrite resets the entry's TTL and recency. Inserting a new key at
    /// capacity first reclaims an expired entry if one is stored, otherwise
    /// it evicts the least recently used entry.
    pub fn set(&mut self, key: K, value: V) {
        let now = Instant::now();

        if let Some(previous) = self.entries.remove(&key) {
            untrack(&mut self.lru, &mut self.expiry, &previous);
        } else if self.entries.len() >= self.options.max {
            self.make_room(now);
        }

        let tick = self.lru.insert(key.clone());
        let entry = CacheEntry::new(value, now, self.options.ttl, tick);
        if let Some(expires_at) = entry.expires_at {
            self.expiry
                .insert((expires_at, entry.inserted_tick), key.clone());
        }
        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get Mut ==
    /// Mutable access to a live entry's value, refreshing its recency.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        match self.entries.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                refresh(&mut self.lru, &mut self.expiry, &self.options, entry, now);
                self.stats.record_hit();
                Some(&mut entry.value)
            }
            _ => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Has ==
    /// Whether a live entry exists, without touching recency.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    // == Peek Stale ==
    /// Returns whatever is physically stored for the key, expired or not.
    ///
    /// Does not count as an access.
    pub fn peek_stale<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Entry metadata for a stored key, expired or not.
    pub fn entry<Q>(&self, key: &Q) -> Option<&CacheEntry<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry; returns whether it was stored.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.entries.remove(key) {
            Some(entry) => {
                untrack(&mut self.lru, &mut self.expiry, &entry);
                self.stats.set_total_entries(self.entries.len());
                true
            }
            None => false,
        }
    }

    // == For Each ==
    /// Visits every live entry, oldest insertion first.
    ///
    /// Iteration is not an access: recency and stats are left untouched.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&V, &K),
    {
        let now = Instant::now();
        let mut live: Vec<(&K, &CacheEntry<V>)> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .collect();
        live.sort_by_key(|(_, entry)| entry.inserted_tick);

        for (key, entry) in live {
            visit(&entry.value, key);
        }
    }

    // == Retain ==
    /// Keeps only the entries for which `keep` returns true.
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.retain_entries(|key, entry| keep(key, &entry.value))
    }

    // == Purge Expired ==
    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let removed = self.retain_entries(|_, entry| !entry.is_expired_at(now));
        if removed > 0 {
            self.stats.record_purged(removed);
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    // == Clear ==
    /// Drops all entries immediately.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.lru.clear();
        self.expiry.clear();
        self.stats.set_total_entries(0);
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries still visible to `get`.
    pub fn live_len(&self) -> usize {
        let expired = self
            .expiry
            .range(..=(Instant::now(), u64::MAX))
            .count();
        self.entries.len() - expired
    }

    /// Configured capacity.
    pub fn max(&self) -> usize {
        self.options.max
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Frees one slot for a new key.
    ///
    /// The soonest-expired entry goes first; a live entry is evicted only
    /// when nothing stored has expired.
    fn make_room(&mut self, now: Instant) {
        let expired = self
            .expiry
            .first_key_value()
            .filter(|((expires_at, _), _)| *expires_at <= now)
            .map(|(_, key)| key.clone());

        match expired {
            Some(key) => {
                if let Some(entry) = self.entries.remove(&key) {
                    untrack(&mut self.lru, &mut self.expiry, &entry);
                }
                self.stats.record_purged(1);
                debug!(max = self.options.max, "Reclaimed expired entry at capacity");
            }
            None => self.evict_oldest(),
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.lru.evict_oldest() {
            if let Some(entry) = self.entries.remove(&evicted) {
                untrack(&mut self.lru, &mut self.expiry, &entry);
            }
            self.stats.record_eviction();
            debug!(max = self.options.max, "Evicted least recently used entry");
        }
    }

    fn retain_entries<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&K, &CacheEntry<V>) -> bool,
    {
        let before = self.entries.len();
        let lru = &mut self.lru;
        let expiry = &mut self.expiry;
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                untrack(lru, expiry, entry);
            }
            kept
        });
        self.stats.set_total_entries(self.entries.len());
        before - self.entries.len()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Get ==
    /// Returns a clone of a live value, refreshing its recency.
    ///
    /// Absent if the key was never set, has expired, or was evicted.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get_mut(key).map(|value| value.clone())
    }
}

/// Marks an entry as just used.
fn refresh<K, V>(
    lru: &mut LruTracker<K>,
    expiry: &mut BTreeMap<(Instant, u64), K>,
    options: &CacheOptions,
    entry: &mut CacheEntry<V>,
    now: Instant,
) {
    entry.last_accessed_at = now;
    if let Some(tick) = lru.touch(entry.tick) {
        entry.tick = tick;
    }
    if options.ttl_policy != TtlPolicy::Sliding {
        return;
    }
    if let (Some(previous), Some(ttl)) = (entry.expires_at, options.ttl) {
        let expires_at = now + ttl;
        if let Some(key) = expiry.remove(&(previous, entry.inserted_tick)) {
            expiry.insert((expires_at, entry.inserted_tick), key);
        }
        entry.expires_at = Some(expires_at);
    }
}

/// Drops an entry's recency and expiry bookkeeping.
fn untrack<K, V>(
    lru: &mut LruTracker<K>,
    expiry: &mut BTreeMap<(Instant, u64), K>,
    entry: &CacheEntry<V>,
) {
    lru.remove(entry.tick);
    if let Some(expires_at) = entry.expires_at {
        expiry.remove(&(expires_at, entry.inserted_tick));
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> BoundedCache<String, String> {
        BoundedCache::new(CacheOptions::new(max)).unwrap()
    }

    fn ttl_cache(max: usize, ttl_ms: u64) -> BoundedCache<String, String> {
        BoundedCache::new(CacheOptions::new(max).with_ttl(Duration::from_millis(ttl_ms))).unwrap()
    }

    #[test]
    fn test_store_new() {
        let store = cache(100);
        assert_eq!(store.len(), 0);
        assert_eq!(store.max(), 100);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_rejects_zero_capacity() {
        let result = BoundedCache::<String, u32>::new(CacheOptions::new(0));
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = cache(100);

        store.set("key1".to_string(), "value1".to_string());

        assert_eq!(store.get("key1"), Some("value1".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = cache(100);
        assert_eq!(store.get("nonexistent"), None);
        assert!(!store.has("nonexistent"));
    }

    #[test]
    fn test_store_delete() {
        let mut store = cache(100);

        store.set("key1".to_string(), "value1".to_string());

        assert!(store.delete("key1"));
        assert!(!store.delete("key1"));
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = cache(100);

        store.set("key1".to_string(), "value1".to_string());
        store.set("key1".to_string(), "value2".to_string());

        assert_eq!(store.get("key1"), Some("value2".to_string()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_overwrite_at_capacity_does_not_evict() {
        let mut store = cache(2);

        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());
        store.set("a".to_string(), "3".to_string());

        assert_eq!(store.len(), 2);
        assert_eq!(store.stats().evictions, 0);
        assert!(store.has("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = ttl_cache(100, 100);

        store.set("a".to_string(), "1".to_string());
        assert!(store.has("a"));

        tokio::time::advance(Duration::from_millis(101)).await;

        assert_eq!(store.get("a"), None);
        assert!(!store.has("a"));
        // Still physically present for fallback use
        assert_eq!(store.peek_stale("a"), Some(&"1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_fixed_ttl_not_refreshed_by_reads() {
        let mut store = ttl_cache(100, 100);
        store.set("a".to_string(), "1".to_string());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(store.get("a").is_some());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sliding_ttl_refreshed_by_reads() {
        let options = CacheOptions::new(100)
            .with_ttl(Duration::from_millis(100))
            .sliding();
        let mut store: BoundedCache<String, u32> = BoundedCache::new(options).unwrap();
        store.set("a".to_string(), 1);

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(store.get("a"), Some(1));

        tokio::time::advance(Duration::from_millis(60)).await;
        assert_eq!(store.get("a"), Some(1));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(store.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_overwrite_resets_ttl() {
        let mut store = ttl_cache(100, 100);
        store.set("a".to_string(), "1".to_string());

        tokio::time::advance(Duration::from_millis(80)).await;
        store.set("a".to_string(), "2".to_string());

        tokio::time::advance(Duration::from_millis(80)).await;
        assert_eq!(store.get("a"), Some("2".to_string()));
    }

    #[test]
    fn test_store_lru_eviction() {
        let mut store = cache(3);

        store.set("key1".to_string(), "value1".to_string());
        store.set("key2".to_string(), "value2".to_string());
        store.set("key3".to_string(), "value3".to_string());

        // Cache is full, adding key4 should evict key1 (oldest)
        store.set("key4".to_string(), "value4".to_string());

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("key1"), None);
        assert!(store.has("key2"));
        assert!(store.has("key3"));
        assert!(store.has("key4"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_store_lru_touch_on_get() {
        let mut store = cache(2);

        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());
        store.get("a");
        store.set("c".to_string(), "3".to_string());

        assert_eq!(store.get("a"), Some("1".to_string()));
        assert_eq!(store.get("c"), Some("3".to_string()));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_store_has_does_not_refresh_recency() {
        let mut store = cache(2);

        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());
        assert!(store.has("a"));
        store.set("c".to_string(), "3".to_string());

        assert!(!store.has("a"));
        assert!(store.has("b"));
    }

    #[test]
    fn test_store_for_each_insertion_order_without_touch() {
        let mut store = cache(3);

        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());
        store.set("c".to_string(), "3".to_string());
        store.get("a");

        let mut seen = Vec::new();
        store.for_each(|value, key| seen.push(format!("{key}={value}")));
        assert_eq!(seen, vec!["a=1", "b=2", "c=3"]);

        // Iterating must not have promoted anything: b is still next out
        store.set("d".to_string(), "4".to_string());
        assert!(!store.has("b"));
        assert!(store.has("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_for_each_skips_expired() {
        let mut store = ttl_cache(10, 100);
        store.set("old".to_string(), "1".to_string());
        tokio::time::advance(Duration::from_millis(150)).await;
        store.set("new".to_string(), "2".to_string());

        let mut keys = Vec::new();
        store.for_each(|_, key| keys.push(key.clone()));
        assert_eq!(keys, vec!["new".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_purge_expired() {
        let mut store: BoundedCache<String, String> = BoundedCache::new(CacheOptions::new(10).with_ttl(Duration::from_secs(1))).unwrap();

        store.set("key1".to_string(), "value1".to_string());
        tokio::time::advance(Duration::from_millis(500)).await;
        store.set("key2".to_string(), "value2".to_string());
        tokio::time::advance(Duration::from_millis(600)).await;

        let removed = store.purge_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek_stale("key1"), None);
        assert!(store.has("key2"));
        assert_eq!(store.stats().purged, 1);
    }

    #[test]
    fn test_store_retain() {
        let mut store: BoundedCache<String, u32> = BoundedCache::new(CacheOptions::new(10)).unwrap();
        for n in 0..6 {
            store.set(format!("k{n}"), n);
        }

        let removed = store.retain(|_, value| value % 2 == 0);

        assert_eq!(removed, 3);
        assert_eq!(store.len(), 3);
        assert!(store.has("k4"));
        assert!(!store.has("k5"));

        // Removed keys no longer hold LRU slots
        for n in 10..17 {
            store.set(format!("k{n}"), n);
        }
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_store_clear() {
        let mut store = cache(3);
        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());

        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.stats().total_entries, 0);
        store.set("c".to_string(), "3".to_string());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_mut_updates_in_place() {
        let mut store: BoundedCache<&str, u32> = BoundedCache::new(CacheOptions::new(4)).unwrap();
        store.set("n", 1);

        if let Some(value) = store.get_mut("n") {
            *value += 41;
        }

        assert_eq!(store.get("n"), Some(42));
    }

    #[test]
    fn test_store_stats() {
        let mut store = cache(100);

        store.set("key1".to_string(), "value1".to_string());
        store.get("key1"); // hit
        store.get("nonexistent"); // miss

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_reclaims_expired_before_evicting_live() {
        let mut store = ttl_cache(2, 100);

        store.set("a".to_string(), "1".to_string());
        tokio::time::advance(Duration::from_millis(50)).await;
        store.set("b".to_string(), "2".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;
        // "a" is now the most recently used entry
        assert!(store.get("a").is_some());

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!store.has("a"));
        assert!(store.has("b"));

        store.set("c".to_string(), "3".to_string());

        assert!(store.has("b"), "live entry must survive while an expired one is stored");
        assert!(store.has("c"));
        assert_eq!(store.peek_stale("a"), None);
        assert_eq!(store.len(), 2);

        let stats = store.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.purged, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_evicts_lru_when_nothing_expired() {
        let mut store = ttl_cache(2, 1_000);

        store.set("a".to_string(), "1".to_string());
        store.set("b".to_string(), "2".to_string());
        tokio::time::advance(Duration::from_millis(10)).await;
        store.set("c".to_string(), "3".to_string());

        assert!(!store.has("a"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_sliding_entry_not_reclaimed_after_refresh() {
        let mut store = BoundedCache::new(
            CacheOptions::new(2)
                .with_ttl(Duration::from_millis(100))
                .sliding(),
        )
        .unwrap();

        store.set("a".to_string(), 1);
        store.set("b".to_string(), 2);
        tokio::time::advance(Duration::from_millis(80)).await;
        assert_eq!(store.get("a"), Some(1));

        // "b" expired at 100ms, "a" was pushed out to 180ms
        tokio::time::advance(Duration::from_millis(40)).await;
        store.set("c".to_string(), 3);

        assert!(store.has("a"));
        assert!(store.has("c"));
        assert_eq!(store.peek_stale("b"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_live_len_excludes_expired() {
        let mut store = ttl_cache(10, 100);

        store.set("a".to_string(), "1".to_string());
        tokio::time::advance(Duration::from_millis(60)).await;
        store.set("b".to_string(), "2".to_string());
        assert_eq!(store.live_len(), 2);

        tokio::time::advance(Duration::from_millis(40)).await;
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_len(), 1);

        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert_eq!(store.live_len(), 1);
    }
}
