//! Cached Lookup Module
//!
//! Wraps an expensive async fetch with a bounded cache, single-flight
//! de-duplication and stale-on-error fallback.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{BoundedCache, CacheOptions, CacheStats};
use crate::error::Result;
use crate::lookup::inflight::{InflightGuard, InflightTable, PendingFetch};

type FetchFn<K, V, E> = dyn Fn(K) -> BoxFuture<'static, std::result::Result<V, E>> + Send + Sync;

// == Lookup Stats ==
/// Counters for the fetch side of a lookup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LookupStats {
    /// Fetches started
    pub fetches: u64,
    /// Fetches that returned an error
    pub fetch_failures: u64,
    /// Failures answered from an expired cached value
    pub stale_fallbacks: u64,
    /// Callers that joined a fetch already in flight
    pub coalesced: u64,
}

// == Cached Lookup ==
/// Cache-fronted async lookup.
///
/// Cloning is cheap and every clone shares the cache, the in-flight table and
/// the fetch function.
pub struct CachedLookup<K, V, E>
where
    K: Hash + Eq,
{
    cache: Arc<Mutex<BoundedCache<K, V>>>,
    inflight: InflightTable<K, V, E>,
    stats: Arc<Mutex<LookupStats>>,
    fetch: Arc<FetchFn<K, V, E>>,
    max_concurrency: Option<usize>,
}

impl<K, V, E> Clone for CachedLookup<K, V, E>
where
    K: Hash + Eq,
{
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            inflight: Arc::clone(&self.inflight),
            stats: Arc::clone(&self.stats),
            fetch: Arc::clone(&self.fetch),
            max_concurrency: self.max_concurrency,
        }
    }
}

impl<K, V, E> CachedLookup<K, V, E>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Display + Send + Sync + 'static,
{
    // == Constructor ==
    /// Builds a lookup around `fetch`, caching results with `options`.
    pub fn new<F, Fut>(options: CacheOptions, fetch: F) -> Result<Self>
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<V, E>> + Send + 'static,
    {
        let fetch: Arc<FetchFn<K, V, E>> = Arc::new(move |key| fetch(key).boxed());

        Ok(Self {
            cache: Arc::new(Mutex::new(BoundedCache::new(options)?)),
            inflight: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(Mutex::new(LookupStats::default())),
            fetch,
            max_concurrency: None,
        })
    }

    /// Caps how many fetches a single `get_many` runs at once.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    // == Get ==
    /// Returns the cached value or fetches it.
    ///
    /// Concurrent callers for the same missing key share one fetch. If the
    /// fetch fails but an expired value is still stored, that value is
    /// returned instead. Only a failure with nothing to fall back on reaches
    /// the caller, and every waiter receives the same error.
    ///
    /// The fetch runs as its own tokio task, so it completes and caches its
    /// result even if every caller waiting on it is dropped.
    pub async fn get(&self, key: K) -> std::result::Result<V, Arc<E>> {
        if let Some(value) = self.cache.lock().get(&key) {
            return Ok(value);
        }

        let pending = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(pending) => {
                    self.stats.lock().coalesced += 1;
                    pending.clone()
                }
                None => {
                    // A fetch may have landed between the miss above and this lock
                    if let Some(value) = self.cache.lock().get(&key) {
                        return Ok(value);
                    }
                    let pending = self.start_fetch(key.clone());
                    inflight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    // == Get Many ==
    /// Looks up a batch of keys, fetching the uncached ones concurrently.
    ///
    /// Keys whose fetch failed with no fallback are left out of the result;
    /// a partial failure never fails the batch.
    pub async fn get_many<I>(&self, keys: I) -> HashMap<K, V>
    where
        I: IntoIterator<Item = K>,
    {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        {
            let mut cache = self.cache.lock();
            let mut seen = HashSet::new();
            for key in keys {
                if !seen.insert(key.clone()) {
                    continue;
                }
                match cache.get(&key) {
                    Some(value) => {
                        found.insert(key, value);
                    }
                    None => missing.push(key),
                }
            }
        }

        if missing.is_empty() {
            return found;
        }

        let limit = self.max_concurrency.unwrap_or(missing.len());
        let fetched: Vec<(K, std::result::Result<V, Arc<E>>)> = stream::iter(missing)
            .map(|key| async move {
                let result = self.get(key.clone()).await;
                (key, result)
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        for (key, result) in fetched {
            match result {
                Ok(value) => {
                    found.insert(key, value);
                }
                Err(err) => debug!(?key, error = %err, "Omitting key from batch lookup"),
            }
        }

        found
    }

    // == Invalidate ==
    /// Drops the cached value for `key`; returns whether one was stored.
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.lock().delete(key)
    }

    /// Drops every cached value.
    pub fn invalidate_all(&self) {
        self.cache.lock().clear();
    }

    pub fn stats(&self) -> LookupStats {
        self.stats.lock().clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Capacity of the backing cache.
    pub fn max(&self) -> usize {
        self.cache.lock().max()
    }

    /// Number of stored values, including expired fallbacks.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    /// Number of values still fresh enough to skip a fetch.
    pub fn live_len(&self) -> usize {
        self.cache.lock().live_len()
    }

    /// Spawns one fetch of `key` and returns the future its waiters share.
    fn start_fetch(&self, key: K) -> PendingFetch<V, E> {
        let fetch = Arc::clone(&self.fetch);
        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let guard = InflightGuard::new(Arc::clone(&self.inflight), key.clone());

        let task = tokio::spawn(async move {
            stats.lock().fetches += 1;
            let outcome = fetch(key.clone()).await;

            let result = match outcome {
                Ok(value) => {
                    cache.lock().set(key, value.clone());
                    Ok(value)
                }
                Err(err) => {
                    let stale = cache.lock().peek_stale(&key).cloned();
                    let mut counters = stats.lock();
                    counters.fetch_failures += 1;
                    match stale {
                        Some(value) => {
                            counters.stale_fallbacks += 1;
                            warn!(?key, error = %err, "Lookup failed, serving stale value");
                            Ok(value)
                        }
                        None => {
                            warn!(?key, error = %err, "Lookup failed with no cached fallback");
                            Err(Arc::new(err))
                        }
                    }
                }
            };

            drop(guard);
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(err) => match err.try_into_panic() {
                    Ok(payload) => std::panic::resume_unwind(payload),
                    // Only runtime shutdown cancels the task, and it drops every waiter too
                    Err(_) => futures::future::pending().await,
                },
            }
        }
        .boxed()
        .shared()
    }
}
