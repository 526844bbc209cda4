//! Compressed Cache Module
//!
//! A [`BoundedCache`] whose values pass through the compression codec.

use std::borrow::Borrow;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{BoundedCache, CacheOptions, CacheStats, CompressionSettings, Payload};
use crate::error::Result;

// == Compressed Cache ==
/// Bounded TTL/LRU cache that stores values compressed when enabled.
///
/// With compression disabled the values are kept raw and the API behaves the
/// same. Codec failures are returned to the caller, never swallowed.
#[derive(Debug)]
pub struct CompressedCache<K, V> {
    inner: BoundedCache<K, Payload<V>>,
    settings: CompressionSettings,
}

impl<K, V> CompressedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Serialize + DeserializeOwned + Clone,
{
    pub fn new(options: CacheOptions, settings: CompressionSettings) -> Result<Self> {
        Ok(Self {
            inner: BoundedCache::new(options)?,
            settings,
        })
    }

    /// Encodes and stores a value.
    pub fn set(&mut self, key: K, value: V) -> Result<()> {
        let payload = self.settings.encode(value)?;
        self.inner.set(key, payload);
        Ok(())
    }

    /// Returns the decoded live value, refreshing recency.
    pub fn get<Q>(&mut self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.inner.get_mut(key) {
            Some(payload) => self.settings.decode(payload).map(Some),
            None => Ok(None),
        }
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.has(key)
    }

    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.delete(key)
    }

    /// Visits every live entry decoded, oldest insertion first.
    ///
    /// Stops at the first value that fails to decode and returns its error.
    pub fn for_each<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&V, &K),
    {
        let settings = self.settings;
        let mut failure = None;
        self.inner.for_each(|payload, key| {
            if failure.is_some() {
                return;
            }
            match settings.decode(payload) {
                Ok(value) => visit(&value, key),
                Err(err) => failure = Some(err),
            }
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn purge_expired(&mut self) -> usize {
        self.inner.purge_expired()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Stored entries, expired ones awaiting a purge included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of entries still visible to `get`.
    pub fn live_len(&self) -> usize {
        self.inner.live_len()
    }

    pub fn max(&self) -> usize {
        self.inner.max()
    }

    /// Whether new values are being compressed.
    pub fn is_compressing(&self) -> bool {
        self.settings.enabled
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
