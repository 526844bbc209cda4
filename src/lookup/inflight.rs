//! In-flight fetch bookkeeping for [`CachedLookup`](super::CachedLookup).

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

/// A fetch every concurrent caller for the same key awaits.
pub(crate) type PendingFetch<V, E> = Shared<BoxFuture<'static, Result<V, Arc<E>>>>;

/// Keys with a fetch currently running.
pub(crate) type InflightTable<K, V, E> = Arc<Mutex<HashMap<K, PendingFetch<V, E>>>>;

// == Inflight Guard ==
/// Removes a key's pending marker when dropped.
///
/// Lives inside the shared fetch future, so the marker is gone on success,
/// error and unwind alike, before any waiter sees the outcome.
pub(crate) struct InflightGuard<K, V, E>
where
    K: Hash + Eq,
{
    table: InflightTable<K, V, E>,
    key: K,
}

impl<K, V, E> InflightGuard<K, V, E>
where
    K: Hash + Eq,
{
    pub(crate) fn new(table: InflightTable<K, V, E>, key: K) -> Self {
        Self { table, key }
    }
}

impl<K, V, E> Drop for InflightGuard<K, V, E>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let removed = self.table.lock().remove(&self.key);
        // Released outside the lock
        drop(removed);
    }
}
