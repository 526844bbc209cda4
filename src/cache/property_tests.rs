//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache invariants over arbitrary operation sequences.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

use crate::cache::{BoundedCache, CacheOptions, CompressedCache, CompressionSettings};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_:]{1,32}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

/// Arbitrary JSON documents without floats
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-zA-Z0-9 ]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Keys without duplicates, at least `min` of them
fn unique_keys(min: usize, max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(key_strategy(), min..max)
        .prop_map(|keys| keys.into_iter().collect())
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Has { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Small key space so operations actually collide
    let key = "[a-e]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Has { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Capacity: len() never exceeds max() after any set
    #[test]
    fn prop_capacity_enforcement(
        max in 1usize..20,
        entries in prop::collection::vec((key_strategy(), value_strategy()), 1..200)
    ) {
        let mut store = BoundedCache::new(CacheOptions::new(max)).unwrap();

        for (key, value) in entries {
            store.set(key, value);
            prop_assert!(
                store.len() <= store.max(),
                "Cache size {} exceeds max {}",
                store.len(),
                store.max()
            );
        }
    }

    // Statistics: hits and misses match what get() returned
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut store = BoundedCache::new(CacheOptions::new(3)).unwrap();
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(key, value),
                CacheOp::Get { key } => match store.get(&key) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Has { key } => {
                    store.has(&key);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits, "Hits mismatch");
        prop_assert_eq!(stats.misses, expected_misses, "Misses mismatch");
        prop_assert_eq!(stats.total_entries, store.len(), "Total entries mismatch");
    }

    // Overwrite: the last write wins and occupies one slot
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let mut store = BoundedCache::new(CacheOptions::new(TEST_MAX_ENTRIES)).unwrap();

        store.set(key.clone(), value1);
        store.set(key.clone(), value2.clone());

        prop_assert_eq!(store.get(&key), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // Delete: a deleted key is gone and reports it was present exactly once
    #[test]
    fn prop_delete_removes_entry(key in key_strategy(), value in value_strategy()) {
        let mut store = BoundedCache::new(CacheOptions::new(TEST_MAX_ENTRIES)).unwrap();

        store.set(key.clone(), value);

        prop_assert!(store.delete(&key));
        prop_assert!(!store.delete(&key));
        prop_assert!(store.get(&key).is_none());
    }

    // LRU eviction: the first-inserted, never-read key goes first
    #[test]
    fn prop_lru_eviction_order(keys in unique_keys(3, 10), new_key in key_strategy()) {
        prop_assume!(!keys.contains(&new_key));

        let capacity = keys.len();
        let mut store = BoundedCache::new(CacheOptions::new(capacity)).unwrap();
        for key in &keys {
            store.set(key.clone(), format!("value_{}", key));
        }

        store.set(new_key.clone(), "new".to_string());

        prop_assert_eq!(store.len(), capacity);
        prop_assert!(!store.has(&keys[0]), "Oldest key should have been evicted");
        prop_assert!(store.has(&new_key));
        for key in keys.iter().skip(1) {
            prop_assert!(store.has(key), "Key '{}' should still exist", key);
        }
    }

    // LRU access tracking: a read saves the key from being next out
    #[test]
    fn prop_lru_access_tracking(keys in unique_keys(3, 8), new_key in key_strategy()) {
        prop_assume!(!keys.contains(&new_key));

        let mut store = BoundedCache::new(CacheOptions::new(keys.len())).unwrap();
        for key in &keys {
            store.set(key.clone(), format!("value_{}", key));
        }

        prop_assert!(store.get(&keys[0]).is_some());
        store.set(new_key, "new".to_string());

        prop_assert!(store.has(&keys[0]), "Accessed key should not be evicted");
        prop_assert!(!store.has(&keys[1]), "Second key is now least recently used");
    }

    // Compression round trip: any JSON value comes back deep-equal, both modes
    #[test]
    fn prop_roundtrip_json(value in json_strategy(), enabled in any::<bool>(), quality in 0i32..12) {
        let settings = CompressionSettings::new(enabled, quality);
        let mut cache = CompressedCache::new(CacheOptions::new(8), settings).unwrap();

        cache.set("k".to_string(), value.clone()).unwrap();

        prop_assert_eq!(cache.get("k").unwrap(), Some(value));
    }

    // Iteration visits exactly the distinct live keys, in insertion order
    #[test]
    fn prop_for_each_matches_inserts(keys in unique_keys(1, 30)) {
        let mut store = BoundedCache::new(CacheOptions::new(TEST_MAX_ENTRIES)).unwrap();
        for (n, key) in keys.iter().enumerate() {
            store.set(key.clone(), n);
        }

        let mut order = Vec::new();
        store.for_each(|value, _| order.push(*value));

        prop_assert_eq!(order, (0..keys.len()).collect::<Vec<_>>());
    }
}

#[derive(Debug, Clone)]
enum TimedOp {
    Set(u8),
    Get(u8),
    Advance(u64),
}

fn timed_op_strategy() -> impl Strategy<Value = TimedOp> {
    prop_oneof![
        (0u8..8).prop_map(TimedOp::Set),
        (0u8..8).prop_map(TimedOp::Get),
        (1u64..80).prop_map(TimedOp::Advance),
    ]
}

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

// Virtual-time properties: fewer cases, each drives its own paused runtime
proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn prop_ttl_expiration_behavior(
        keys in prop::collection::hash_set(key_strategy(), 1..10),
        ttl_ms in 1u64..5_000
    ) {
        paused_runtime().block_on(async {
            let ttl = Duration::from_millis(ttl_ms);
            let mut store = BoundedCache::new(CacheOptions::new(TEST_MAX_ENTRIES).with_ttl(ttl)).unwrap();
            for key in &keys {
                store.set(key.clone(), 1u8);
            }

            tokio::time::advance(ttl - Duration::from_millis(1)).await;
            let visible: HashSet<String> = keys.iter().filter(|k| store.has(*k)).cloned().collect();
            assert_eq!(&visible, &keys);

            tokio::time::advance(Duration::from_millis(1)).await;
            for key in &keys {
                assert!(store.get(key).is_none());
                assert!(!store.has(key));
            }
        });
    }

    // Capacity pressure on a TTL cache never evicts a live entry while an
    // expired one still holds a slot
    #[test]
    fn prop_ttl_capacity_keeps_live_entries(
        ops in prop::collection::vec(timed_op_strategy(), 1..60),
        max in 1usize..5
    ) {
        paused_runtime().block_on(async {
            let ttl = Duration::from_millis(100);
            let mut store = BoundedCache::new(CacheOptions::new(max).with_ttl(ttl)).unwrap();

            for op in &ops {
                match *op {
                    TimedOp::Set(key) => {
                        let live_before: Vec<u8> = (0u8..8).filter(|k| store.has(k)).collect();
                        let expired_stored = (0u8..8)
                            .any(|k| !store.has(&k) && store.peek_stale(&k).is_some());

                        store.set(key, ());

                        assert!(store.len() <= max);
                        assert!(store.has(&key));
                        if expired_stored {
                            for k in live_before {
                                assert!(store.has(&k), "live key {k} evicted while an expired entry was stored");
                            }
                        }
                    }
                    TimedOp::Get(key) => {
                        store.get(&key);
                    }
                    TimedOp::Advance(ms) => tokio::time::advance(Duration::from_millis(ms)).await,
                }
                assert_eq!(
                    store.live_len(),
                    (0u8..8).filter(|k| store.has(k)).count()
                );
            }
        });
    }
}
