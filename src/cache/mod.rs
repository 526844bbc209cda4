//! Cache Module
//!
//! Provides bounded in-memory caching with TTL expiration, LRU eviction and
//! optional value compression.

mod codec;
mod compressed;
mod entry;
mod lru;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use codec::{CompressionSettings, Payload};
pub use compressed::CompressedCache;
pub use entry::CacheEntry;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{BoundedCache, CacheOptions, TtlPolicy};
