//! Howl Cache - in-process caching and rate limiting for a social backend
//!
//! Provides a bounded TTL/LRU cache with optional compression, a layered
//! fixed-window rate limiter, and a cache-fronted async lookup with
//! single-flight fetches and stale fallback. An axum sidecar exposes them
//! over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod limiter;
pub mod lookup;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{BoundedCache, CacheOptions, CompressedCache, TtlPolicy};
pub use config::Config;
pub use error::{CacheError, Result};
pub use limiter::{FixedWindowLimiter, LimitTier, LimiterConfig, RateLimitResult};
pub use lookup::CachedLookup;
pub use tasks::spawn_cleanup_task;
