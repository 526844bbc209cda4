//! Lookup Module
//!
//! Cache-fronted async lookups with in-flight de-duplication and stale
//! fallback, for identity, profile and similar fetch-by-id paths.

mod cached;
mod inflight;

pub use cached::{CachedLookup, LookupStats};
