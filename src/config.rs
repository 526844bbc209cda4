//! Configuration Module
//!
//! Handles loading and managing sidecar configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{CacheOptions, CompressionSettings};
use crate::limiter::{LimitTier, LimiterConfig};

/// Tier names used by the DM send limiter.
pub const DM_GLOBAL_TIER: &str = "dm_global";
pub const DM_CHANNEL_TIER: &str = "dm_channel";

/// Sidecar configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries in the response cache
    pub max_entries: usize,
    /// Response cache TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Store response-cache values uncompressed
    pub disable_compression: bool,
    /// Compression level handed to zstd
    pub compression_quality: i32,
    /// DMs a user may send per window across all channels
    pub dm_global_limit: u32,
    /// DMs a user may send per window into one channel
    pub dm_channel_limit: u32,
    /// DM rate window in seconds
    pub dm_window_secs: u64,
    /// Capacity of the rate-limit counter store
    pub max_rate_counters: usize,
    /// Capacity of the profile lookup cache
    pub profile_cache_max: usize,
    /// Profile lookup TTL in seconds
    pub profile_cache_ttl: u64,
    /// Base URL profiles are fetched from
    pub profile_upstream_url: String,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Response cache capacity (default: 1000)
    /// - `DEFAULT_TTL` - Response cache TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `DISABLE_COMPRESSION` - `1`/`true`/`yes`/`on` stores values raw (default: off)
    /// - `COMPRESSION_QUALITY` - zstd level, 0-11 typical (default: 3)
    /// - `DM_GLOBAL_LIMIT` / `DM_CHANNEL_LIMIT` - DM budgets (default: 30 / 10)
    /// - `DM_WINDOW_SECS` - DM window length (default: 60)
    /// - `MAX_RATE_COUNTERS` - Counter store capacity (default: 10000)
    /// - `PROFILE_CACHE_MAX` / `PROFILE_CACHE_TTL` - Profile cache (default: 500 / 300)
    /// - `PROFILE_UPSTREAM_URL` - Profile source (default: http://127.0.0.1:4000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: parse_var("MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var("DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            disable_compression: env::var("DISABLE_COMPRESSION")
                .map(|v| is_truthy(&v))
                .unwrap_or(defaults.disable_compression),
            compression_quality: parse_var("COMPRESSION_QUALITY")
                .unwrap_or(defaults.compression_quality),
            dm_global_limit: parse_var("DM_GLOBAL_LIMIT").unwrap_or(defaults.dm_global_limit),
            dm_channel_limit: parse_var("DM_CHANNEL_LIMIT").unwrap_or(defaults.dm_channel_limit),
            dm_window_secs: parse_var("DM_WINDOW_SECS").unwrap_or(defaults.dm_window_secs),
            max_rate_counters: parse_var("MAX_RATE_COUNTERS")
                .unwrap_or(defaults.max_rate_counters),
            profile_cache_max: parse_var("PROFILE_CACHE_MAX")
                .unwrap_or(defaults.profile_cache_max),
            profile_cache_ttl: parse_var("PROFILE_CACHE_TTL")
                .unwrap_or(defaults.profile_cache_ttl),
            profile_upstream_url: env::var("PROFILE_UPSTREAM_URL")
                .unwrap_or(defaults.profile_upstream_url),
        }
    }

    /// Options for the compressed response cache.
    pub fn response_cache_options(&self) -> CacheOptions {
        CacheOptions::new(self.max_entries).with_ttl(Duration::from_secs(self.default_ttl))
    }

    pub fn compression(&self) -> CompressionSettings {
        CompressionSettings::new(!self.disable_compression, self.compression_quality)
    }

    /// Two layered DM tiers: per user, then per user and channel.
    pub fn dm_limiter_config(&self) -> LimiterConfig {
        let window = Duration::from_secs(self.dm_window_secs);
        LimiterConfig::new(vec![
            LimitTier::per_subject(DM_GLOBAL_TIER, self.dm_global_limit, window),
            LimitTier::per_resource(DM_CHANNEL_TIER, self.dm_channel_limit, window),
        ])
        .with_max_counters(self.max_rate_counters)
    }

    pub fn profile_cache_options(&self) -> CacheOptions {
        CacheOptions::new(self.profile_cache_max)
            .with_ttl(Duration::from_secs(self.profile_cache_ttl))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: 300,
            server_port: 3000,
            cleanup_interval: 1,
            disable_compression: false,
            compression_quality: 3,
            dm_global_limit: 30,
            dm_channel_limit: 10,
            dm_window_secs: 60,
            max_rate_counters: 10_000,
            profile_cache_max: 500,
            profile_cache_ttl: 300,
            profile_upstream_url: "http://127.0.0.1:4000".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
