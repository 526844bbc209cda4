//! Rate Limiter Module
//!
//! Fixed-window rate limiting with layered tiers. Counters live in a
//! bounded cache and roll over lazily; there is no background timer.

mod counter;
mod fixed_window;
mod tier;

pub use counter::RateWindowCounter;
pub use fixed_window::{FixedWindowLimiter, RateLimitResult};
pub use tier::{LimitTier, LimiterConfig, TierScope, DEFAULT_MAX_COUNTERS};
