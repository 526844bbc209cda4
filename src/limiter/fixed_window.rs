//! Fixed Window Limiter Module
//!
//! Layered fixed-window rate limiting over a bounded counter store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::{BoundedCache, CacheOptions, CacheStats};
use crate::error::{CacheError, Result};
use crate::limiter::{LimitTier, LimiterConfig, RateWindowCounter};

// == Rate Limit Result ==
/// Outcome of checking one tier (or the tier that decided a layered check).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Tier that produced this result
    pub tier: String,
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Wall-clock time the current window closes
    pub reset_at: DateTime<Utc>,
    /// Milliseconds until the current window closes
    pub reset_after_ms: u64,
    /// Whole seconds a denied caller should wait, rounded up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl RateLimitResult {
    fn from_window(tier: &LimitTier, count: u32, resets_in: Duration) -> Self {
        let allowed = count < tier.requests_allowed;
        let reset_at = Utc::now()
            + chrono::Duration::from_std(resets_in).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            tier: tier.name.clone(),
            allowed,
            limit: tier.requests_allowed,
            remaining: tier.requests_allowed.saturating_sub(count),
            reset_at,
            reset_after_ms: resets_in.as_millis() as u64,
            retry_after_secs: (!allowed).then(|| ceil_secs(resets_in)),
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    (duration.as_millis() as u64).div_ceil(1000)
}

fn counter_key(tier: &str, key: &str) -> String {
    format!("{tier}:{key}")
}

// == Fixed Window Limiter ==
/// Keyed fixed-window limiter with one counter per (tier, key).
///
/// Windows roll over lazily whenever a counter is read or written.
///
/// `check_all_limits` and `record` are separate calls. Two callers that both
/// check before either records can both be admitted, so a subject can exceed
/// a budget by the number of such overlapping callers. That is acceptable for
/// abuse mitigation. [`try_acquire`](Self::try_acquire) checks and records in
/// one `&mut` borrow for callers that need the exact budget.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    tiers: Vec<LimitTier>,
    counters: BoundedCache<String, RateWindowCounter>,
}

impl FixedWindowLimiter {
    // == Constructor ==
    pub fn new(config: LimiterConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            counters: BoundedCache::new(CacheOptions::new(config.max_counters))?,
            tiers: config.tiers,
        })
    }

    pub fn tiers(&self) -> &[LimitTier] {
        &self.tiers
    }

    // == Check Limit ==
    /// Budget left for `key` in one tier, without consuming any.
    ///
    /// `key` is the tier's already-scoped key. Unknown tier names are a
    /// configuration bug and fail with [`CacheError::UnknownTier`].
    pub fn check_limit(&mut self, tier_name: &str, key: &str) -> Result<RateLimitResult> {
        let tier = self
            .tiers
            .iter()
            .find(|tier| tier.name == tier_name)
            .ok_or_else(|| CacheError::UnknownTier(tier_name.to_string()))?;

        Ok(evaluate(&mut self.counters, tier, key, Instant::now()))
    }

    // == Check All Limits ==
    /// Evaluates every tier in declared order.
    ///
    /// The first denying tier is returned as-is. If every tier allows, the
    /// result with the least `remaining` is reported, the earliest tier
    /// winning ties.
    pub fn check_all_limits(&mut self, subject: &str, resource: &str) -> RateLimitResult {
        let now = Instant::now();
        let mut tightest: Option<RateLimitResult> = None;

        for tier in &self.tiers {
            let key = tier.scope.key(subject, resource);
            let result = evaluate(&mut self.counters, tier, &key, now);

            if !result.allowed {
                debug!(
                    tier = %tier.name,
                    subject,
                    retry_after_secs = ?result.retry_after_secs,
                    "Rate limit exceeded"
                );
                return result;
            }

            if tightest
                .as_ref()
                .map_or(true, |best| result.remaining < best.remaining)
            {
                tightest = Some(result);
            }
        }

        tightest.unwrap_or_else(|| unreachable!("limiter is validated to have at least one tier"))
    }

    // == Record ==
    /// Counts one action against every tier for this subject and resource.
    ///
    /// Does not check budgets; see the type-level note on the check/record race.
    pub fn record(&mut self, subject: &str, resource: &str) {
        let now = Instant::now();

        for tier in &self.tiers {
            let key = counter_key(&tier.name, &tier.scope.key(subject, resource));
            match self.counters.get_mut(&key) {
                Some(counter) => {
                    counter.roll(now, tier.window);
                    counter.count = counter.count.saturating_add(1);
                }
                None => {
                    let mut counter = RateWindowCounter::fresh(now, tier.window);
                    counter.count = 1;
                    self.counters.set(key, counter);
                }
            }
        }
    }

    // == Try Acquire ==
    /// Checks every tier and records the action only if all of them allow it.
    ///
    /// On success `remaining` already accounts for this action.
    pub fn try_acquire(&mut self, subject: &str, resource: &str) -> RateLimitResult {
        let mut result = self.check_all_limits(subject, resource);
        if result.allowed {
            self.record(subject, resource);
            result.remaining = result.remaining.saturating_sub(1);
        }
        result
    }

    // == Reset ==
    /// Forgets every tier's counter for this subject and resource.
    ///
    /// Returns how many counters existed.
    pub fn reset(&mut self, subject: &str, resource: &str) -> usize {
        let mut removed = 0;
        for tier in &self.tiers {
            let key = counter_key(&tier.name, &tier.scope.key(subject, resource));
            if self.counters.delete(&key) {
                removed += 1;
            }
        }
        removed
    }

    // == Purge Elapsed ==
    /// Drops counters whose window has closed; they would read as fresh anyway.
    pub fn purge_elapsed(&mut self) -> usize {
        let now = Instant::now();
        let removed = self.counters.retain(|_, counter| !counter.is_elapsed(now));
        if removed > 0 {
            debug!(removed, "Purged elapsed rate-limit windows");
        }
        removed
    }

    /// Capacity of the counter store.
    pub fn max_counters(&self) -> usize {
        self.counters.max()
    }

    /// Number of live counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.stats()
    }
}

/// Reads one tier's counter at `now`, rolling it over if its window closed.
///
/// A missing counter is reported as fresh without being stored.
fn evaluate(
    counters: &mut BoundedCache<String, RateWindowCounter>,
    tier: &LimitTier,
    key: &str,
    now: Instant,
) -> RateLimitResult {
    let storage_key = counter_key(&tier.name, key);
    let (count, resets_in) = match counters.get_mut(&storage_key) {
        Some(counter) => {
            counter.roll(now, tier.window);
            (counter.count, counter.resets_in(now))
        }
        None => (0, tier.window),
    };

    RateLimitResult::from_window(tier, count, resets_in)
}
