//! Limit Tier Module
//!
//! Declares rate budgets and how each one is keyed.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{CacheError, Result};

/// Default capacity of the counter store.
pub const DEFAULT_MAX_COUNTERS: usize = 10_000;

// == Tier Scope ==
/// Which part of a request a tier's counter is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierScope {
    /// One counter per subject (e.g. per user)
    Subject,
    /// One counter per subject and resource (e.g. per user per channel)
    Resource,
}

impl TierScope {
    /// Builds the counter key for this scope.
    pub fn key(&self, subject: &str, resource: &str) -> String {
        match self {
            TierScope::Subject => subject.to_string(),
            TierScope::Resource => format!("{subject}:{resource}"),
        }
    }
}

// == Limit Tier ==
/// A named budget of `requests_allowed` actions per fixed `window`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitTier {
    pub name: String,
    pub requests_allowed: u32,
    pub window: Duration,
    pub scope: TierScope,
}

impl LimitTier {
    pub fn per_subject(name: impl Into<String>, requests_allowed: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            requests_allowed,
            window,
            scope: TierScope::Subject,
        }
    }

    pub fn per_resource(name: impl Into<String>, requests_allowed: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            requests_allowed,
            window,
            scope: TierScope::Resource,
        }
    }
}

// == Limiter Config ==
/// Tiers in evaluation order (broadest first) plus counter capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    pub tiers: Vec<LimitTier>,
    pub max_counters: usize,
}

impl LimiterConfig {
    pub fn new(tiers: Vec<LimitTier>) -> Self {
        Self {
            tiers,
            max_counters: DEFAULT_MAX_COUNTERS,
        }
    }

    pub fn with_max_counters(mut self, max_counters: usize) -> Self {
        self.max_counters = max_counters;
        self
    }

    /// Rejects configurations that would make the limiter meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(CacheError::InvalidConfig(
                "rate limiter needs at least one tier".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for tier in &self.tiers {
            if !names.insert(tier.name.as_str()) {
                return Err(CacheError::InvalidConfig(format!(
                    "duplicate rate-limit tier '{}'",
                    tier.name
                )));
            }
            if tier.requests_allowed == 0 {
                return Err(CacheError::InvalidConfig(format!(
                    "tier '{}' must allow at least one request",
                    tier.name
                )));
            }
            if tier.window.is_zero() {
                return Err(CacheError::InvalidConfig(format!(
                    "tier '{}' has an empty window",
                    tier.name
                )));
            }
        }

        Ok(())
    }
}
