//! Rate Window Counter Module
//!
//! Per-key action count inside one fixed window.

use std::time::Duration;

use tokio::time::Instant;

// == Rate Window Counter ==
/// Actions recorded in the current window `[window_started_at, window_ends_at)`.
///
/// Lifecycle: Fresh (count 0) -> Accumulating -> Exhausted, and back to Fresh
/// the first time it is read or written at or after `window_ends_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowCounter {
    pub count: u32,
    pub window_started_at: Instant,
    pub window_ends_at: Instant,
}

impl RateWindowCounter {
    /// A counter with nothing recorded, window opening at `now`.
    pub fn fresh(now: Instant, window: Duration) -> Self {
        Self {
            count: 0,
            window_started_at: now,
            window_ends_at: now + window,
        }
    }

    /// Whether the window has closed at `now`.
    pub fn is_elapsed(&self, now: Instant) -> bool {
        now >= self.window_ends_at
    }

    // == Roll ==
    /// Resets the count and opens a new window if the current one closed.
    ///
    /// Returns true if the window rolled over.
    pub fn roll(&mut self, now: Instant, window: Duration) -> bool {
        if !self.is_elapsed(now) {
            return false;
        }
        *self = Self::fresh(now, window);
        true
    }

    pub fn remaining(&self, limit: u32) -> u32 {
        limit.saturating_sub(self.count)
    }

    /// Time left until the window closes.
    pub fn resets_in(&self, now: Instant) -> Duration {
        self.window_ends_at.saturating_duration_since(now)
    }
}
