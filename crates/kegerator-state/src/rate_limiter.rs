// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Rate Limiting for Sensor Polling
//!
//! Paces a sampling loop to one tick per poll interval on the monotonic
//! clock.

use std::time::{Duration, Instant};

/// Tick pacing for a periodic sampling loop
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_poll: Instant,
}

impl RateLimiter {
    /// Limiter whose first tick comes one full interval from now, like a ticker
    pub fn starting_now(interval: Duration) -> Self {
        Self {
            interval,
            last_poll: Instant::now(),
        }
    }

    /// Returns true (and records the tick) if a full interval has elapsed
    pub fn should_poll_now(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_poll) < self.interval {
            return false;
        }
        self.last_poll = now;
        true
    }

    /// Time left until the next tick, or None if one is due
    pub fn time_until_next_poll(&self) -> Option<Duration> {
        self.interval.checked_sub(self.last_poll.elapsed()).filter(|left| !left.is_zero())
    }
}
