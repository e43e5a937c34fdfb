// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backoff for re-delivered reconciliation events.
//!
//! The reconciliation loop never sleeps or retries inline. When a pass ends
//! on a retryable failure the runtime asks [`RetryBackoff`] for a delay and
//! schedules a synthetic `update-status` event after it. A successful pass
//! resets the schedule. There is no overall deadline: periodic refresh events
//! keep arriving regardless.

use rand::Rng;
use std::time::Duration;

/// First re-delivery delay (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Cap on the re-delivery delay (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Jitter applied to every delay (±10%)
const JITTER: f64 = 0.1;

/// Doubling delay schedule with jitter.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
    current: Duration,
    /// Number of delays handed out since the last reset
    pub attempts: u32,
}

impl Default for RetryBackoff {
    /// 100ms, 200ms, 400ms, ... capped at 30 seconds, each ±10%.
    fn default() -> Self {
        Self::new(
            Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            Duration::from_secs(MAX_INTERVAL_SECS),
            JITTER,
        )
    }
}

impl RetryBackoff {
    #[must_use]
    pub fn new(initial: Duration, max: Duration, jitter: f64) -> Self {
        Self {
            initial,
            max,
            jitter,
            current: initial,
            attempts: 0,
        }
    }

    /// Delay before the next re-delivery; doubles the following one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.jittered(self.current);
        self.current = self.current.saturating_mul(2).min(self.max);
        self.attempts += 1;
        delay
    }

    /// Un-jittered delay the next call will be based on.
    #[must_use]
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Return to the initial delay after a successful pass.
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }

    fn jittered(&self, interval: Duration) -> Duration {
        if self.jitter == 0.0 {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = secs * self.jitter;
        let jittered = rand::rng().random_range(secs - delta..=secs + delta);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
