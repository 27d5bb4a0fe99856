//! Exponential backoff with multiplicative jitter.
//!
//! The delay before retry `n` (1-based) is `base * 2^(n-1) * j` with `j`
//! drawn uniformly from `[0.5, 1.0)`. Plugs into `backon` as a
//! [`BackoffBuilder`].

use std::time::Duration;

use backon::BackoffBuilder;
use rand::Rng;

/// Upper bound on a single computed delay.
const MAX_DELAY: Duration = Duration::from_secs(300);

const JITTER_MIN: f64 = 0.5;
const JITTER_MAX: f64 = 1.0;

/// Retry schedule: how many retries, and the delay before the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max_retries: u32,
}

impl BackoffPolicy {
    #[must_use]
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }
}

impl BackoffBuilder for BackoffPolicy {
    type Backoff = JitteredBackoff;

    fn build(self) -> Self::Backoff {
        JitteredBackoff {
            base: self.base,
            max_retries: self.max_retries,
            retry: 0,
        }
    }
}

/// Iterator of retry delays; yields `max_retries` items then ends.
#[derive(Debug)]
pub struct JitteredBackoff {
    base: Duration,
    max_retries: u32,
    retry: u32,
}

impl Iterator for JitteredBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.retry >= self.max_retries {
            return None;
        }
        self.retry += 1;
        let jitter = rand::rng().random_range(JITTER_MIN..JITTER_MAX);
        Some(delay_for(self.base, self.retry, jitter))
    }
}

/// Delay before retry `retry` (1-based) for a given jitter factor.
#[must_use]
pub fn delay_for(base: Duration, retry: u32, jitter: f64) -> Duration {
    let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
    let secs = base.as_secs_f64() * 2f64.powi(exponent) * jitter;
    if secs.is_finite() && secs < MAX_DELAY.as_secs_f64() {
        Duration::from_secs_f64(secs.max(0.0))
    } else {
        MAX_DELAY
    }
}
