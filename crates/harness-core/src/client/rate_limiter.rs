//! Token-bucket admission control.

use std::time::Duration;

use tokio::{sync::Mutex, time::Instant};
use tracing::trace;

/// A token bucket shared by every request issued through one client.
///
/// The bucket starts full. Tokens refill continuously and fractional tokens
/// accrue between calls, but each [`acquire`](Self::acquire) debits exactly
/// one whole token.
#[derive(Debug)]
pub struct RateLimiter {
    max_tokens: f64,
    refill_per_ms: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, max_tokens: f64, refill_per_ms: f64, now: Instant) {
        let elapsed_ms = now.duration_since(self.last_refill).as_secs_f64() * 1000.0;
        self.tokens = (self.tokens + elapsed_ms * refill_per_ms).min(max_tokens);
        self.last_refill = now;
    }
}

impl RateLimiter {
    /// Creates a bucket holding `max_tokens` that refills at `refill_per_ms`
    /// tokens per millisecond.
    ///
    /// A capacity of zero is raised to one, and a non-positive refill rate to
    /// one token per second, so that `acquire` always terminates.
    #[must_use]
    pub fn new(max_tokens: u32, refill_per_ms: f64) -> Self {
        let max_tokens = f64::from(max_tokens.max(1));
        let refill_per_ms = if refill_per_ms > 0.0 {
            refill_per_ms
        } else {
            0.001
        };
        Self {
            max_tokens,
            refill_per_ms,
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    /// A bucket allowing bursts of `rate` requests and `rate` per second
    /// sustained.
    #[must_use]
    pub fn per_second(rate: u32) -> Self {
        Self::new(rate, f64::from(rate) / 1000.0)
    }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait_ms = {
                let mut bucket = self.bucket.lock().await;
                bucket.refill(self.max_tokens, self.refill_per_ms, Instant::now());
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                (1.0 - bucket.tokens) / self.refill_per_ms
            };

            trace!(wait_ms, "rate limiter waiting for token");
            tokio::time::sleep(Duration::from_secs_f64(wait_ms / 1000.0)).await;
        }
    }

    /// Tokens currently available, after refilling up to now.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.max_tokens, self.refill_per_ms, Instant::now());
        bucket.tokens
    }
}
