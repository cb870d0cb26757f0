//! Token bucket limiting status queries against the Helix API.
//!
//! Helix grants app tokens a refill of 800 points per minute; the default of
//! 10 requests per second leaves headroom for other clients of the same app.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

/// Configuration for a [`RateLimiter`].
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterConfig {
    /// Burst capacity.
    pub max_tokens: u32,
    /// Tokens added per second.
    pub refill_rate: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_tokens: 20,
            refill_rate: 10.0,
        }
    }
}

impl RateLimiterConfig {
    /// A config for `rps` requests per second with a burst of twice that.
    pub fn with_rps(rps: f64) -> crate::Result<Self> {
        if !rps.is_finite() || rps <= 0.0 {
            return Err(crate::Error::validation(format!(
                "rate limit must be a positive finite number, got {}",
                rps
            )));
        }

        Ok(Self {
            max_tokens: (rps * 2.0).ceil().max(1.0) as u32,
            refill_rate: rps,
        })
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Shared token bucket. Starts full.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            bucket: Mutex::new(Bucket {
                tokens: config.max_tokens as f64,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_or_wait().is_ok()
    }

    /// Take a token, sleeping until one is available.
    ///
    /// The lock is never held across the sleep, so dropping this future
    /// leaves the bucket untouched. Returns the total time waited.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire_or_wait() {
                Ok(()) => return waited,
                Err(wait) => {
                    trace!(wait = ?wait, "rate limited");
                    tokio::time::sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }

    /// `Ok` when a token was taken, otherwise the time until the next one.
    fn try_acquire_or_wait(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.config.refill_rate))
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens =
            (bucket.tokens + elapsed * self.config.refill_rate).min(self.config.max_tokens as f64);
        bucket.last_refill = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}
