//! Exponential backoff for rate-limited calls
//!
//! The policy is a pure decision over the attempt index. Waiting goes
//! through `Sleeper` so the async host is never blocked and tests never
//! actually sleep.

use async_trait::async_trait;
use std::time::Duration;

/// Max attempts per completion call
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// First backoff delay (seconds)
pub const DEFAULT_INITIAL_DELAY_SECS: f64 = 1.0;

/// What to do after attempt `i` was rate limited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run attempt `next_attempt`
    Retry { next_attempt: u32, delay: Duration },
    /// Ceiling reached
    GiveUp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_secs_f64(DEFAULT_INITIAL_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration) -> Self {
        Self { max_retries, initial_delay }
    }

    /// Build from config values; negative or NaN delays clamp to zero
    pub fn from_secs(max_retries: u32, initial_delay_secs: f64) -> Self {
        let secs = if initial_delay_secs.is_finite() && initial_delay_secs > 0.0 {
            initial_delay_secs
        } else {
            0.0
        };
        Self::new(max_retries, Duration::from_secs_f64(secs))
    }

    /// `initial_delay * 2^attempt`, saturating
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32
            .checked_pow(attempt)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .unwrap_or(Duration::MAX)
    }

    /// Decide after attempt `attempt` (0-based) hit a rate limit
    pub fn on_rate_limit(&self, attempt: u32) -> RetryDecision {
        if attempt + 1 < self.max_retries {
            RetryDecision::Retry {
                next_attempt: attempt + 1,
                delay: self.delay_for(attempt),
            }
        } else {
            RetryDecision::GiveUp
        }
    }
}

/// Suspension point used between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real waiting on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
