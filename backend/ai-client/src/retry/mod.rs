//! Retry decisions for AI API calls.
//!
//! The policy is pure: given the error from a failed attempt and that attempt's
//! index it answers whether to try again and how long to wait. Sleeping and
//! cancellation belong to the executor.

use crate::config::RetryConfig;
use crate::error::RequestError;

use std::time::Duration;

use log::debug;
use rand::Rng;

/// Jitter is drawn from `[0, JITTER_FACTOR * base_delay)`.
const JITTER_FACTOR: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

impl RetryDecision {
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }

    pub fn delay(&self) -> Option<Duration> {
        match self {
            RetryDecision::Retry { delay } => Some(*delay),
            RetryDecision::GiveUp => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.base_delay(), config.max_delay())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Decide what follows the failure of attempt `attempt` (zero-based).
    ///
    /// At most `max_retries` retries follow the first attempt. Non-retryable
    /// errors (validation, decode, aborted, and every 4xx except 429) give up
    /// immediately. A 429 carrying `retry-after` waits exactly that long.
    pub fn decide(&self, error: &RequestError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries {
            debug!(
                "Retry budget exhausted after attempt {} ({})",
                attempt + 1,
                error.error_category()
            );
            return RetryDecision::GiveUp;
        }

        if !error.is_retryable() {
            debug!("Not retrying {} error", error.error_category());
            return RetryDecision::GiveUp;
        }

        let delay = match error.retry_after() {
            Some(retry_after) => retry_after,
            None => self.backoff_delay(attempt),
        };

        RetryDecision::Retry { delay }
    }

    /// `min(base * 2^attempt + jitter, max)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let jitter = random_jitter(self.base_delay);
        self.backoff_delay_with_jitter(attempt, jitter)
    }

    pub(crate) fn backoff_delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let exponential = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.min(31)));

        exponential.saturating_add(jitter).min(self.max_delay)
    }
}

fn random_jitter(base_delay: Duration) -> Duration {
    let span_ms = base_delay.as_millis() as f64 * JITTER_FACTOR;
    if span_ms < 1.0 {
        return Duration::ZERO;
    }

    let jitter_ms = rand::rng().random_range(0.0..span_ms);
    Duration::from_micros((jitter_ms * 1_000.0) as u64)
}
