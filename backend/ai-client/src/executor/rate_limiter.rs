use crate::config::RateLimitConfig;
use crate::error::RequestError;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::debug;
use tokio::time::{Instant, sleep_until as TokioSleepUntil};

/// Minimum spacing between consecutive call starts to the same endpoint.
///
/// Each endpoint is paced independently: summary and flashcard requests do not
/// hold each other back. Concurrent callers reserve consecutive slots, so their
/// start times are at least `min_interval` apart; a completing call also pushes
/// the next slot to `min_interval` after its completion. A reserved slot is
/// kept even if its caller is cancelled while waiting for it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    strict: bool,
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration, strict: bool) -> Self {
        Self {
            min_interval,
            strict,
            next_allowed: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.min_interval(), config.strict)
    }

    /// Time left before `endpoint` may be called again.
    pub fn remaining(&self, endpoint: &str) -> Duration {
        match self.slots().get(endpoint) {
            Some(next) => next.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Reserve the next start slot for `endpoint` and wait for it.
    ///
    /// In strict mode a call that would have to wait fails instead with the
    /// remainder as the retry-after hint, and reserves nothing.
    pub async fn acquire(&self, endpoint: &str) -> Result<(), RequestError> {
        let slot = {
            let mut slots = self.slots();
            let now = Instant::now();
            let slot = slots.get(endpoint).map_or(now, |next| (*next).max(now));

            if self.strict && slot > now {
                return Err(RequestError::rate_limited(Some(slot - now)));
            }

            slots.insert(endpoint.to_string(), slot + self.min_interval);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            debug!("Rate limiter delaying {endpoint} by {wait:?}");
            TokioSleepUntil(slot).await;
        }
        Ok(())
    }

    pub fn record_completion(&self, endpoint: &str) {
        let earliest = Instant::now() + self.min_interval;
        let mut slots = self.slots();
        let next = slots.entry(endpoint.to_string()).or_insert(earliest);
        *next = (*next).max(earliest);
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.next_allowed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
