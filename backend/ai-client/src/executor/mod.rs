//! Execution of individual AI API calls.
//!
//! [`RequestExecutor::execute`] runs one call under a timeout, the caller's
//! cancellation token and per-endpoint pacing, recording start/success/error
//! analytics. [`RequestExecutor::execute_with_retry`] drives the retry loop on
//! top of it using a [`RetryPolicy`].

mod rate_limiter;

pub use rate_limiter::RateLimiter;

use crate::analytics::AnalyticsQueue;
use crate::error::{AbortReason, RequestError};
use crate::retry::{RetryDecision, RetryPolicy};

use models::{AnalyticsEvent, AnalyticsEventType};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::time::{Instant, sleep as TokioSleep};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Reported before each backoff sleep.
#[derive(Debug, Clone)]
pub struct RetryProgress {
    pub request_id: String,
    /// Zero-based index of the attempt that failed.
    pub attempt: u32,
    pub delay: Duration,
    pub error: RequestError,
}

pub type RetryCallback = Arc<dyn Fn(&RetryProgress) + Send + Sync>;

/// Per-call knobs. Everything is optional; unset values fall back to the
/// executor's defaults.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub timeout: Option<Duration>,
    pub signal: Option<CancellationToken>,
    pub request_id: Option<String>,
    pub on_retry: Option<RetryCallback>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn on_retry(mut self, callback: impl Fn(&RetryProgress) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }
}

#[derive(Clone)]
pub struct RequestExecutor {
    rate_limiter: Arc<RateLimiter>,
    analytics: AnalyticsQueue,
    default_timeout: Duration,
}

impl RequestExecutor {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        analytics: AnalyticsQueue,
        default_timeout: Duration,
    ) -> Self {
        Self {
            rate_limiter,
            analytics,
            default_timeout,
        }
    }

    /// Run `operation` once.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Aborted`] if the signal fires or the timeout elapses first
    /// - [`RequestError::RateLimited`] in strict pacing mode when called too soon
    /// - whatever `operation` returns
    pub async fn execute<T, F, Fut>(
        &self,
        endpoint: &str,
        options: &ExecuteOptions,
        operation: F,
    ) -> Result<T, RequestError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let signal = options.signal.clone().unwrap_or_default();
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        if signal.is_cancelled() {
            return Err(RequestError::aborted(AbortReason::Cancelled));
        }

        let paced = tokio::select! {
            biased;
            _ = signal.cancelled() => Err(RequestError::aborted(AbortReason::Cancelled)),
            paced = self.rate_limiter.acquire(endpoint) => paced,
        };

        if let Err(error) = paced {
            if matches!(error, RequestError::RateLimited { .. }) {
                self.analytics.track(
                    AnalyticsEvent::new(AnalyticsEventType::RateLimited, endpoint)
                        .with_metadata("requestId", request_id.as_str()),
                );
            }
            return Err(error);
        }

        self.analytics.track(
            AnalyticsEvent::new(AnalyticsEventType::ApiCallStart, endpoint)
                .with_metadata("requestId", request_id.as_str()),
        );

        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let result = tokio::select! {
            biased;
            _ = signal.cancelled() => Err(RequestError::aborted(AbortReason::Cancelled)),
            _ = TokioSleep(timeout) => Err(RequestError::aborted(AbortReason::Timeout)),
            result = operation() => result,
        };

        self.rate_limiter.record_completion(endpoint);
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(_) => {
                debug!("{endpoint} [{request_id}] succeeded in {duration_ms}ms");
                self.analytics.track(
                    AnalyticsEvent::new(AnalyticsEventType::ApiCallSuccess, endpoint)
                        .with_metadata("requestId", request_id.as_str())
                        .with_metadata("durationMs", duration_ms),
                );
            }
            Err(error) => {
                warn!("{endpoint} [{request_id}] failed after {duration_ms}ms: {error}");
                let mut event = AnalyticsEvent::new(AnalyticsEventType::ApiCallError, endpoint)
                    .with_metadata("requestId", request_id.as_str())
                    .with_metadata("durationMs", duration_ms)
                    .with_metadata("category", error.error_category());
                if let Some(status) = error.status_code() {
                    event = event.with_metadata("status", status);
                }
                self.analytics.track(event);
            }
        }

        result
    }

    /// Run `operation` until it succeeds, `policy` gives up, or the signal fires.
    ///
    /// The signal is checked before every attempt and raced against every
    /// backoff sleep; an abort is never retried.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        endpoint: &str,
        options: &ExecuteOptions,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> Result<T, RequestError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RequestError>>,
    {
        let signal = options.signal.clone().unwrap_or_default();
        let request_id = options
            .request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let attempt_options = ExecuteOptions {
            signal: Some(signal.clone()),
            request_id: Some(request_id.clone()),
            ..options.clone()
        };

        let mut attempt: u32 = 0;

        loop {
            if signal.is_cancelled() {
                return Err(RequestError::aborted(AbortReason::Cancelled));
            }

            let error = match self
                .execute(endpoint, &attempt_options, || operation())
                .await
            {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let RetryDecision::Retry { delay } = policy.decide(&error, attempt) else {
                return Err(error);
            };

            if signal.is_cancelled() {
                return Err(RequestError::aborted(AbortReason::Cancelled));
            }

            debug!(
                "{endpoint} [{request_id}] attempt {} failed ({}), retrying in {delay:?}",
                attempt + 1,
                error.error_category()
            );

            self.analytics.track(
                AnalyticsEvent::new(AnalyticsEventType::ApiRetry, endpoint)
                    .with_metadata("requestId", request_id.as_str())
                    .with_metadata("attempt", attempt + 1)
                    .with_metadata("delayMs", delay.as_millis() as u64),
            );

            if let Some(callback) = &options.on_retry {
                callback(&RetryProgress {
                    request_id: request_id.clone(),
                    attempt,
                    delay,
                    error,
                });
            }

            tokio::select! {
                biased;
                _ = signal.cancelled() => {
                    return Err(RequestError::aborted(AbortReason::Cancelled));
                }
                _ = TokioSleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
