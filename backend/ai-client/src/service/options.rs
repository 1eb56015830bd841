use crate::executor::{RetryCallback, RetryProgress};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Caller-side controls for one AI operation.
///
/// `timeout` applies to each attempt. When several callers share one
/// coalesced request, the first caller's `timeout` and `on_retry` are the ones
/// in effect; each caller's `signal` only detaches that caller.
#[derive(Clone, Default)]
pub struct CallOptions {
    pub signal: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    pub on_retry: Option<RetryCallback>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_retry(mut self, callback: impl Fn(&RetryProgress) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(callback));
        self
    }
}
