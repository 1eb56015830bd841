use crate::error::{AbortReason, RequestError};

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::trace;
use tokio::time::sleep as TokioSleep;
use tokio_util::sync::CancellationToken;

/// Cancel-and-replace timers keyed by caller-chosen strings.
///
/// Only the latest call per key survives its quiet period; every earlier
/// pending call for that key resolves to `Aborted(Superseded)` as soon as it
/// is replaced. A call whose quiet period already elapsed is no longer pending
/// and cannot be superseded.
#[derive(Debug, Default)]
pub struct Debouncer {
    pending: Mutex<HashMap<String, PendingCall>>,
    next_id: Mutex<u64>,
}

#[derive(Debug)]
struct PendingCall {
    id: u64,
    token: CancellationToken,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait out `delay` for `key`, replacing any call already waiting on it.
    pub async fn wait(&self, key: &str, delay: Duration) -> Result<(), RequestError> {
        let id = {
            let mut next = self.next_id.lock().unwrap_or_else(|p| p.into_inner());
            *next += 1;
            *next
        };
        let token = CancellationToken::new();

        {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            let previous = pending.insert(
                key.to_string(),
                PendingCall {
                    id,
                    token: token.clone(),
                },
            );
            if let Some(previous) = previous {
                trace!("Debounce key {key}: superseding call {}", previous.id);
                previous.token.cancel();
            }
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                return Err(RequestError::aborted(AbortReason::Superseded));
            }
            _ = TokioSleep(delay) => {}
        }

        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        if pending.get(key).is_some_and(|call| call.id == id) {
            pending.remove(key);
        }

        Ok(())
    }

    /// Supersede whatever is waiting on `key`.
    pub fn cancel(&self, key: &str) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        match pending.remove(key) {
            Some(call) => {
                call.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Supersede every waiting call.
    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        for (_, call) in pending.drain() {
            call.token.cancel();
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}
