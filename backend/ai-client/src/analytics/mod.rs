//! Batched client-side telemetry.
//!
//! # Behaviour
//! - `track` appends to an in-memory queue; reaching `batch_size` detaches the
//!   whole queue and sends it from a background task
//! - Each send gets `max_flush_attempts` tries with exponential backoff
//! - A batch that exhausts its tries goes back to the front of the queue and a
//!   single `analytics_error` event is recorded; that event is never requeued
//! - Failures are logged and swallowed, telemetry never breaks a user operation

mod sink;

pub use sink::{AnalyticsBatch, AnalyticsSink};

use crate::config::AnalyticsConfig;

use models::{AnalyticsEvent, AnalyticsEventType, unix_millis_now};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::backoff::Backoff;
use log::{debug, info, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep as TokioSleep};

const ANALYTICS_ENDPOINT_LABEL: &str = "analytics";
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// What a flush did with the queued events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was queued.
    Empty,
    /// The batch was accepted by the sink.
    Sent { events: usize },
    /// Every attempt failed; the batch is back at the front of the queue.
    Requeued { events: usize },
}

#[derive(Clone)]
pub struct AnalyticsQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    config: AnalyticsConfig,
    sink: Arc<dyn AnalyticsSink>,
    events: Mutex<VecDeque<AnalyticsEvent>>,
    /// Serializes sends so requeued batches keep chronological order.
    send_lock: tokio::sync::Mutex<()>,
    pending_flushes: Mutex<Vec<JoinHandle<()>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AnalyticsQueue {
    pub fn new(config: AnalyticsConfig, sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                config,
                sink,
                events: Mutex::new(VecDeque::new()),
                send_lock: tokio::sync::Mutex::new(()),
                pending_flushes: Mutex::new(Vec::new()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Start the periodic flush timer. Calling it again restarts the timer.
    pub fn start(&self) {
        let period = self.inner.config.flush_interval();
        let weak: Weak<QueueInner> = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                AnalyticsQueue { inner }.flush().await;
            }
        });

        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }

        info!("Analytics flush timer started (every {period:?})");
    }

    /// Queue an event, starting a background flush once the batch threshold is reached.
    pub fn track(&self, event: AnalyticsEvent) {
        if !self.inner.config.enabled {
            return;
        }

        let batch = {
            let mut events = lock(&self.inner.events);
            events.push_back(event);

            if events.len() < self.inner.config.batch_size {
                return;
            }
            events.drain(..).collect::<Vec<_>>()
        };

        match Handle::try_current() {
            Ok(runtime) => {
                debug!("Analytics batch threshold reached, flushing {} events", batch.len());
                let queue = self.clone();
                let handle = runtime.spawn(async move {
                    queue.send_batch(batch).await;
                });

                let mut pending = lock(&self.inner.pending_flushes);
                pending.retain(|h| !h.is_finished());
                pending.push(handle);
            }
            Err(_) => {
                // Outside a runtime: keep the events for the next explicit flush
                self.requeue_front(batch);
            }
        }
    }

    /// Send every queued event now.
    pub async fn flush(&self) -> FlushOutcome {
        let batch: Vec<AnalyticsEvent> = lock(&self.inner.events).drain(..).collect();
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        self.send_batch(batch).await
    }

    /// Stop timers, let in-flight batches finish, make one last single-attempt
    /// flush, then drop whatever is left.
    pub async fn cleanup(&self) {
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }

        let pending: Vec<JoinHandle<()>> = lock(&self.inner.pending_flushes).drain(..).collect();
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Analytics flush task ended abnormally: {e}");
            }
        }

        let batch: Vec<AnalyticsEvent> = lock(&self.inner.events).drain(..).collect();
        if !batch.is_empty() {
            let _guard = self.inner.send_lock.lock().await;
            let payload = AnalyticsBatch {
                events: &batch,
                attempt: 0,
                timestamp: unix_millis_now(),
            };
            match self.inner.sink.send(&payload).await {
                Ok(()) => info!("Final analytics flush sent {} events", batch.len()),
                Err(e) => warn!("Final analytics flush dropped {} events: {e}", batch.len()),
            }
        }

        lock(&self.inner.events).clear();
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.inner.events).len()
    }

    /// Copy of the queued events, oldest first.
    pub fn pending_events(&self) -> Vec<AnalyticsEvent> {
        lock(&self.inner.events).iter().cloned().collect()
    }

    async fn send_batch(&self, batch: Vec<AnalyticsEvent>) -> FlushOutcome {
        let _guard = self.inner.send_lock.lock().await;
        let config = &self.inner.config;

        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(config.flush_base_delay_ms))
            .with_multiplier(BACKOFF_MULTIPLIER)
            .with_randomization_factor(0.0)
            .with_max_interval(Duration::from_millis(config.flush_max_delay_ms))
            .with_max_elapsed_time(None)
            .build();

        let mut last_error = String::new();

        for attempt in 0..config.max_flush_attempts {
            let payload = AnalyticsBatch {
                events: &batch,
                attempt,
                timestamp: unix_millis_now(),
            };

            match self.inner.sink.send(&payload).await {
                Ok(()) => {
                    debug!("Analytics batch of {} events sent", batch.len());
                    return FlushOutcome::Sent {
                        events: batch.len(),
                    };
                }
                Err(e) => {
                    warn!(
                        "Analytics flush attempt {}/{} failed: {e}",
                        attempt + 1,
                        config.max_flush_attempts
                    );
                    last_error = e.to_string();
                }
            }

            if attempt + 1 < config.max_flush_attempts
                && let Some(delay) = backoff.next_backoff()
            {
                TokioSleep(delay).await;
            }
        }

        let count = batch.len();
        self.requeue_front(batch);

        // Recorded directly: a failing endpoint must not trigger another flush from here
        let error_event = AnalyticsEvent::new(AnalyticsEventType::AnalyticsError, ANALYTICS_ENDPOINT_LABEL)
            .with_metadata("failedEvents", count)
            .with_metadata("error", last_error);
        lock(&self.inner.events).push_back(error_event);

        warn!("Analytics batch of {count} events requeued after exhausting retries");
        FlushOutcome::Requeued { events: count }
    }

    /// Put `batch` back ahead of newer events, dropping earlier error markers.
    fn requeue_front(&self, batch: Vec<AnalyticsEvent>) {
        let mut events = lock(&self.inner.events);
        for event in batch
            .into_iter()
            .rev()
            .filter(|e| e.event_type != AnalyticsEventType::AnalyticsError)
        {
            events.push_front(event);
        }
    }
}

/// Queue state stays usable after a panic elsewhere; the data is plain values.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
