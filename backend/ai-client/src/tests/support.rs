// Shared fixtures for unit tests

use crate::analytics::{AnalyticsBatch, AnalyticsQueue, AnalyticsSink};
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;

use models::{AnalyticsEvent, AnalyticsEventType};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

/// Sink that records every batch and fails the first `failures` sends.
#[derive(Default)]
pub struct RecordingSink {
    pub batches: Mutex<Vec<Vec<AnalyticsEvent>>>,
    pub attempts: Mutex<Vec<u32>>,
    failures: AtomicU32,
}

impl RecordingSink {
    pub fn failing(failures: u32) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            ..Self::default()
        }
    }

    pub fn sent_batches(&self) -> Vec<Vec<AnalyticsEvent>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn send_calls(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalyticsSink for RecordingSink {
    async fn send(&self, batch: &AnalyticsBatch<'_>) -> Result<(), AnalyticsError> {
        self.attempts.lock().unwrap().push(batch.attempt);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AnalyticsError::rejected("induced failure"));
        }

        self.batches.lock().unwrap().push(batch.events.to_vec());
        Ok(())
    }
}

pub fn analytics_config(batch_size: usize) -> AnalyticsConfig {
    AnalyticsConfig {
        batch_size,
        ..AnalyticsConfig::default()
    }
}

pub fn recording_queue(batch_size: usize) -> (AnalyticsQueue, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let queue = AnalyticsQueue::new(analytics_config(batch_size), sink.clone());
    (queue, sink)
}

pub fn event(n: usize) -> AnalyticsEvent {
    AnalyticsEvent::new(AnalyticsEventType::ApiCallStart, format!("endpoint-{n}"))
}

pub fn event_types(events: &[AnalyticsEvent]) -> Vec<AnalyticsEventType> {
    events.iter().map(|e| e.event_type).collect()
}
