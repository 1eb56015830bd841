use crate::error::AnalyticsError;

use models::AnalyticsEvent;

use async_trait::async_trait;
use serde::Serialize;

/// Body of `POST /api/analytics`.
#[derive(Debug, Serialize)]
pub struct AnalyticsBatch<'a> {
    pub events: &'a [AnalyticsEvent],
    pub attempt: u32,
    pub timestamp: u64,
}

/// Destination for analytics batches.
///
/// Implemented by the HTTP API client; tests substitute recording sinks.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn send(&self, batch: &AnalyticsBatch<'_>) -> Result<(), AnalyticsError>;
}
