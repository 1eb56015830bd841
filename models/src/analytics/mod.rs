//! Client-side telemetry events batched by the analytics queue.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    ApiCallStart,
    ApiCallSuccess,
    ApiCallError,
    ApiRetry,
    CacheHit,
    CacheMiss,
    CacheExpired,
    ValidationError,
    RateLimited,
    RequestCoalesced,
    AnalyticsError,
}

impl AnalyticsEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyticsEventType::ApiCallStart => "api_call_start",
            AnalyticsEventType::ApiCallSuccess => "api_call_success",
            AnalyticsEventType::ApiCallError => "api_call_error",
            AnalyticsEventType::ApiRetry => "api_retry",
            AnalyticsEventType::CacheHit => "cache_hit",
            AnalyticsEventType::CacheMiss => "cache_miss",
            AnalyticsEventType::CacheExpired => "cache_expired",
            AnalyticsEventType::ValidationError => "validation_error",
            AnalyticsEventType::RateLimited => "rate_limited",
            AnalyticsEventType::RequestCoalesced => "request_coalesced",
            AnalyticsEventType::AnalyticsError => "analytics_error",
        }
    }
}

impl std::fmt::Display for AnalyticsEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One telemetry record.
///
/// `timestamp` is milliseconds since the Unix epoch, matching what the analytics
/// endpoint stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsEvent {
    #[serde(rename = "type")]
    pub event_type: AnalyticsEventType,
    pub endpoint: String,
    pub timestamp: u64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl AnalyticsEvent {
    /// Event stamped with the current time and no metadata.
    pub fn new(event_type: AnalyticsEventType, endpoint: impl Into<String>) -> Self {
        Self {
            event_type,
            endpoint: endpoint.into(),
            timestamp: unix_millis_now(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
