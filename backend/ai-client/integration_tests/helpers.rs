//! Shared fixtures for ai-client integration tests.

use ai_client::NoteAiService;
use ai_client::config::AppConfig;

use common::RedactedToken;

use serde_json::{Value, json};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token-12345";

/// Config pointed at `base_url` with millisecond-scale delays and no pacing.
pub fn fast_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.base_url = base_url.to_string();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.rate_limit.min_interval_ms = 0;
    config.request.timeout_secs = 5;
    config.analytics.batch_size = 1_000;
    config.analytics.flush_base_delay_ms = 10;
    config.analytics.flush_max_delay_ms = 50;
    config.notifications.reconnect_base_ms = 10;
    config.notifications.reconnect_max_ms = 50;
    config
}

pub fn service_for(server: &MockServer) -> NoteAiService {
    NoteAiService::new(
        fast_config(&server.uri()),
        Some(RedactedToken::new(TEST_TOKEN)),
    )
    .expect("service should build")
}

pub fn summary_body() -> Value {
    json!({
        "summary": "Photosynthesis turns light into chemical energy.",
        "keyPoints": ["Light", "Chlorophyll"],
        "wordCount": 7
    })
}

/// Number of requests the mock server saw for `path`.
pub async fn requests_to(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == path)
        .count()
}
