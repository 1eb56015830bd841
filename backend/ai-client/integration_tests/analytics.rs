use crate::helpers::{TEST_TOKEN, requests_to};

use ai_client::analytics::{AnalyticsQueue, FlushOutcome};
use ai_client::api_client::AiApiClient;
use ai_client::config::AnalyticsConfig;

use common::RedactedToken;
use models::{AnalyticsEvent, AnalyticsEventType};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn queue_for(server: &MockServer) -> AnalyticsQueue {
    let client = AiApiClient::new(
        &server.uri(),
        Duration::from_secs(5),
        Some(Arc::new(RedactedToken::new(TEST_TOKEN))),
    )
    .unwrap();
    let config = AnalyticsConfig {
        batch_size: 100,
        flush_base_delay_ms: 10,
        flush_max_delay_ms: 50,
        ..AnalyticsConfig::default()
    };
    AnalyticsQueue::new(config, Arc::new(client))
}

fn cache_hit() -> AnalyticsEvent {
    AnalyticsEvent::new(AnalyticsEventType::CacheHit, "ai/summarize")
}

#[tokio::test]
async fn given_backend_acknowledges_when_flushing_then_batch_is_sent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;
    let queue = queue_for(&server);
    queue.track(cache_hit());
    queue.track(cache_hit());

    let outcome = queue.flush().await;

    assert_eq!(outcome, FlushOutcome::Sent { events: 2 });
    assert_eq!(queue.pending_len(), 0);
}

/// **VALUE**: `{"success": false}` counts as a failed delivery.
///
/// **WHY THIS MATTERS**: The analytics endpoint answers 200 even when it drops a batch;
/// treating that as delivered silently loses telemetry.
///
/// **BUG THIS CATCHES**: Would catch the sink checking only the HTTP status.
#[tokio::test]
async fn given_backend_reports_failure_when_flushing_then_three_attempts_and_requeued() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;
    let queue = queue_for(&server);
    queue.track(cache_hit());

    let outcome = queue.flush().await;

    assert_eq!(outcome, FlushOutcome::Requeued { events: 1 });
    assert_eq!(requests_to(&server, "/api/analytics").await, 3);
    let pending = queue.pending_events();
    assert_eq!(pending[0].event_type, AnalyticsEventType::CacheHit);
    assert_eq!(pending[1].event_type, AnalyticsEventType::AnalyticsError);
}

#[tokio::test]
async fn given_server_error_then_recovery_when_flushing_then_attempt_number_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;
    let queue = queue_for(&server);
    queue.track(cache_hit());

    let outcome = queue.flush().await;

    assert_eq!(outcome, FlushOutcome::Sent { events: 1 });
    let requests = server.received_requests().await.unwrap();
    let attempts: Vec<u64> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["attempt"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(attempts, vec![0, 1]);
}
