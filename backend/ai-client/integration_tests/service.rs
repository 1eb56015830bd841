use crate::helpers::{TEST_TOKEN, fast_config, requests_to, service_for, summary_body};

use ai_client::error::{AbortReason, RequestError};
use ai_client::{CallOptions, MAX_CONTENT_CHARS, NoteAiService};

use common::RedactedToken;
use models::{AnalyticsEventType, Difficulty, SummaryOptions, SummaryStyle};

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOTE: &str = "Photosynthesis is the process by which plants convert light energy.";

async fn mount_summary(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_body()))
        .mount(server)
        .await;
}

/// **VALUE**: Blank content is rejected before anything touches the network.
///
/// **WHY THIS MATTERS**: An empty note costs a backend round trip (and a retry budget)
/// for a request that can never succeed.
///
/// **BUG THIS CATCHES**: Would catch validation moved after the cache or executor.
#[tokio::test]
async fn given_empty_content_when_generating_summary_then_validation_error_and_no_request() {
    // GIVEN: A service pointed at a mock backend
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = service_for(&server);

    // WHEN: Summarizing empty and whitespace-only content
    for content in ["", "   \n\t"] {
        let result = service
            .generate_summary(content, &SummaryOptions::default(), &CallOptions::default())
            .await;

        // THEN: Validation error
        assert!(matches!(result, Err(RequestError::Validation { .. })), "{content:?}");
    }

    // THEN: Zero network calls
    assert_eq!(requests_to(&server, "/ai/summarize").await, 0);
}

#[tokio::test]
async fn given_oversized_content_when_generating_summary_then_validation_error() {
    let server = MockServer::start().await;
    let service = service_for(&server);
    let content = "a".repeat(MAX_CONTENT_CHARS + 1);

    let result = service
        .generate_summary(&content, &SummaryOptions::default(), &CallOptions::default())
        .await;

    assert!(matches!(result, Err(RequestError::Validation { .. })));
    assert_eq!(requests_to(&server, "/ai/summarize").await, 0);
}

#[tokio::test]
async fn given_count_out_of_range_when_generating_flashcards_then_validation_error() {
    let server = MockServer::start().await;
    let service = service_for(&server);

    for count in [0, 51] {
        let result = service
            .generate_flashcards(NOTE, count, Difficulty::Medium, &CallOptions::default())
            .await;
        assert!(matches!(result, Err(RequestError::Validation { .. })), "count {count}");
    }
    assert_eq!(requests_to(&server, "/ai/generate-flashcards").await, 0);
}

/// **VALUE**: The happy path sends the documented body and auth header.
///
/// **WHY THIS MATTERS**: The backend contract is `{content, options}` with a bearer token;
/// any drift is a 400 or 401 in production.
///
/// **BUG THIS CATCHES**: Would catch snake_case option fields, a missing Authorization
/// header, or a wrong path join.
#[tokio::test]
async fn given_valid_content_when_generating_summary_then_posts_contract_body_with_bearer_token() {
    // GIVEN: A backend that only answers the exact expected request
    let server = MockServer::start().await;
    let options = SummaryOptions {
        max_length: Some(120),
        style: SummaryStyle::Bullets,
        ..SummaryOptions::default()
    };
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "content": NOTE,
            "options": { "maxLength": 120, "style": "bullets", "includeKeyPoints": true }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(summary_body()))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    // WHEN: Summarizing
    let summary = service
        .generate_summary(NOTE, &options, &CallOptions::default())
        .await
        .unwrap();

    // THEN: Parsed response
    assert_eq!(summary.key_points, vec!["Light", "Chlorophyll"]);
    assert_eq!(summary.word_count, Some(7));
}

/// **VALUE**: A repeated identical call is served from cache.
///
/// **WHY THIS MATTERS**: Re-opening a note should not cost another AI call.
///
/// **BUG THIS CATCHES**: Would catch results never written to the cache, or keys that
/// ignore options (serving a brief summary for a bullets request).
#[tokio::test]
async fn given_identical_second_call_when_generating_summary_then_served_from_cache() {
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = service_for(&server);
    let options = SummaryOptions::default();

    let first = service.generate_summary(NOTE, &options, &CallOptions::default()).await.unwrap();
    let second = service.generate_summary(NOTE, &options, &CallOptions::default()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
    let stats = service.cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));

    // Different options are a different key
    let bullets = SummaryOptions {
        style: SummaryStyle::Bullets,
        ..SummaryOptions::default()
    };
    service.generate_summary(NOTE, &bullets, &CallOptions::default()).await.unwrap();
    assert_eq!(requests_to(&server, "/ai/summarize").await, 2);

    // Cleared cache goes back to the network
    service.clear_cache();
    service.generate_summary(NOTE, &options, &CallOptions::default()).await.unwrap();
    assert_eq!(requests_to(&server, "/ai/summarize").await, 3);
}

/// **VALUE**: One 503 followed by success costs two requests and one reported retry.
///
/// **WHY THIS MATTERS**: Transient backend errors are the main reason the retry layer
/// exists; the caller should see only the success.
///
/// **BUG THIS CATCHES**: Would catch 5xx classified as terminal, or retries continuing
/// after success.
#[tokio::test]
async fn given_one_server_error_when_generating_summary_then_retried_once_and_succeeds() {
    // GIVEN: The first request fails with 503, later ones succeed
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_summary(&server).await;
    let service = service_for(&server);
    let retries = Arc::new(AtomicU32::new(0));
    let counter = retries.clone();
    let call = CallOptions::default().on_retry(move |progress| {
        assert_eq!(progress.error.status_code(), Some(503));
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // WHEN: Summarizing
    let result = service.generate_summary(NOTE, &SummaryOptions::default(), &call).await;

    // THEN: Success after two requests and one retry notification
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(requests_to(&server, "/ai/summarize").await, 2);
    assert_eq!(retries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn given_rate_limited_with_retry_after_when_generating_summary_then_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_summary(&server).await;
    let service = service_for(&server);

    let result = service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await;

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(requests_to(&server, "/ai/summarize").await, 2);
}

#[tokio::test]
async fn given_client_error_when_generating_summary_then_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad options"))
        .mount(&server)
        .await;
    let service = service_for(&server);

    let result = service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, RequestError::Client { .. }), "{error}");
    assert_eq!(error.status_code(), Some(422));
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
}

#[tokio::test]
async fn given_persistent_server_error_when_generating_summary_then_fails_after_four_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let service = service_for(&server);

    let result = service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await;

    assert!(matches!(result, Err(RequestError::Server { .. })));
    assert_eq!(requests_to(&server, "/ai/summarize").await, 4);
    assert_eq!(service.cache_stats().size, 0);
}

#[tokio::test]
async fn given_malformed_response_body_when_generating_summary_then_decode_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    let service = service_for(&server);

    let result = service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await;

    assert!(matches!(result, Err(RequestError::Decode { .. })));
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
}

/// **VALUE**: Concurrent identical requests share one backend call.
///
/// **WHY THIS MATTERS**: Several views asking for the same note's summary at once must
/// not multiply AI cost.
///
/// **BUG THIS CATCHES**: Would catch the in-flight map being keyed differently from the
/// cache, or each caller starting its own request before the first one is cached.
#[tokio::test]
async fn given_concurrent_identical_calls_when_generating_summary_then_one_backend_call() {
    // GIVEN: A slow backend
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(summary_body())
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    let service = service_for(&server);
    let options = SummaryOptions::default();
    let call = CallOptions::default();

    // WHEN: Three identical calls run concurrently
    let (a, b, c) = tokio::join!(
        service.generate_summary(NOTE, &options, &call),
        service.generate_summary(NOTE, &options, &call),
        service.generate_summary(NOTE, &options, &call),
    );

    // THEN: All succeed with the same value from a single request
    let a = a.unwrap();
    assert_eq!(a, b.unwrap());
    assert_eq!(a, c.unwrap());
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
}

#[tokio::test]
async fn given_one_coalesced_caller_cancels_when_others_wait_then_they_still_get_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(summary_body())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    let service = service_for(&server);
    let options = SummaryOptions::default();
    let signal = CancellationToken::new();
    let impatient = CallOptions::default().with_signal(signal.clone());
    let patient = CallOptions::default();

    let canceller = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        signal.cancel();
    };
    let (first, second, ()) = tokio::join!(
        service.generate_summary(NOTE, &options, &impatient),
        service.generate_summary(NOTE, &options, &patient),
        canceller,
    );

    assert!(matches!(
        first,
        Err(RequestError::Aborted { reason: AbortReason::Cancelled, .. })
    ));
    assert!(second.is_ok());
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
}

/// **VALUE**: Debounced calls with one key issue only the last request.
///
/// **WHY THIS MATTERS**: Summaries refresh while typing; each keystroke must not become
/// an AI call.
///
/// **BUG THIS CATCHES**: Would catch superseded calls still reaching the network, or the
/// last call being dropped as well.
#[tokio::test]
async fn given_rapid_debounced_calls_when_same_key_then_only_last_reaches_backend() {
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = service_for(&server);
    let options = SummaryOptions::default();
    let call = CallOptions::default();
    let delay = Duration::from_millis(100);

    let (first, second, third) = tokio::join!(
        service.generate_summary_debounced("note-1", delay, "draft one", &options, &call),
        service.generate_summary_debounced("note-1", delay, "draft one two", &options, &call),
        service.generate_summary_debounced("note-1", delay, NOTE, &options, &call),
    );

    for superseded in [first, second] {
        assert!(matches!(
            superseded,
            Err(RequestError::Aborted { reason: AbortReason::Superseded, .. })
        ));
    }
    assert!(third.is_ok());
    assert_eq!(requests_to(&server, "/ai/summarize").await, 1);
}

#[tokio::test]
async fn given_flashcard_request_when_generating_then_posts_count_and_difficulty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/generate-flashcards"))
        .and(body_json(json!({ "content": NOTE, "count": 2, "difficulty": "hard" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "question": "What is photosynthesis?", "answer": "Light to energy", "difficulty": "hard" },
            { "id": "c2", "question": "Where?", "answer": "Chloroplasts", "tags": ["biology"] }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let cards = service
        .generate_flashcards(NOTE, 2, Difficulty::Hard, &CallOptions::default())
        .await
        .unwrap();

    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].difficulty, Some(Difficulty::Hard));
    assert_eq!(cards[1].tags, vec!["biology"]);
}

#[tokio::test]
async fn given_existing_tags_when_suggesting_tags_then_they_are_sent_along() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/suggest-tags"))
        .and(body_partial_json(json!({ "existing_tags": ["science"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "tag": "biology", "confidence": 0.9 },
            { "tag": "plants", "confidence": 0.7 }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let tags = service
        .suggest_tags(NOTE, &["science".to_string()], &CallOptions::default())
        .await
        .unwrap();

    assert_eq!(tags[0].tag, "biology");
    assert_eq!(tags.len(), 2);
}

#[tokio::test]
async fn given_cleaned_up_service_when_calling_then_aborted_without_request() {
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = service_for(&server);
    service.start();

    service.cleanup().await;
    let result = service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await;

    assert!(result.unwrap_err().is_aborted());
    assert_eq!(requests_to(&server, "/ai/summarize").await, 0);
}

#[tokio::test]
async fn given_no_token_when_calling_then_no_authorization_header_is_sent() {
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = NoteAiService::new(fast_config(&server.uri()), None).unwrap();

    service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn given_completed_calls_when_flushing_analytics_then_events_reach_backend() {
    let server = MockServer::start().await;
    mount_summary(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/analytics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .mount(&server)
        .await;
    let service = service_for(&server);

    service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await
        .unwrap();
    service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await
        .unwrap();
    service.analytics().flush().await;

    let requests = server.received_requests().await.unwrap();
    let analytics = requests
        .iter()
        .find(|r| r.url.path() == "/api/analytics")
        .expect("analytics batch posted");
    let body: serde_json::Value = serde_json::from_slice(&analytics.body).unwrap();
    let types: Vec<&str> = body["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["type"].as_str().unwrap())
        .collect();
    assert_eq!(
        types,
        vec!["cache_miss", "api_call_start", "api_call_success", "cache_hit"]
    );
    assert_eq!(body["attempt"], 0);
}

/// Service with a one-second cache ttl, so expiry can be observed in real time.
fn short_ttl_service(server: &MockServer) -> NoteAiService {
    let mut config = fast_config(&server.uri());
    config.cache.ttl_secs = 1;
    NoteAiService::new(config, Some(RedactedToken::new(TEST_TOKEN))).expect("service should build")
}

/// **VALUE**: An expired entry is reported as `cache_expired`, not `cache_miss`, and
/// the summary is fetched again.
///
/// **WHY THIS MATTERS**: Expiry and cold misses mean different things on the
/// analytics dashboard: one is the ttl doing its job, the other is a new note.
///
/// **BUG THIS CATCHES**: Would catch the service folding `Expired` into `Miss`, or
/// serving a stale summary past its ttl.
#[tokio::test]
async fn given_cached_summary_past_ttl_when_generating_again_then_cache_expired_and_refetched() {
    // GIVEN: A summary cached with a one-second ttl
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = short_ttl_service(&server);
    let options = SummaryOptions::default();
    service
        .generate_summary(NOTE, &options, &CallOptions::default())
        .await
        .unwrap();

    // WHEN: Asking again after the ttl has passed
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    service
        .generate_summary(NOTE, &options, &CallOptions::default())
        .await
        .unwrap();

    // THEN: The backend was called twice and the second lookup was an expiry
    assert_eq!(requests_to(&server, "/ai/summarize").await, 2);
    let cache_events: Vec<AnalyticsEventType> = service
        .analytics()
        .pending_events()
        .into_iter()
        .map(|event| event.event_type)
        .filter(|kind| {
            matches!(
                kind,
                AnalyticsEventType::CacheMiss
                    | AnalyticsEventType::CacheExpired
                    | AnalyticsEventType::CacheHit
            )
        })
        .collect();
    assert_eq!(
        cache_events,
        vec![AnalyticsEventType::CacheMiss, AnalyticsEventType::CacheExpired]
    );
    assert_eq!(service.cache_stats().misses, 2);
}

/// **VALUE**: A started service evicts expired entries on its own, without a lookup.
///
/// **WHY THIS MATTERS**: Notes that are never reopened would otherwise keep their
/// summaries in memory for the life of the process.
///
/// **BUG THIS CATCHES**: Would catch `start()` not spawning the eviction task, or the
/// task holding a dead reference and never touching the cache.
#[tokio::test]
async fn given_started_service_when_ttl_passes_then_periodic_eviction_empties_cache() {
    // GIVEN: A started service with one cached summary
    let server = MockServer::start().await;
    mount_summary(&server).await;
    let service = short_ttl_service(&server);
    service.start();
    service
        .generate_summary(NOTE, &SummaryOptions::default(), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(service.cache_stats().size, 1);

    // WHEN: Two eviction periods pass with no lookups
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    // THEN: The entry is gone and no lookup was counted
    let stats = service.cache_stats();
    assert_eq!(stats.size, 0);
    assert_eq!((stats.hits, stats.misses), (0, 1));

    service.cleanup().await;
}
