use crate::CallOptions;
use crate::NoteAiService;
use crate::api_client::SUMMARIZE_ENDPOINT;
use crate::config::AppConfig;
use crate::error::RequestError;
use crate::service::{AiResponse, Joined, summary_key};

use models::SummaryOptions;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOTE: &str = "Osmosis moves water across a semi-permeable membrane.";

fn service_for(server: &MockServer) -> NoteAiService {
    let mut config = AppConfig::default();
    config.server.base_url = server.uri();
    config.rate_limit.min_interval_ms = 0;
    config.analytics.enabled = false;
    NoteAiService::new(config, None).unwrap()
}

/// **VALUE**: A caller that missed the cache just before another call stored its
/// result reuses that result instead of starting a second request.
///
/// **WHY THIS MATTERS**: The cache lookup and the in-flight join are separate steps.
/// Between them the shared call can finish, store its result and leave the
/// in-flight map, which used to look like "nothing running, nothing cached".
///
/// **BUG THIS CATCHES**: Would catch `join_or_start` starting a new backend call
/// without looking at the cache again under the in-flight lock.
#[tokio::test]
async fn given_result_stored_after_cache_miss_when_joining_then_cached_without_new_request() {
    // GIVEN: A completed summary call, stored in the cache and gone from in-flight
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ai/summarize"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "summary": "Water moves." })),
        )
        .mount(&server)
        .await;
    let service = service_for(&server);
    let options = SummaryOptions::default();
    service
        .generate_summary(NOTE, &options, &CallOptions::default())
        .await
        .unwrap();

    // WHEN: A caller that saw a miss earlier now joins for the same key
    let invoked = Arc::new(AtomicU32::new(0));
    let counter = invoked.clone();
    let joined = service.join_or_start(
        SUMMARIZE_ENDPOINT,
        summary_key(NOTE, &options).unwrap(),
        &CallOptions::default(),
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<AiResponse, RequestError>(RequestError::network("not expected")) }
        },
    );

    // THEN: The stored result comes back and no new request is built
    match joined {
        Joined::Cached(AiResponse::Summary(summary)) => assert_eq!(summary.summary, "Water moves."),
        Joined::Cached(_) => panic!("expected a cached summary"),
        Joined::Call(_) => panic!("expected the cached result, got a new call"),
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
