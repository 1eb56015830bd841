use crate::{AnalyticsEvent, AnalyticsEventType};

use serde_json::json;

/// **VALUE**: Verifies the wire shape the analytics endpoint stores.
///
/// **WHY THIS MATTERS**: The backend groups events by the `type` string. A renamed
/// field or a CamelCase variant would land every event in an unknown bucket.
///
/// **BUG THIS CATCHES**: Would catch losing `#[serde(rename = "type")]` or the
/// snake_case renaming of event types.
#[test]
fn given_event_with_metadata_when_serialized_then_type_is_snake_case_and_metadata_kept() {
    // GIVEN: A retry event with metadata
    let event = AnalyticsEvent::new(AnalyticsEventType::ApiRetry, "ai/summarize")
        .with_metadata("attempt", 2)
        .with_metadata("delayMs", 2_000);

    // WHEN: Serializing
    let value = serde_json::to_value(&event).unwrap();

    // THEN: Field names and values match the endpoint's contract
    assert_eq!(value["type"], "api_retry");
    assert_eq!(value["endpoint"], "ai/summarize");
    assert_eq!(value["metadata"], json!({ "attempt": 2, "delayMs": 2000 }));
    assert!(value["timestamp"].as_u64().unwrap() > 0);
}

#[test]
fn given_event_types_when_displayed_then_match_serialized_names() {
    for event_type in [
        AnalyticsEventType::CacheHit,
        AnalyticsEventType::CacheExpired,
        AnalyticsEventType::RequestCoalesced,
        AnalyticsEventType::ValidationError,
    ] {
        let serialized = serde_json::to_value(event_type).unwrap();
        assert_eq!(serialized, event_type.to_string());
    }
}
