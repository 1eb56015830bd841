use crate::{AiSummary, Difficulty, Flashcard, SummaryOptions, SummaryStyle};

use serde_json::json;

/// **VALUE**: Verifies the wire shape of summary options (camelCase, omitted Nones).
///
/// **WHY THIS MATTERS**: Options are both sent to the backend and folded into the cache
/// key. A field rename would change every cache key and break the backend contract.
#[test]
fn given_default_options_when_serialized_then_uses_camel_case_and_skips_none() {
    // GIVEN: Default options
    let options = SummaryOptions::default();

    // WHEN: Serializing
    let value = serde_json::to_value(&options).unwrap();

    // THEN: Only set fields appear, in camelCase
    assert_eq!(value, json!({ "style": "brief", "includeKeyPoints": true }));
}

#[test]
fn given_backend_summary_without_optional_fields_when_deserialized_then_defaults_apply() {
    let summary: AiSummary = serde_json::from_value(json!({ "summary": "Short." })).unwrap();

    assert_eq!(summary.summary, "Short.");
    assert!(summary.key_points.is_empty());
    assert_eq!(summary.word_count, None);
}

#[test]
fn given_flashcard_json_when_deserialized_then_difficulty_is_lowercase_enum() {
    let card: Flashcard = serde_json::from_value(json!({
        "question": "What is TTL?",
        "answer": "Time to live",
        "difficulty": "hard"
    }))
    .unwrap();

    assert_eq!(card.difficulty, Some(Difficulty::Hard));
    assert!(card.tags.is_empty());
}

#[test]
fn given_bullets_style_when_serialized_then_lowercase() {
    let options = SummaryOptions {
        style: SummaryStyle::Bullets,
        max_length: Some(120),
        ..SummaryOptions::default()
    };

    let value = serde_json::to_value(&options).unwrap();

    assert_eq!(value["style"], "bullets");
    assert_eq!(value["maxLength"], 120);
}
