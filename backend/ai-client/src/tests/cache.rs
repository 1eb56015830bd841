use crate::cache::{CacheKey, CacheLookup, ResponseCache};

use models::{SummaryOptions, SummaryStyle};

use std::time::Duration;

use serde_json::json;
use tokio::time::advance;

fn key(name: &str) -> CacheKey {
    CacheKey::new("test", &json!({ "name": name })).unwrap()
}

/// **VALUE**: Basic set/get contract, including hit accounting.
///
/// **WHY THIS MATTERS**: The hit counter feeds `cache_stats()`, which is how callers
/// judge whether caching is working at all.
///
/// **BUG THIS CATCHES**: Would catch a hit path that forgets to bump the counter or
/// returns a stale clone.
#[tokio::test(start_paused = true)]
async fn given_stored_value_when_get_then_returns_it_and_counts_hit() {
    // GIVEN: A cache with one entry
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("a"), "summary".to_string(), None);

    // WHEN: Looking it up
    let lookup = cache.get(&key("a"));

    // THEN: Hit with the stored data, one hit counted
    assert_eq!(lookup, CacheLookup::Hit("summary".to_string()));
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hit_rate, 1.0);
}

#[tokio::test(start_paused = true)]
async fn given_empty_cache_when_get_then_miss_is_counted() {
    let mut cache: ResponseCache<String> = ResponseCache::new(Duration::from_secs(300), 100);

    assert_eq!(cache.get(&key("a")), CacheLookup::Miss);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hit_rate, 0.0);
}

/// **VALUE**: An expired entry is never served and is deleted on first access.
///
/// **WHY THIS MATTERS**: Serving a summary of an old version of the note is worse than
/// waiting for a fresh one.
///
/// **BUG THIS CATCHES**: Would catch an inclusive/exclusive mixup in the ttl check or
/// the expired entry being left behind.
#[tokio::test(start_paused = true)]
async fn given_expired_entry_when_get_then_reports_expired_counts_miss_and_deletes() {
    // GIVEN: An entry with a 1s ttl, and time moved past it
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("a"), 1u32, Some(Duration::from_secs(1)));
    advance(Duration::from_millis(1_001)).await;

    // WHEN: Looking it up
    let lookup = cache.get(&key("a"));

    // THEN: Expired, counted as a miss, and gone
    assert_eq!(lookup, CacheLookup::Expired);
    assert_eq!(cache.stats().misses, 1);
    assert!(cache.is_empty());
    assert_eq!(cache.get(&key("a")), CacheLookup::Miss);
}

#[tokio::test(start_paused = true)]
async fn given_entry_within_ttl_when_get_then_still_hit() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("a"), 1u32, None);
    advance(Duration::from_secs(299)).await;

    assert_eq!(cache.get(&key("a")), CacheLookup::Hit(1));
}

/// **VALUE**: `peek` reads fresh data without skewing the hit/miss counters.
///
/// **BUG THIS CATCHES**: Would catch the service's second look at the cache (taken
/// while joining in-flight calls) being counted as another miss, or returning
/// expired data.
#[tokio::test(start_paused = true)]
async fn given_fresh_and_expired_entries_when_peeking_then_only_fresh_returned_and_stats_untouched() {
    // GIVEN: One entry that will expire and one that will not
    let mut cache = ResponseCache::new(Duration::from_secs(60), 100);
    cache.set(key("short"), "old".to_string(), Some(Duration::from_secs(1)));
    cache.set(key("long"), "fresh".to_string(), None);
    advance(Duration::from_secs(2)).await;

    // WHEN: Peeking at both and at a missing key
    let short = cache.peek(&key("short"));
    let long = cache.peek(&key("long"));
    let missing = cache.peek(&key("missing"));

    // THEN: Only the fresh one is returned and nothing was counted or removed
    assert_eq!(short, None);
    assert_eq!(long.as_deref(), Some("fresh"));
    assert_eq!(missing, None);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.size), (0, 0, 2));
}

#[tokio::test(start_paused = true)]
async fn given_existing_key_when_set_again_then_value_is_overwritten() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("a"), 1u32, None);
    cache.set(key("a"), 2u32, None);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("a")), CacheLookup::Hit(2));
}

/// **VALUE**: Capacity eviction trims to exactly the cap and keeps the newest entries.
///
/// **WHY THIS MATTERS**: Without a cap a long editing session grows the cache without
/// bound; evicting the wrong end throws away the results most likely to be reused.
///
/// **BUG THIS CATCHES**: Would catch sorting newest-first, or off-by-one trimming.
#[tokio::test(start_paused = true)]
async fn given_more_entries_than_cap_when_evict_then_exactly_cap_remain_and_newest_kept() {
    // GIVEN: A cap of 3 and 5 entries stored one second apart
    let mut cache = ResponseCache::new(Duration::from_secs(300), 3);
    for n in 0..5 {
        cache.set(key(&n.to_string()), n, None);
        advance(Duration::from_secs(1)).await;
    }

    // WHEN: Evicting
    let removed = cache.evict();

    // THEN: The two oldest are gone
    assert_eq!(removed, 2);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(&key("0")), CacheLookup::Miss);
    assert_eq!(cache.get(&key("1")), CacheLookup::Miss);
    for n in 2..5 {
        assert_eq!(cache.get(&key(&n.to_string())), CacheLookup::Hit(n));
    }
}

#[tokio::test(start_paused = true)]
async fn given_entries_stored_at_same_instant_when_evict_then_insertion_order_breaks_tie() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 2);
    for n in 0..4 {
        cache.set(key(&n.to_string()), n, None);
    }

    cache.evict();

    assert_eq!(cache.get(&key("0")), CacheLookup::Miss);
    assert_eq!(cache.get(&key("1")), CacheLookup::Miss);
    assert_eq!(cache.get(&key("3")), CacheLookup::Hit(3));
}

#[tokio::test(start_paused = true)]
async fn given_expired_and_fresh_entries_when_evict_then_only_expired_removed() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("short"), 1u32, Some(Duration::from_secs(1)));
    cache.set(key("long"), 2u32, None);
    advance(Duration::from_secs(2)).await;

    assert_eq!(cache.evict(), 1);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&key("long")), CacheLookup::Hit(2));
}

#[tokio::test(start_paused = true)]
async fn given_populated_cache_when_clear_then_entries_and_counters_reset() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("a"), 1u32, None);
    cache.get(&key("a"));
    cache.get(&key("b"));

    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert!(stats.oldest_entry.is_none());
}

#[tokio::test(start_paused = true)]
async fn given_entries_over_time_when_stats_then_oldest_and_newest_are_reported() {
    let mut cache = ResponseCache::new(Duration::from_secs(300), 100);
    cache.set(key("first"), 1u32, None);
    let first_at = tokio::time::Instant::now();
    advance(Duration::from_secs(5)).await;
    cache.set(key("second"), 2u32, None);

    let stats = cache.stats();
    assert_eq!(stats.oldest_entry, Some(first_at));
    assert_eq!(stats.newest_entry, Some(first_at + Duration::from_secs(5)));
}

/// **VALUE**: Keys are deterministic and sensitive to every option.
///
/// **WHY THIS MATTERS**: A brief summary must never be served for a request that asked
/// for bullets, and identical calls must find each other's results.
///
/// **BUG THIS CATCHES**: Would catch a key built from content alone, or one that depends
/// on field declaration order.
#[test]
fn given_params_when_building_cache_key_then_deterministic_and_option_sensitive() {
    let brief = SummaryOptions::default();
    let bullets = SummaryOptions {
        style: SummaryStyle::Bullets,
        ..SummaryOptions::default()
    };

    let a = CacheKey::new("summary", &json!({ "content": "note", "options": brief })).unwrap();
    let b = CacheKey::new("summary", &json!({ "options": brief, "content": "note" })).unwrap();
    let c = CacheKey::new("summary", &json!({ "content": "note", "options": bullets })).unwrap();
    let d = CacheKey::new("flashcards", &json!({ "content": "note", "options": brief })).unwrap();

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert!(a.as_str().starts_with("summary:"));
}

#[test]
fn given_long_key_when_displayed_then_truncated_for_logs() {
    let long = "x".repeat(500);
    let key = CacheKey::new("summary", &json!({ "content": long })).unwrap();

    let shown = key.to_string();

    assert!(shown.chars().count() <= 65, "{shown}");
    assert!(shown.ends_with('…'));
}
