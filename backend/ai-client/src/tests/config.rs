use crate::config::AppConfig;
use crate::error::ConfigError;

use std::fs;

use tempfile::TempDir;

#[test]
fn given_missing_file_when_loading_then_defaults_are_returned() {
    let dir = TempDir::new().unwrap();

    let config = AppConfig::load(dir.path()).unwrap();

    assert_eq!(config, AppConfig::default());
    assert_eq!(config.retry.max_retries, 3);
    assert_eq!(config.cache.ttl_secs, 300);
    assert_eq!(config.cache.max_entries, 100);
    assert_eq!(config.rate_limit.min_interval_ms, 1_000);
    assert_eq!(config.analytics.batch_size, 10);
    assert_eq!(config.notifications.max_reconnect_attempts, 10);
}

/// **VALUE**: Saving then loading yields the same config.
///
/// **WHY THIS MATTERS**: A field that does not survive the round trip silently reverts
/// to its default on the next start.
///
/// **BUG THIS CATCHES**: Would catch serde renames or missing `default` attributes that
/// drop values on load.
#[test]
fn given_modified_config_when_saved_and_loaded_then_values_survive() {
    // GIVEN: A config with non-default values
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.server.base_url = "https://notes.example.com".to_string();
    config.retry.max_retries = 5;
    config.rate_limit.strict = true;
    config.analytics.enabled = false;

    // WHEN: Saving and loading again
    config.save(dir.path()).unwrap();
    let loaded = AppConfig::load(dir.path()).unwrap();

    // THEN: Identical, and no temp file left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join("config.json.tmp").exists());
}

#[test]
fn given_partial_file_when_loading_then_missing_fields_use_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.json"),
        r#"{ "retry": { "max_retries": 1 }, "cache": { "ttl_secs": 60 } }"#,
    )
    .unwrap();

    let config = AppConfig::load(dir.path()).unwrap();

    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.base_delay_ms, 1_000);
    assert_eq!(config.cache.ttl_secs, 60);
    assert_eq!(config.cache.max_entries, 100);
    assert_eq!(config.server, AppConfig::default().server);
}

#[test]
fn given_corrupt_file_when_loading_then_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.json"), "{ not json").unwrap();

    let result = AppConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

fn rejects(mutate: impl Fn(&mut AppConfig)) -> bool {
    let mut config = AppConfig::default();
    mutate(&mut config);
    matches!(config.validate(), Err(ConfigError::ValidationError { .. }))
}

#[test]
fn given_invalid_values_when_validating_then_each_is_rejected() {
    assert!(rejects(|c| c.version = 0), "version");
    assert!(rejects(|c| c.server.base_url = "ftp://x".into()), "base_url");
    assert!(
        rejects(|c| c.server.notifications_url = "http://x".into()),
        "notifications_url"
    );
    assert!(
        rejects(|c| {
            c.retry.base_delay_ms = 10_000;
            c.retry.max_delay_ms = 1_000;
        }),
        "delays"
    );
    assert!(rejects(|c| c.cache.max_entries = 0), "cache");
    assert!(rejects(|c| c.request.timeout_secs = 0), "timeout");
    assert!(rejects(|c| c.analytics.batch_size = 0), "batch");
    assert!(rejects(|c| c.analytics.flush_interval_secs = 0), "interval");
    assert!(!rejects(|_| {}), "defaults are valid");
}

#[test]
fn given_invalid_config_when_saving_then_nothing_is_written() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.request.timeout_secs = 0;

    assert!(config.save(dir.path()).is_err());
    assert!(!dir.path().join("config.json").exists());
}
