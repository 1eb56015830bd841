//! Shared fixtures for notes-ai integration tests.

use ai_client::config::AppConfig;

use common::RedactedToken;

use notes_ai::state::AppState;

use std::io::Write;
use std::path::PathBuf;

use tempfile::TempDir;

pub const TEST_TOKEN: &str = "test-token-12345";

/// Config pointed at `base_url` with millisecond-scale delays and no pacing.
pub fn fast_config(base_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.base_url = base_url.to_string();
    config.retry.base_delay_ms = 10;
    config.retry.max_delay_ms = 50;
    config.rate_limit.min_interval_ms = 0;
    config.request.timeout_secs = 5;
    config.analytics.enabled = false;
    config.notifications.reconnect_base_ms = 10;
    config.notifications.reconnect_max_ms = 50;
    config
}

pub fn state_for(config: AppConfig) -> AppState {
    AppState::new(config, Some(RedactedToken::new(TEST_TOKEN))).expect("state should build")
}

/// Write `content` to a note file inside a fresh temp dir.
pub fn note_file(content: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("note.md");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    (dir, path)
}
