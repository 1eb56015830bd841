use crate::credentials::{TOKEN_ENV_VAR, TokenSource, resolve_token, save_token};
use crate::error::CredentialsError;

use common::RedactedToken;

use std::fs;

use serial_test::serial;
use tempfile::TempDir;

// Env var mutation is process-wide, hence #[serial] on every test here.

struct EnvGuard;

impl EnvGuard {
    fn set(value: &str) -> Self {
        unsafe { std::env::set_var(TOKEN_ENV_VAR, value) };
        EnvGuard
    }

    fn clear() -> Self {
        unsafe { std::env::remove_var(TOKEN_ENV_VAR) };
        EnvGuard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        unsafe { std::env::remove_var(TOKEN_ENV_VAR) };
    }
}

#[test]
#[serial]
fn given_env_var_and_file_when_resolving_then_env_var_wins() {
    let _env = EnvGuard::set("  env-token  ");
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("credentials.json"), r#"{ "token": "file-token" }"#).unwrap();

    let loaded = resolve_token(dir.path()).unwrap().unwrap();

    assert_eq!(loaded.source, TokenSource::EnvVar);
    assert_eq!(loaded.token.expose(), "env-token");
}

#[test]
#[serial]
fn given_only_credentials_file_when_resolving_then_file_token_is_used() {
    let _env = EnvGuard::clear();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("credentials.json"), r#"{ "token": "file-token" }"#).unwrap();

    let loaded = resolve_token(dir.path()).unwrap().unwrap();

    assert_eq!(loaded.source, TokenSource::CredentialsFile);
    assert_eq!(loaded.token.expose(), "file-token");
}

#[test]
#[serial]
fn given_blank_env_var_and_no_file_when_resolving_then_no_token() {
    let _env = EnvGuard::set("   ");
    let dir = TempDir::new().unwrap();

    assert!(resolve_token(dir.path()).unwrap().is_none());
}

#[test]
#[serial]
fn given_corrupt_credentials_file_when_resolving_then_parse_error() {
    let _env = EnvGuard::clear();
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("credentials.json"), "token=abc").unwrap();

    let result = resolve_token(dir.path());

    assert!(matches!(result, Err(CredentialsError::Parse { .. })));
}

#[test]
#[serial]
fn given_saved_token_when_resolving_then_round_trips_without_leaking_into_debug() {
    let _env = EnvGuard::clear();
    let dir = TempDir::new().unwrap();

    save_token(dir.path(), &RedactedToken::new("secret-value")).unwrap();
    let loaded = resolve_token(dir.path()).unwrap().unwrap();

    assert_eq!(loaded.token.expose(), "secret-value");
    assert!(!format!("{loaded:?}").contains("secret-value"));
}
