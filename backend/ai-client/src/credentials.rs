//! Bearer token lookup for the note backend.
//!
//! Lookup order:
//! 1. `NOTES_AI_TOKEN` environment variable (after loading `.env` if present)
//! 2. `{config_dir}/credentials.json` with `{ "token": "…" }`
//!
//! Tokens are wrapped in [`RedactedToken`] as soon as they are read and are
//! never logged; only their length is.

use crate::error::CredentialsError;

use common::{ErrorLocation, RedactedToken};

use std::env;
use std::fmt;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const TOKEN_ENV_VAR: &str = "NOTES_AI_TOKEN";
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    EnvVar,
    CredentialsFile,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::EnvVar => write!(f, "{TOKEN_ENV_VAR}"),
            TokenSource::CredentialsFile => write!(f, "{CREDENTIALS_FILE_NAME}"),
        }
    }
}

#[derive(Debug)]
pub struct LoadedToken {
    pub token: RedactedToken,
    pub source: TokenSource,
}

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    token: String,
}

#[derive(Serialize)]
struct CredentialsFileRef<'a> {
    token: &'a str,
}

/// Load `.env`, then resolve the token.
///
/// # Errors
///
/// Returns [`CredentialsError`] only when a credentials file exists but cannot
/// be read or parsed. No token at all is `Ok(None)`.
pub fn load_token(config_dir: &Path) -> Result<Option<LoadedToken>, CredentialsError> {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded .env from: {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to parse .env: {e}"),
    }

    resolve_token(config_dir)
}

/// Resolve the token from the environment and the credentials file, without
/// touching `.env`.
pub fn resolve_token(config_dir: &Path) -> Result<Option<LoadedToken>, CredentialsError> {
    match env::var(TOKEN_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => {
            let token = RedactedToken::new(value);
            info!("Using token from {TOKEN_ENV_VAR} ({} chars)", token.len());
            return Ok(Some(LoadedToken {
                token,
                source: TokenSource::EnvVar,
            }));
        }
        Ok(_) => debug!("{TOKEN_ENV_VAR} is set but empty"),
        Err(env::VarError::NotPresent) => debug!("{TOKEN_ENV_VAR} not set"),
        Err(env::VarError::NotUnicode(_)) => {
            warn!("{TOKEN_ENV_VAR} contains invalid unicode, ignoring");
        }
    }

    let path = credentials_path(config_dir);
    if !path.exists() {
        debug!("No credentials file at {}", path.display());
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path).map_err(|e| CredentialsError::Read {
        location: ErrorLocation::from(Location::caller()),
        path: path.clone(),
        source: e,
    })?;

    let file: CredentialsFile =
        serde_json::from_str(&contents).map_err(|e| CredentialsError::Parse {
            location: ErrorLocation::from(Location::caller()),
            path: path.clone(),
            reason: e.to_string(),
        })?;

    let token = RedactedToken::new(file.token);
    if token.is_empty() {
        warn!("Credentials file {} has an empty token", path.display());
        return Ok(None);
    }

    info!("Using token from {} ({} chars)", path.display(), token.len());
    Ok(Some(LoadedToken {
        token,
        source: TokenSource::CredentialsFile,
    }))
}

/// Write `{config_dir}/credentials.json` atomically (temp file + rename).
pub fn save_token(config_dir: &Path, token: &RedactedToken) -> Result<(), CredentialsError> {
    std::fs::create_dir_all(config_dir).map_err(|e| CredentialsError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: config_dir.to_path_buf(),
        source: e,
    })?;

    let path = credentials_path(config_dir);
    let temp_path = config_dir.join(format!("{CREDENTIALS_FILE_NAME}.tmp"));

    let json = serde_json::to_string_pretty(&CredentialsFileRef {
        token: token.expose(),
    })
    .map_err(|e| CredentialsError::Parse {
        location: ErrorLocation::from(Location::caller()),
        path: path.clone(),
        reason: e.to_string(),
    })?;

    std::fs::write(&temp_path, json).map_err(|e| CredentialsError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: temp_path.clone(),
        source: e,
    })?;

    std::fs::rename(&temp_path, &path).map_err(|e| CredentialsError::Write {
        location: ErrorLocation::from(Location::caller()),
        path: path.clone(),
        source: e,
    })?;

    info!("Credentials saved to {}", path.display());
    Ok(())
}

pub fn credentials_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CREDENTIALS_FILE_NAME)
}
