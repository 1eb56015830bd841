use ai_client::error::{
    AbortReason, ConfigError, CoreError, CredentialsError, NotificationError, RequestError,
};

use common::ErrorLocation;

use std::panic::Location;

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the `notes-ai` binary.
///
/// Library errors are flattened to their message at this boundary so the CLI can
/// print them as JSON; the location records where the conversion happened.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum AppError {
    /// Error from this App
    #[error("App Error: {message} {location}")]
    App {
        message: String,
        location: ErrorLocation,
    },

    /// Error from ai-client operations (requests, config, credentials, notifications)
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },

    /// The request was cancelled (Ctrl-C) or superseded; timeouts are `Core`
    #[error("Cancelled: {message} {location}")]
    Cancelled {
        message: String,
        location: ErrorLocation,
    },

    /// A note file could not be read
    #[error("Input Error: {message} {location}")]
    Input {
        message: String,
        location: ErrorLocation,
    },
}

impl From<CoreError> for AppError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        let location = ErrorLocation::from(Location::caller());
        match error {
            CoreError::Request(
                e @ RequestError::Aborted {
                    reason: AbortReason::Cancelled | AbortReason::Superseded,
                    ..
                },
            ) => AppError::Cancelled {
                message: e.to_string(),
                location,
            },
            other => AppError::Core {
                message: other.to_string(),
                location,
            },
        }
    }
}

impl From<RequestError> for AppError {
    #[track_caller]
    fn from(error: RequestError) -> Self {
        AppError::from(CoreError::from(error))
    }
}

impl From<ConfigError> for AppError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        AppError::from(CoreError::from(error))
    }
}

impl From<CredentialsError> for AppError {
    #[track_caller]
    fn from(error: CredentialsError) -> Self {
        AppError::from(CoreError::from(error))
    }
}

impl From<NotificationError> for AppError {
    #[track_caller]
    fn from(error: NotificationError) -> Self {
        AppError::from(CoreError::from(error))
    }
}
