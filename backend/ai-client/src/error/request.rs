//! Error type for a single AI API call.
//!
//! Key design decisions:
//! - Closed set of variants produced at the HTTP boundary; nothing downstream
//!   inspects raw reqwest errors or response shapes
//! - HTTP status codes stored directly (not parsed from strings)
//! - `is_retryable()` uses the variant and status code, never message content
//! - All errors include ErrorLocation for debugging
//! - `Clone` so one failure can be handed to every caller sharing a coalesced request

use common::{ErrorLocation, HttpStatusCode};

use std::fmt;
use std::panic::Location;
use std::time::Duration;

use thiserror::Error as ThisError;

/// Why a call stopped before the backend answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The caller's cancellation token fired.
    Cancelled,
    /// The per-call timeout elapsed.
    Timeout,
    /// A newer debounced call with the same key replaced this one.
    Superseded,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => write!(f, "cancelled by caller"),
            AbortReason::Timeout => write!(f, "timed out"),
            AbortReason::Superseded => write!(f, "superseded by a newer request"),
        }
    }
}

#[derive(Debug, Clone, ThisError)]
pub enum RequestError {
    #[error("Validation Error: {message} {location}")]
    Validation {
        message: String,
        location: ErrorLocation,
    },

    #[error("Network Error: {message} {location}")]
    Network {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("Rate Limited: retry after {retry_after:?} {location}")]
    RateLimited {
        retry_after: Option<Duration>,
        location: ErrorLocation,
    },

    #[error("Server Error: HTTP {status} - {message} {location}")]
    Server {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Client Error: HTTP {status} - {message} {location}")]
    Client {
        status: HttpStatusCode,
        message: String,
        location: ErrorLocation,
    },

    #[error("Request Aborted: {reason} {location}")]
    Aborted {
        reason: AbortReason,
        location: ErrorLocation,
    },

    #[error("Decode Error: {message} {location}")]
    Decode {
        message: String,
        location: ErrorLocation,
    },
}

impl RequestError {
    #[track_caller]
    pub fn validation(message: impl Into<String>) -> Self {
        RequestError::Validation {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn aborted(reason: AbortReason) -> Self {
        RequestError::Aborted {
            reason,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        RequestError::RateLimited {
            retry_after,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn network(message: impl Into<String>) -> Self {
        RequestError::Network {
            message: message.into(),
            is_timeout: false,
            is_connection: false,
            location: ErrorLocation::from(Location::caller()),
        }
    }

    #[track_caller]
    pub fn decode(message: impl Into<String>) -> Self {
        RequestError::Decode {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Classify a non-success HTTP response.
    ///
    /// `retry_after` is only meaningful for 429 and is ignored otherwise.
    #[track_caller]
    pub fn from_status(
        status_code: u16,
        body: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let status = HttpStatusCode(status_code);
        let location = ErrorLocation::from(Location::caller());

        if status.is_rate_limited() {
            return RequestError::RateLimited {
                retry_after,
                location,
            };
        }

        if status.is_server_error() {
            return RequestError::Server {
                status,
                message: body.into(),
                location,
            };
        }

        RequestError::Client {
            status,
            message: body.into(),
            location,
        }
    }

    /// Create from reqwest error with proper categorization.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        // Check for specific error types BEFORE converting to string
        if error.is_decode() {
            return RequestError::Decode {
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            };
        }

        if let Some(status) = error.status() {
            return Self::from_status(status.as_u16(), error.to_string(), None);
        }

        RequestError::Network {
            message: error.to_string(),
            is_timeout: error.is_timeout(),
            is_connection: error.is_connect(),
            location: ErrorLocation::from(Location::caller()),
        }
    }

    /// Whether another attempt could succeed, judged by category only.
    ///
    /// Attempt budgets and backoff are the retry policy's concern.
    pub fn is_retryable(&self) -> bool {
        match self {
            // No response at all: the request may never have reached the server
            RequestError::Network { .. } => true,
            RequestError::RateLimited { .. } => true,
            RequestError::Server { status, .. } => status.is_retryable(),

            RequestError::Validation { .. } => false,
            RequestError::Client { .. } => false,
            RequestError::Aborted { .. } => false,
            RequestError::Decode { .. } => false,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, RequestError::Aborted { .. })
    }

    /// Get error category for analytics.
    pub fn error_category(&self) -> &'static str {
        match self {
            RequestError::Validation { .. } => "validation",
            RequestError::Network { is_timeout: true, .. } => "timeout",
            RequestError::Network {
                is_connection: true,
                ..
            } => "connection",
            RequestError::Network { .. } => "network",
            RequestError::RateLimited { .. } => "rate_limited",
            RequestError::Server { .. } => "server_error",
            RequestError::Client { .. } => "client_error",
            RequestError::Aborted { .. } => "aborted",
            RequestError::Decode { .. } => "decode",
        }
    }

    /// Get HTTP status code if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::Server { status, .. } | RequestError::Client { status, .. } => {
                Some(status.0)
            }
            RequestError::RateLimited { .. } => Some(HttpStatusCode::TOO_MANY_REQUESTS.0),
            _ => None,
        }
    }

    /// Server-requested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RequestError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for RequestError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        RequestError::Decode {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<url::ParseError> for RequestError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        RequestError::Validation {
            message: format!("Invalid URL: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
