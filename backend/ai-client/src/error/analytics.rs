use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

/// Failure to deliver an analytics batch.
///
/// Never surfaces to callers of the AI operations; the queue logs it and requeues.
#[derive(Debug, ThisError)]
pub enum AnalyticsError {
    #[error("Analytics HTTP Error: {message} {location}")]
    Http {
        message: String,
        location: ErrorLocation,
    },

    #[error("Analytics Rejected: {message} {location}")]
    Rejected {
        message: String,
        location: ErrorLocation,
    },
}

impl AnalyticsError {
    #[track_caller]
    pub fn rejected(message: impl Into<String>) -> Self {
        AnalyticsError::Rejected {
            message: message.into(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<reqwest::Error> for AnalyticsError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        AnalyticsError::Http {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<url::ParseError> for AnalyticsError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        AnalyticsError::Http {
            message: format!("Invalid analytics URL: {error}"),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
