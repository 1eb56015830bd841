use common::ErrorLocation;

use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum NotificationError {
    #[error("Notification URL Error: {message} {location}")]
    Url {
        message: String,
        location: ErrorLocation,
    },

    #[error("Notification Reconnect Exhausted after {attempts} attempts {location}")]
    ReconnectExhausted {
        attempts: u32,
        location: ErrorLocation,
    },
}

impl From<url::ParseError> for NotificationError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        NotificationError::Url {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
