pub mod analytics;
pub mod config;
pub mod credentials;
pub mod notifications;
pub mod request;

pub use analytics::AnalyticsError;
pub use config::ConfigError;
pub use credentials::CredentialsError;
pub use notifications::NotificationError;
pub use request::{AbortReason, RequestError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credentials(#[from] CredentialsError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}
