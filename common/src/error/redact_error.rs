use crate::ErrorLocation;

use thiserror::Error as ThisError;

/// Raised by the `Serialize` impls of secret wrappers.
#[derive(Debug, ThisError)]
pub enum RedactError {
    #[error("Refusing to serialize {type_name}; call expose() explicitly {location}")]
    SerializationRefused {
        type_name: &'static str,
        location: ErrorLocation,
    },
}
