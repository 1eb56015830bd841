//! Shared primitives for the note AI client.
//!
//! Nothing here knows about notes or AI endpoints; these are the small types
//! every other crate reports errors and credentials with.
//!
//! ## Architecture
//!
//! - **common** (this crate): error locations, status codes, secrets
//! - **models**: pure request/response data
//! - **ai-client**: resiliency layer and HTTP client operating on models
//! - **notes-ai**: application wiring everything together

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
