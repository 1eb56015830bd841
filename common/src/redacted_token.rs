//! Bearer token handling with redacted Debug output.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

const BEARER_PREFIX: &str = "Bearer ";

/// A credential that never exposes its value in logs or debug output.
///
/// The backing string is zeroized when the token is dropped.
#[derive(Clone)]
pub struct RedactedToken {
    inner: String,
}

impl RedactedToken {
    /// Wrap a raw token, trimming surrounding whitespace from files and env vars.
    pub fn new(token: impl Into<String>) -> Self {
        let mut raw: String = token.into();
        let trimmed = raw.trim().to_string();
        raw.zeroize();
        Self { inner: trimmed }
    }

    /// Get the actual token value for transmission.
    ///
    /// # Security Note
    /// Only call this when actually sending the token to the server.
    #[inline]
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// `Authorization` header value for this token.
    pub fn bearer_header(&self) -> String {
        format!("{BEARER_PREFIX}{}", self.inner)
    }

    /// Token length (safe to log).
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RedactedToken([REDACTED])")
    }
}

impl fmt::Display for RedactedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED TOKEN]")
    }
}

impl Drop for RedactedToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Serializing a secret is always a bug.
impl serde::Serialize for RedactedToken {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::SerializationRefused {
            type_name: "RedactedToken",
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
