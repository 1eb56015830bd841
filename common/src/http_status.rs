//! HTTP status code classification used by the retry policy.

/// HTTP status code for error categorization.
///
/// Stored directly rather than parsed from error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    pub const TOO_MANY_REQUESTS: HttpStatusCode = HttpStatusCode(429);

    /// 4xx client errors.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    /// 5xx server errors.
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }

    /// 429, the only 4xx the client waits out and retries.
    pub fn is_rate_limited(&self) -> bool {
        *self == Self::TOO_MANY_REQUESTS
    }

    /// Rate limiting and every 5xx are transient; other 4xx never are.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limited() || self.is_server_error()
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
