use crate::error::RequestError;

use std::fmt;

use serde::Serialize;

/// Canonical signature of a logical AI operation.
///
/// Built from the operation name and the JSON form of the full parameter set.
/// Object keys serialize in sorted order, so identical calls always produce the
/// same key and calls differing in any option never do.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new<P: Serialize>(operation: &str, params: &P) -> Result<Self, RequestError> {
        let value = serde_json::to_value(params)?;
        Ok(Self(format!("{operation}:{value}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys embed whole notes; keep log lines short.
        const PREVIEW_CHARS: usize = 64;
        match self.0.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => write!(f, "{}…", &self.0[..idx]),
            None => f.write_str(&self.0),
        }
    }
}
