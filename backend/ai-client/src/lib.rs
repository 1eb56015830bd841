pub mod analytics;
pub mod api_client;
pub mod cache;
pub mod config;
pub mod credentials;
pub mod debounce;
pub mod error;
pub mod executor;
pub mod notifications;
pub mod retry;
pub mod service;

#[cfg(test)]
mod tests;

pub use service::{CallOptions, NoteAiService};

pub const DEFAULT_API_HOST: &str = "localhost:3001";
pub const DEFAULT_API_BASE_URL: &str = const_format::concatcp!("http://", DEFAULT_API_HOST);
pub const DEFAULT_NOTIFICATIONS_URL: &str =
    const_format::concatcp!("ws://", DEFAULT_API_HOST, "/notifications");

/// Longest note body the AI endpoints accept, in characters.
pub const MAX_CONTENT_CHARS: usize = 100_000;
