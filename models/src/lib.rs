//! Domain models for the note AI client.
//!
//! Pure data structures exchanged with the AI backend, the analytics endpoint and
//! the notifications socket. Models have no business logic; the resiliency layer
//! in `ai-client` operates on them.

pub mod ai;
pub mod analytics;
pub mod notification;

pub use ai::{AiSummary, Difficulty, Flashcard, SummaryOptions, SummaryStyle, TagSuggestion};
pub use analytics::{AnalyticsEvent, AnalyticsEventType, unix_millis_now};
pub use notification::{Notification, NotificationKind};

#[cfg(test)]
mod tests;
