//! Error types for the calendar core.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised by the grouping engine and the focus navigator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("invalid event '{title}': {reason}")]
    InvalidEvent { title: String, reason: String },

    #[error("no grid container registered; call register_container before navigating")]
    MissingContainer,

    #[error("no rendered cell for {0}")]
    NoMatchingCell(NaiveDate),

    #[error("unknown calendar view: {0}")]
    InvalidView(String),
}

impl CalendarError {
    pub(crate) fn invalid_event(title: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            title: title.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for calendar core operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
