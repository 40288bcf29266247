//! Error taxonomy for the coaching engine
//!
//! Every public operation returns `Result<T, CoachError>`. Each variant is a
//! semantic kind; the transport layer maps kinds to status codes, the core
//! never does.

/// Errors produced by the coaching engine
#[derive(Debug, thiserror::Error)]
pub enum CoachError {
    /// Malformed or out-of-range input, rejected before any mutation
    #[error("validation failed: {0}")]
    Validation(String),

    /// Stale or duplicate mutation (out-of-order streak activity,
    /// explicit duplicate unlock)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced attempt, user, badge, or certificate does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// A badge requirement shape has no registered rule; deployment bug,
    /// never user-caused
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An XP debit would drive the balance below zero
    #[error("insufficient XP balance: have {balance}, debit of {requested} rejected")]
    InsufficientBalance { balance: i64, requested: i64 },

    /// The store or secret provider could not be reached; not retried here
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, CoachError>;

impl From<rusqlite::Error> for CoachError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound("no matching row".to_string()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoachError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unavailable(format!("stored payload corrupt: {err}"))
    }
}
