//! Engine error taxonomy.
//!
//! Grading and aggregation are pure, so every error here means either bad
//! input or a storage fault. Nothing is masked or retried.

use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum PlacementError {
    /// Malformed question payload, with field-level detail.
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] ValidationErrors),

    /// Request rejected by a session rule (foreign question, already answered, ...).
    #[error("{0}")]
    Validation(String),

    /// A concurrent or duplicate operation conflicts with existing state.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// The caller does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    /// The bank cannot produce a test of viable length.
    #[error("insufficient questions: {0}")]
    InsufficientQuestions(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

pub type PlacementResult<T> = Result<T, PlacementError>;

impl From<sqlx::Error> for PlacementError {
    fn from(err: sqlx::Error) -> Self {
        PlacementError::Storage(err.to_string())
    }
}
