//! Typed error hierarchy for the floor monitor.
//!
//! `FloorError` covers the failures that callers have to tell apart: a
//! repository refusing an update, a missing record, a rejected request,
//! and authentication problems. Everything else travels as `anyhow::Error`.

use thiserror::Error;

/// Errors from the floor services, repositories and request validation.
#[derive(Debug, Error)]
pub enum FloorError {
    #[error("Failed to update {what}")]
    UpdateFailed { what: String },

    #[error("No {model} found for id {id}")]
    ModelNotFound { model: &'static str, id: i64 },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("This action is unauthorized")]
    Forbidden,

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FloorError {
    pub fn update_failed(what: impl Into<String>) -> Self {
        Self::UpdateFailed { what: what.into() }
    }

    pub fn not_found(model: &'static str, id: i64) -> Self {
        Self::ModelNotFound { model, id }
    }
}

impl From<rusqlite::Error> for FloorError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into())
    }
}

pub type FloorResult<T> = std::result::Result<T, FloorError>;
