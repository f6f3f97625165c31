//! # Error Handling
//!
//! Errors surfaced by single-entity lifecycle operations. Batch operations never
//! return these for per-item problems; they aggregate them into their result.

use crate::persistence::PersistenceError;

/// Errors returned by the schedule lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum PmScheduleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to {operation} PM schedule: {cause}")]
    TransactionFailure {
        operation: &'static str,
        #[source]
        cause: PersistenceError,
    },
}

impl PmScheduleError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Wrap a persistence failure with the operation it aborted.
    ///
    /// A missing row reported by the store is still a `NotFound` to the caller.
    pub fn transaction(operation: &'static str, cause: PersistenceError) -> Self {
        match cause {
            PersistenceError::RowNotFound { entity, id } => Self::NotFound { entity, id },
            cause => Self::TransactionFailure { operation, cause },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, PmScheduleError>;
