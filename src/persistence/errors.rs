use thiserror::Error;

/// Errors raised by persistence adapters
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("{entity} not found: {id}")]
    RowNotFound { entity: &'static str, id: i64 },

    #[error("Injected failure: {0}")]
    Injected(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl From<sqlx::Error> for PersistenceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
