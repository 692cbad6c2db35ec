//! Database error types.

use thiserror::Error;
use tutorly_common::{ApiError, TutorlyError};

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A stored value no longer parses into its Rust enum.
    #[error("Invalid stored value: {0}")]
    InvalidValue(#[from] TutorlyError),
}

impl DbError {
    /// Turn a unique-constraint violation into [`DbError::Duplicate`].
    pub(crate) fn unique(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DbError::Duplicate(what.to_string())
            }
            _ => DbError::Database(err),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            DbError::Duplicate(what) => ApiError::Conflict(format!("{what} already exists")),
            DbError::Validation(msg) => ApiError::BadRequest(msg),
            DbError::Database(e) => ApiError::Database(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
