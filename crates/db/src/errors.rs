//! Error types for the persistence layer.

use thiserror::Error;

/// Error type for the database.
#[derive(Debug, Error)]
pub enum DbError {
    /// Error originating from the backing store.
    #[error("storage: {0}")]
    Storage(String),
}

/// Wrapper type for database results.
pub type DbResult<T> = Result<T, DbError>;
