use thiserror::Error;

/// Unified error type for storage operations that application code can handle
#[derive(Error, Debug)]
pub enum DbError {
    /// Item not found by the given identifier
    #[error("Entity not found")]
    NotFound,

    /// An item with the same id or lookup key already exists
    #[error("Unique constraint violation on {kind} ({key})")]
    UniqueViolation { kind: String, key: String },

    /// Stored body could not be (de)serialized into the typed record
    #[error("Item serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convert from sqlx::Error using proper sqlx error categorization
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbError::UniqueViolation {
                kind: db_err.table().unwrap_or("items").to_string(),
                key: db_err.constraint().unwrap_or("unknown").to_string(),
            },
            // All other sqlx errors are non-recoverable - convert to anyhow with context
            _ => DbError::Other(anyhow::Error::from(err)),
        }
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;
