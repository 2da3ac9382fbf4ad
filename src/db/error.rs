use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not configured")]
    NotConfigured,

    #[error("Timed out after {0:?} waiting for a connection")]
    Timeout(Duration),

    #[error("Validation error: {0}")]
    Validation(String),

    #[cfg(any(feature = "database-sqlite", feature = "database-postgres"))]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    /// A batched delete failed after earlier batches had already committed.
    #[error("{source} (after removing {removed} rows)")]
    PartialDelete { removed: u64, source: Box<DbError> },
}

impl DbError {
    /// Attach the rows a batched delete committed before this error.
    pub fn after_removing(self, removed: u64) -> Self {
        if removed == 0 {
            return self;
        }
        match self {
            DbError::PartialDelete {
                removed: earlier,
                source,
            } => DbError::PartialDelete {
                removed: earlier + removed,
                source,
            },
            other => DbError::PartialDelete {
                removed,
                source: Box::new(other),
            },
        }
    }

    /// Rows already removed when the operation failed.
    pub fn rows_removed(&self) -> u64 {
        match self {
            DbError::PartialDelete { removed, .. } => *removed,
            _ => 0,
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
