//! # Store Error Types
//!
//! Error types for durable-store operations.
//!
//! `ConstraintViolation` is the one class allowed to abort an in-progress
//! operation outright: it means the write would corrupt invariants, so
//! nothing of it may be applied. Everything else is reported and recovered.

use thiserror::Error;

/// Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The write would corrupt invariants; it was aborted wholesale.
    ///
    /// Raised for UNIQUE/FOREIGN KEY violations and for saving a record
    /// whose `document_id` belongs to a different session without the
    /// resume flag.
    #[error("constraint violation: {message}")]
    ConstraintViolation { message: String },

    /// Database connection failed (file missing, permissions, disk full).
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Stored row could not be decoded back into a domain value
    /// (unknown status/kind key, corrupt payload).
    #[error("corrupt row for {entity} {id}: {reason}")]
    CorruptRow {
        entity: String,
        id: String,
        reason: String,
    },

    /// Domain-level failure bubbled up from meridian-core.
    #[error(transparent)]
    Core(#[from] meridian_core::CoreError),

    /// Internal store error.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a ConstraintViolation error.
    pub fn constraint(message: impl Into<String>) -> Self {
        StoreError::ConstraintViolation {
            message: message.into(),
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// SQLite reports constraint breaches in the database error message;
/// both UNIQUE and FOREIGN KEY failures map to `ConstraintViolation`
/// because either means the write must not be applied.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                entity: "record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                if msg.contains("UNIQUE constraint failed")
                    || msg.contains("FOREIGN KEY constraint failed")
                {
                    StoreError::ConstraintViolation { message: msg }
                } else {
                    StoreError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,

            sqlx::Error::PoolClosed => StoreError::ConnectionFailed("pool is closed".to_string()),

            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Internal(format!("payload serialization: {err}"))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
