//! Error types for the simfleet-db crate.
//!
//! Wraps `SQLx` errors with enough context to tell a connection problem from
//! a bad query or a record that no longer satisfies the device invariants.

use thiserror::Error;

/// Device store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// The provider reported a different ICCID for a known subscription.
    #[error("ICCID mismatch for {subscription_id}: stored {stored}, provider reports {reported}")]
    IccidMismatch {
        subscription_id: String,
        stored: String,
        reported: String,
    },

    /// A write was rejected before reaching the database.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// A stored row could not be mapped to a valid device record.
    #[error("Invalid device record {subscription_id}: {message}")]
    InvalidRecord {
        subscription_id: String,
        message: String,
    },
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// Check if this error indicates a query problem.
    #[must_use]
    pub fn is_query_error(&self) -> bool {
        matches!(self, DbError::QueryFailed(_))
    }

    /// Check if a write was refused because it would change an immutable column.
    #[must_use]
    pub fn is_iccid_mismatch(&self) -> bool {
        matches!(self, DbError::IccidMismatch { .. })
    }

    /// Check if this error indicates a validation error.
    #[must_use]
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, DbError::ValidationFailed(_))
    }

    /// Stable error code for logs and CLI output.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            DbError::ConnectionFailed(_) => "DB_CONNECTION_FAILED",
            DbError::MigrationFailed(_) => "DB_MIGRATION_FAILED",
            DbError::QueryFailed(_) => "DB_QUERY_FAILED",
            DbError::IccidMismatch { .. } => "DB_ICCID_MISMATCH",
            DbError::ValidationFailed(_) => "DB_VALIDATION_FAILED",
            DbError::InvalidRecord { .. } => "DB_INVALID_RECORD",
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::ConnectionFailed(err)
            }
            other => DbError::QueryFailed(other),
        }
    }
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;
