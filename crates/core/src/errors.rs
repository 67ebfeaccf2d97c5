//! Core error types for the dailybar pipeline.
//!
//! This module defines storage-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use chrono::NaiveDate;
use thiserror::Error;

use dailybar_feed::{FeedError, RetryClass};

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the pipeline.
///
/// Every stage failure bubbles up as one of these variants; the run
/// coordinator consults [`retry_class`](Self::retry_class) to decide between
/// another attempt and a terminal failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Feed fetch failed: {0}")]
    Feed(#[from] FeedError),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Stage '{stage}' timed out after {seconds}s")]
    StageTimeout { stage: String, seconds: u64 },

    #[error("Run cancelled before stage '{0}'")]
    Cancelled(String),

    #[error("A run for {0} is still in progress")]
    RunInProgress(NaiveDate),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Missing configuration key: {0}")]
    MissingConfigKey(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// Retry classification of this error.
    ///
    /// - Feed errors carry their own classification.
    /// - Store failures and stage timeouts are transient.
    /// - Transform validation, cancellation and configuration problems are terminal.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Feed(e) => e.retry_class(),
            Self::Database(_) | Self::StageTimeout { .. } => RetryClass::WithBackoff,
            Self::Transform(_)
            | Self::Cancelled(_)
            | Self::RunInProgress(_)
            | Self::InvalidConfigValue(_)
            | Self::MissingConfigKey(_)
            | Self::Unexpected(_) => RetryClass::Never,
        }
    }
}

/// Storage-agnostic error type for store operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert driver-specific errors into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Schema creation failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// A raw payload that cannot be mapped onto the fixed record schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Field '{field}' has an unusable value: {value}")]
    InvalidField { field: String, value: String },

    #[error("Field '{field}' is not a valid date: {value}")]
    InvalidDate { field: String, value: String },
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failures_are_retried() {
        let err = Error::Database(DatabaseError::ConnectionFailed("locked".into()));
        assert_eq!(err.retry_class(), RetryClass::WithBackoff);
    }

    #[test]
    fn test_transform_failures_are_terminal() {
        let err = Error::Transform(TransformError::InvalidField {
            field: "close".into(),
            value: "{}".into(),
        });
        assert_eq!(err.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_feed_errors_keep_their_class() {
        let transient = Error::Feed(FeedError::Timeout {
            provider: "POLYGON".into(),
        });
        assert_eq!(transient.retry_class(), RetryClass::WithBackoff);

        let permanent = Error::Feed(FeedError::SymbolNotFound("ZZZZ".into()));
        assert_eq!(permanent.retry_class(), RetryClass::Never);
    }

    #[test]
    fn test_timeouts_are_retried_and_cancellation_is_not() {
        let timeout = Error::StageTimeout {
            stage: "fetch".into(),
            seconds: 120,
        };
        assert_eq!(timeout.retry_class(), RetryClass::WithBackoff);
        assert_eq!(
            Error::Cancelled("load".into()).retry_class(),
            RetryClass::Never
        );
    }
}
