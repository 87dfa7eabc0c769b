//! Error types for the PostgreSQL storage backend.

use opengate_storage::StoreError;

/// Errors specific to the PostgreSQL storage backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => StoreError::unavailable(e.to_string()),
            PostgresError::Migration(e) => {
                StoreError::unavailable(format!("Migration error: {e}"))
            }
            PostgresError::Config { message } => {
                StoreError::unavailable(format!("Configuration error: {message}"))
            }
        }
    }
}

/// Maps a sqlx error onto the storage contract's error taxonomy.
///
/// Every engine-level failure is retryable unavailability from the
/// caller's perspective; the contract has no partial-state errors.
pub(crate) fn store_error(err: sqlx_core::Error) -> StoreError {
    StoreError::unavailable(err.to_string())
}

/// Result type alias for PostgreSQL operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid URL");
        assert!(err.to_string().contains("Configuration error"));

        let err = PostgresError::Migration("bad checksum".into());
        assert!(err.to_string().contains("Migration error"));
    }

    #[test]
    fn test_conversion_to_store_error() {
        let pg_err = PostgresError::config("test error");
        let err: StoreError = pg_err.into();
        assert!(err.is_unavailable());
        assert!(err.is_retryable());
    }
}
