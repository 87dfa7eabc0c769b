//! Error types for protocol-state storage operations.
//!
//! A missing record is never an error: lookups return `Option`, and
//! `destroy`/`consume`/`revoke_by_grant` treat an absent target as a
//! successful no-op so retried cleanup stays idempotent.

use std::fmt;

/// Errors that can occur during protocol-state storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage engine is unreachable or an I/O operation
    /// failed. Safe to retry.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// A stored document could not be serialized or deserialized.
    ///
    /// Scan operations (`find_by_field`, `revoke_by_grant`) skip malformed
    /// records instead of surfacing this variant, so one corrupt artifact
    /// never blocks access to unrelated live artifacts.
    #[error("Malformed document: {message}")]
    MalformedDocument {
        /// Description of why the document is malformed.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `MalformedDocument` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: message.into(),
        }
    }

    /// Returns `true` if this is an `Unavailable` error.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns `true` if this is a `MalformedDocument` error.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedDocument { .. })
    }

    /// Returns `true` if the failed operation can be retried safely.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Unavailable { .. } => ErrorCategory::Infrastructure,
            Self::MalformedDocument { .. } => ErrorCategory::Data,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Infrastructure/connection error.
    Infrastructure,
    /// Corrupt or unreadable stored data.
    Data,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Storage unavailable: connection refused");

        let err = StoreError::malformed("not a JSON object");
        assert_eq!(err.to_string(), "Malformed document: not a JSON object");
    }

    #[test]
    fn test_error_predicates() {
        let err = StoreError::unavailable("timeout");
        assert!(err.is_unavailable());
        assert!(err.is_retryable());
        assert!(!err.is_malformed());

        let err = StoreError::malformed("truncated");
        assert!(err.is_malformed());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StoreError::unavailable("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(StoreError::malformed("x").category(), ErrorCategory::Data);
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
        assert_eq!(ErrorCategory::Data.to_string(), "data");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = StoreError::from(json_err);
        assert!(err.is_malformed());
    }
}
