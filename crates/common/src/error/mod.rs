//! Error classification shared by every Sunga error type
//!
//! Each crate keeps its own `thiserror` enum. What they share is a common
//! vocabulary for deciding what to do with a failure:
//!
//! 1. **`ErrorClassification` trait**: retryability, severity, criticality
//! 2. **`ErrorSeverity` enum**: one severity scale for logging decisions
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum UploadError {
//!     #[error("file too large: {0} bytes")]
//!     TooLarge(u64),
//!     #[error(transparent)]
//!     Storage(#[from] StorageError),
//! }
//!
//! impl ErrorClassification for UploadError {
//!     fn is_retryable(&self) -> bool {
//!         match self {
//!             Self::TooLarge(_) => false,
//!             Self::Storage(e) => e.is_retryable(),
//!         }
//!     }
//!     // ...
//! }
//! ```

use std::fmt;
use std::time::Duration;

/// Standard interface for classifying errors by their characteristics
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient: the same call may succeed if the
    /// caller tries again later (network drop, timeout, 5xx, locked store).
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    ///
    /// Used for logging decisions.
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// Returns `Some(Duration)` when the failure carries a specific delay
    /// (e.g. a `Retry-After` header), `None` otherwise.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_from_info_to_critical() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
