//! Storage error types

use std::time::Duration;

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};
use crate::security::KeychainError;

/// Storage error type
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

/// Storage result type
pub type StorageResult<T> = Result<T, StorageError>;

impl From<KeychainError> for StorageError {
    fn from(err: KeychainError) -> Self {
        match err {
            KeychainError::Serialization(e) => Self::SerdeJson(e),
            other => Self::Keychain(other.to_string()),
        }
    }
}

impl ErrorClassification for StorageError {
    /// Keychain access can fail transiently (locked keyring, user prompt
    /// dismissed); everything else is persistent.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Keychain(_))
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Keychain(_) => ErrorSeverity::Warning,
            Self::Corrupt(_) => ErrorSeverity::Error,
            Self::InvalidCredentials(_) => ErrorSeverity::Error,
            Self::Io(_) => ErrorSeverity::Error,
            Self::SerdeJson(_) => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
