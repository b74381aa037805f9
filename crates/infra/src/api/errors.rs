//! API-specific error types
//!
//! Every failure surfaced by the API client lands in one of three buckets the
//! caller can act on:
//! - [`ApiError::Network`]: nothing came back (DNS, refused connection,
//!   timeout)
//! - [`ApiError::Http`]: the server answered with a non-2xx status
//! - [`ApiError::Auth`]: the session could not be recovered and the user has
//!   to sign in again
//!
//! The remaining variants cover local problems (configuration, undecodable
//! responses, credential storage).

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;
use sunga_common::auth::TokenManagerError;
use sunga_common::{ErrorClassification, ErrorSeverity};
use sunga_domain::SungaError;
use thiserror::Error;

/// Message shown when the session cannot be recovered.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Categories of API errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCategory {
    /// Session lost; sign in again
    Authentication,
    /// 4xx other than a recoverable 401
    Client,
    /// 5xx
    Server,
    /// No response received
    Network,
    /// Local misconfiguration or unusable response
    Config,
    /// Credential storage failed
    Storage,
}

/// API operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, body: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Build an `Http` error from a non-2xx response.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        Self::Http {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
            message: extract_message(status, body),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::Network(format!("request timed out after {}s", after.as_secs_f32()))
    }

    /// Get the error category for this error
    pub fn category(&self) -> ApiErrorCategory {
        match self {
            Self::Network(_) => ApiErrorCategory::Network,
            Self::Http { status, .. } if *status >= 500 => ApiErrorCategory::Server,
            Self::Http { .. } => ApiErrorCategory::Client,
            Self::Auth(_) => ApiErrorCategory::Authentication,
            Self::Config(_) | Self::Decode(_) => ApiErrorCategory::Config,
            Self::Storage(_) => ApiErrorCategory::Storage,
        }
    }

    /// HTTP status for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable message, without the variant prefix.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Http { message, .. } => message,
            Self::Network(m)
            | Self::Auth(m)
            | Self::Config(m)
            | Self::Decode(m)
            | Self::Storage(m) => m,
        }
    }

    /// Whether the user has to sign in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Pull a readable message out of an error body.
///
/// Tries, in order: `detail` as a string, `detail` as a list of validation
/// entries (their `msg` fields joined), `message`, the raw body, and finally
/// the status reason phrase.
pub fn extract_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        match map.get("detail") {
            Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return messages.join("; ");
                }
            }
            _ => {}
        }
        if let Some(Value::String(message)) = map.get("message") {
            if !message.is_empty() {
                return message.clone();
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return text.to_string();
    }

    status
        .canonical_reason()
        .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_string)
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        match self.category() {
            ApiErrorCategory::Network | ApiErrorCategory::Server => true,
            ApiErrorCategory::Client => self.status() == Some(429),
            ApiErrorCategory::Authentication
            | ApiErrorCategory::Config
            | ApiErrorCategory::Storage => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ApiErrorCategory::Client | ApiErrorCategory::Authentication => ErrorSeverity::Warning,
            ApiErrorCategory::Network | ApiErrorCategory::Server => ErrorSeverity::Error,
            ApiErrorCategory::Config | ApiErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl From<TokenManagerError> for ApiError {
    fn from(err: TokenManagerError) -> Self {
        match err {
            TokenManagerError::Storage(e) => Self::Storage(e.to_string()),
            other => {
                tracing::debug!(reason = %other, "session could not be recovered");
                Self::Auth(SESSION_EXPIRED_MESSAGE.to_string())
            }
        }
    }
}

impl From<SungaError> for ApiError {
    fn from(err: SungaError) -> Self {
        match err {
            SungaError::Config(m) | SungaError::InvalidInput(m) => Self::Config(m),
            SungaError::Network(m) => Self::Network(m),
            SungaError::Auth(m) => Self::Auth(m),
            SungaError::Storage(m) => Self::Storage(m),
            SungaError::NotFound(m) | SungaError::Internal(m) => Self::Decode(m),
        }
    }
}
