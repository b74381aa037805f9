//! Trait seams for the token manager
//!
//! [`CredentialStore`] abstracts where credentials live (keychain with
//! file fallback, plain file, memory). [`AuthEndpoint`] abstracts the
//! server's `/refresh` call so refresh coordination can be tested without
//! HTTP.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::types::{Credentials, TokenResponse};
use crate::storage::StorageResult;

/// Persistent home for the credential triple and the cached profile
///
/// `load_credentials` must return either the complete previous triple or
/// the complete new one, never a mix; implementations achieve this by
/// writing the triple as one blob.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credentials, or `None` when signed out.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load_credentials(&self) -> StorageResult<Option<Credentials>>;

    /// Replace the stored credentials.
    ///
    /// # Errors
    /// Returns `StorageError` if no tier accepted the write.
    async fn save_credentials(&self, credentials: &Credentials) -> StorageResult<()>;

    /// Cached profile snapshot, exactly as the server last returned it.
    ///
    /// # Errors
    /// Returns `StorageError` if the backing store cannot be read.
    async fn load_profile(&self) -> StorageResult<Option<Value>>;

    /// Replace the cached profile snapshot.
    ///
    /// # Errors
    /// Returns `StorageError` if no tier accepted the write.
    async fn save_profile(&self, profile: &Value) -> StorageResult<()>;

    /// Remove credentials and profile from every tier.
    ///
    /// # Errors
    /// Returns `StorageError` if a tier could not be cleared.
    async fn clear(&self) -> StorageResult<()>;

    /// Persist the "remember me" preference. Stores without a place for it
    /// accept and drop the value.
    ///
    /// # Errors
    /// Returns `StorageError` if the preference cannot be written.
    async fn set_remember_me(&self, _remember: bool) -> StorageResult<()> {
        Ok(())
    }

    /// The "remember me" preference; `false` when never set.
    ///
    /// # Errors
    /// Returns `StorageError` if the preference cannot be read.
    async fn remember_me(&self) -> StorageResult<bool> {
        Ok(false)
    }
}

/// Failure talking to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthEndpointError {
    /// No response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("Refresh rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The server answered 2xx with an unusable body.
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
}

/// Server-side token rotation
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    /// Exchange `refresh_token` for a new access token.
    ///
    /// # Errors
    /// Returns `AuthEndpointError` if the request fails or is rejected.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthEndpointError>;
}
