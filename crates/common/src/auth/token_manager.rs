//! Token manager with single-flight refresh
//!
//! Owns the session's credential lifecycle:
//! - Reading the current credentials for the `Authorization` header
//! - Recovering from a rejected access token by refreshing exactly once
//! - Ending the session (clear + broadcast) when recovery is impossible
//!
//! # Refresh coordination
//!
//! Every recovery runs under one async mutex. A caller that waited for the
//! lock first re-reads the store: if the access token no longer matches the
//! one its request was rejected with, a concurrent caller already rotated
//! it and the new credentials are returned without another network call.
//! If the store is empty but the caller had sent a token, a concurrent
//! recovery already failed and announced the expiry, so the caller fails
//! quietly instead of broadcasting a second time.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

use super::events::{self, AuthEvent};
use super::traits::{AuthEndpoint, AuthEndpointError, CredentialStore};
use super::types::{Credentials, CredentialsError};
use crate::storage::StorageError;

/// Error type for token manager operations
#[derive(Debug)]
pub enum TokenManagerError {
    /// Credential store operation failed
    Storage(StorageError),

    /// No refresh token stored; the session has been ended
    NoRefreshToken,

    /// The server refused or failed the refresh; the session has been ended
    RefreshFailed(AuthEndpointError),

    /// The refresh response could not form valid credentials; the session
    /// has been ended
    InvalidTokens(CredentialsError),

    /// A concurrent refresh already failed and ended the session
    SessionEnded,
}

impl std::fmt::Display for TokenManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "Credential storage error: {e}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::RefreshFailed(e) => write!(f, "Token refresh failed: {e}"),
            Self::InvalidTokens(e) => write!(f, "Token refresh returned invalid tokens: {e}"),
            Self::SessionEnded => write!(f, "Session ended by a concurrent refresh failure"),
        }
    }
}

impl std::error::Error for TokenManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::RefreshFailed(e) => Some(e),
            Self::InvalidTokens(e) => Some(e),
            Self::NoRefreshToken | Self::SessionEnded => None,
        }
    }
}

impl TokenManagerError {
    /// Whether the error means the user must sign in again.
    pub fn is_session_loss(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

impl From<StorageError> for TokenManagerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

/// Credential lifecycle shared by every request of one client
pub struct TokenManager<E: AuthEndpoint + 'static, S: CredentialStore + 'static> {
    endpoint: Arc<E>,
    store: Arc<S>,
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

impl<E: AuthEndpoint + 'static, S: CredentialStore + 'static> TokenManager<E, S> {
    /// Create a new token manager
    ///
    /// # Arguments
    /// * `endpoint` - Server-side refresh call
    /// * `store` - Where credentials and the profile snapshot persist
    #[must_use]
    pub fn new(endpoint: Arc<E>, store: Arc<S>) -> Self {
        Self { endpoint, store, refresh_lock: Mutex::new(()), events: events::channel() }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn endpoint(&self) -> &Arc<E> {
        &self.endpoint
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Current credentials, if signed in.
    ///
    /// # Errors
    /// Returns `TokenManagerError::Storage` if the store cannot be read.
    pub async fn current_credentials(&self) -> Result<Option<Credentials>, TokenManagerError> {
        Ok(self.store.load_credentials().await?)
    }

    /// `Authorization` header value for the current credentials.
    ///
    /// Pure read: two calls without an intervening refresh return the same
    /// value.
    ///
    /// # Errors
    /// Returns `TokenManagerError::Storage` if the store cannot be read.
    pub async fn authorization_header(&self) -> Result<Option<String>, TokenManagerError> {
        Ok(self.current_credentials().await?.map(|c| c.authorization_header()))
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.current_credentials().await, Ok(Some(_)))
    }

    /// Persist credentials and the profile fetched with them, then broadcast
    /// `SignedIn` once both are stored.
    ///
    /// # Errors
    /// Returns `TokenManagerError::Storage` if either write fails. A failed
    /// profile write leaves the credentials stored.
    pub async fn sign_in(
        &self,
        credentials: &Credentials,
        profile: &serde_json::Value,
    ) -> Result<(), TokenManagerError> {
        let _guard = self.refresh_lock.lock().await;
        self.store.save_credentials(credentials).await?;
        self.store.save_profile(profile).await?;
        info!("Signed in");
        self.emit(AuthEvent::SignedIn);
        Ok(())
    }

    /// Recover from a 401.
    ///
    /// `rejected_access_token` is the access token the failed request was
    /// sent with (`None` if it was sent without credentials).
    ///
    /// # Errors
    /// - `NoRefreshToken`, `RefreshFailed`, `InvalidTokens`: the store was
    ///   cleared and `SessionExpired` broadcast exactly once.
    /// - `SessionEnded`: a concurrent recovery already did the above.
    /// - `Storage`: the store could not be read or the rotated tokens could
    ///   not be written.
    pub async fn recover_from_unauthorized(
        &self,
        rejected_access_token: Option<&str>,
    ) -> Result<Credentials, TokenManagerError> {
        let _guard = self.refresh_lock.lock().await;

        match self.store.load_credentials().await? {
            Some(current) if rejected_access_token != Some(current.access_token.as_str()) => {
                debug!("Access token changed while waiting; reusing rotated credentials");
                Ok(current)
            }
            Some(current) => self.refresh_locked(&current).await,
            None if rejected_access_token.is_some() => {
                debug!("Credentials already cleared by a concurrent refresh");
                Err(TokenManagerError::SessionEnded)
            }
            None => {
                warn!("Request rejected and no refresh token is stored");
                self.end_session_locked("no refresh token available").await;
                Err(TokenManagerError::NoRefreshToken)
            }
        }
    }

    /// Rotate the access token now, regardless of whether it was rejected.
    ///
    /// # Errors
    /// Same as [`Self::recover_from_unauthorized`], minus `SessionEnded`.
    pub async fn refresh_tokens(&self) -> Result<Credentials, TokenManagerError> {
        let _guard = self.refresh_lock.lock().await;

        match self.store.load_credentials().await? {
            Some(current) => self.refresh_locked(&current).await,
            None => {
                self.end_session_locked("no refresh token available").await;
                Err(TokenManagerError::NoRefreshToken)
            }
        }
    }

    /// Clear local credentials after a user-initiated logout and broadcast
    /// `SignedOut`.
    ///
    /// # Errors
    /// Returns `TokenManagerError::Storage` if a tier could not be cleared.
    /// `SignedOut` is broadcast either way.
    pub async fn sign_out(&self) -> Result<(), TokenManagerError> {
        let _guard = self.refresh_lock.lock().await;
        let cleared = self.store.clear().await;
        info!("Signed out");
        self.emit(AuthEvent::SignedOut);
        cleared.map_err(TokenManagerError::from)
    }

    async fn refresh_locked(&self, current: &Credentials) -> Result<Credentials, TokenManagerError> {
        debug!("Refreshing access token");

        let response = match self.endpoint.refresh(&current.refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.end_session_locked(&e.to_string()).await;
                return Err(TokenManagerError::RefreshFailed(e));
            }
        };

        let rotated = match current.rotate(response) {
            Ok(rotated) => rotated,
            Err(e) => {
                warn!(error = %e, "Token refresh returned unusable tokens");
                self.end_session_locked(&e.to_string()).await;
                return Err(TokenManagerError::InvalidTokens(e));
            }
        };

        if let Err(e) = self.store.save_credentials(&rotated).await {
            error!(error = %e, "Failed to persist refreshed tokens");
            return Err(e.into());
        }

        info!(
            refresh_rotated = rotated.refresh_token != current.refresh_token,
            "Access token refreshed"
        );
        self.emit(AuthEvent::TokensRefreshed);
        Ok(rotated)
    }

    async fn end_session_locked(&self, reason: &str) {
        if let Err(e) = self.store.clear().await {
            error!(error = %e, "Failed to clear credentials while ending session");
        }
        info!(%reason, "Session expired");
        self.emit(AuthEvent::SessionExpired { reason: reason.to_string() });
    }

    fn emit(&self, event: AuthEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
