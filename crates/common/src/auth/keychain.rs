//! Session storage helpers layered on top of any [`SecretStore`].
//!
//! # Module Layering
//!
//! - **`security::keychain`**: generic secret storage via the platform
//!   keychain
//! - **`auth::keychain`** (this module): session-specific helpers that
//!   serialize the credential triple and the profile snapshot as single
//!   JSON secrets
//!
//! This keeps the security module free of auth types.

use serde_json::Value;
use tracing::debug;

use crate::auth::store::keys;
use crate::auth::types::Credentials;
use crate::security::{KeychainError, SecretStore};

/// Credential and profile blobs on a secret store
///
/// Blanket-implemented for every [`SecretStore`], so both the platform
/// keychain and the mock pick it up.
pub trait SessionSecrets: SecretStore {
    /// Persist the credential triple as one secret.
    ///
    /// # Errors
    /// Returns `KeychainError` if serialization or the write fails.
    fn store_credentials(&self, credentials: &Credentials) -> Result<(), KeychainError> {
        debug!("Storing credentials in secure storage");
        let blob = serde_json::to_string(credentials)?;
        self.set_secret(keys::CREDENTIALS, &blob)
    }

    /// The credential triple, or `None` if no secret exists.
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the store cannot be read and
    /// `KeychainError::Serialization` if the secret is not a credential blob.
    fn retrieve_credentials(&self) -> Result<Option<Credentials>, KeychainError> {
        match self.get_secret(keys::CREDENTIALS) {
            Ok(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist the profile snapshot as one secret.
    ///
    /// # Errors
    /// Returns `KeychainError` if serialization or the write fails.
    fn store_profile(&self, profile: &Value) -> Result<(), KeychainError> {
        debug!("Storing profile in secure storage");
        let blob = serde_json::to_string(profile)?;
        self.set_secret(keys::USER_DATA, &blob)
    }

    /// The profile snapshot, or `None` if no secret exists.
    ///
    /// # Errors
    /// Returns `KeychainError` if the store cannot be read or the secret is
    /// not JSON.
    fn retrieve_profile(&self) -> Result<Option<Value>, KeychainError> {
        match self.get_secret(keys::USER_DATA) {
            Ok(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            Err(KeychainError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete both secrets. Missing secrets are not an error.
    ///
    /// # Errors
    /// Returns the first `KeychainError` encountered; the second delete is
    /// still attempted.
    fn delete_session(&self) -> Result<(), KeychainError> {
        let credentials = self.delete_secret(keys::CREDENTIALS);
        let profile = self.delete_secret(keys::USER_DATA);
        credentials.and(profile)
    }
}

impl<T: SecretStore + ?Sized> SessionSecrets for T {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::MockKeychainProvider;

    fn creds() -> Credentials {
        Credentials::new("T1", "R1", Some("Bearer".into())).unwrap()
    }

    #[test]
    fn test_credentials_round_trip_as_single_secret() {
        let keychain = MockKeychainProvider::new("SungaTest.session");
        keychain.store_credentials(&creds()).unwrap();

        assert_eq!(keychain.secret_count(), 1);
        assert_eq!(keychain.retrieve_credentials().unwrap(), Some(creds()));
    }

    #[test]
    fn test_missing_secrets_read_as_none() {
        let keychain = MockKeychainProvider::new("SungaTest.empty");
        assert_eq!(keychain.retrieve_credentials().unwrap(), None);
        assert_eq!(keychain.retrieve_profile().unwrap(), None);
    }

    #[test]
    fn test_garbage_secret_is_a_serialization_error() {
        let keychain = MockKeychainProvider::new("SungaTest.garbage");
        keychain.set_secret(keys::CREDENTIALS, "not-json").unwrap();
        assert!(matches!(keychain.retrieve_credentials(), Err(KeychainError::Serialization(_))));
    }

    #[test]
    fn test_delete_session_removes_both_secrets() {
        let keychain = MockKeychainProvider::new("SungaTest.delete");
        keychain.store_credentials(&creds()).unwrap();
        keychain.store_profile(&json!({"id": 1, "username": "u"})).unwrap();

        keychain.delete_session().unwrap();
        keychain.delete_session().unwrap();

        assert_eq!(keychain.secret_count(), 0);
    }
}
