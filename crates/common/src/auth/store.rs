//! Credential store implementations
//!
//! - [`TieredCredentialStore`]: secure store first, session file when the
//!   secure store refuses a write. A flag in the session file records
//!   which tier holds each blob so reads look there first. When the secure
//!   store refuses a delete, the flag is set to `cleared` so the copy left
//!   behind is never read back.
//! - [`FileCredentialStore`]: session file only.
//!
//! Both write the credential triple as one JSON value, so a reader sees
//! either the old triple or the new one.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::keychain::SessionSecrets;
use super::traits::CredentialStore;
use super::types::Credentials;
use crate::security::{KeychainError, KeychainProvider, SecretStore};
use crate::storage::{FileKeyValueStore, StorageError, StorageResult};

/// Storage keys shared by every tier
pub mod keys {
    pub const CREDENTIALS: &str = "auth_tokens";
    pub const USER_DATA: &str = "user_data";
    pub const TOKENS_IN_KEYCHAIN: &str = "tokens_in_keychain";
    pub const USER_DATA_IN_KEYCHAIN: &str = "user_data_in_keychain";
    pub const REMEMBER_ME: &str = "remember_me";
}

const TRUE: &str = "true";
const FALSE: &str = "false";
const CLEARED: &str = "cleared";

/// Which tier currently holds a blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageTier {
    Secure,
    Fallback,
    /// Signed out while the secure store refused the delete. Neither tier
    /// holds a live blob until the next write.
    Cleared,
}

/// Secure store with a plain-file fallback
#[derive(Debug)]
pub struct TieredCredentialStore<K: SecretStore = KeychainProvider> {
    secure: K,
    fallback: FileKeyValueStore,
}

impl TieredCredentialStore<KeychainProvider> {
    /// Platform keychain under `service_name`, falling back to
    /// `fallback_path`.
    pub fn with_keychain(service_name: impl Into<String>, fallback_path: impl Into<PathBuf>) -> Self {
        Self::new(KeychainProvider::new(service_name), FileKeyValueStore::new(fallback_path))
    }
}

impl<K: SecretStore> TieredCredentialStore<K> {
    pub fn new(secure: K, fallback: FileKeyValueStore) -> Self {
        Self { secure, fallback }
    }

    pub fn secure(&self) -> &K {
        &self.secure
    }

    pub fn fallback(&self) -> &FileKeyValueStore {
        &self.fallback
    }

    /// Tier recorded for the credential blob. A missing flag means the
    /// secure tier, which is where the first write always goes.
    ///
    /// # Errors
    /// Returns `StorageError` if the session file cannot be read.
    pub fn credentials_tier(&self) -> StorageResult<StorageTier> {
        self.tier(keys::TOKENS_IN_KEYCHAIN)
    }

    fn tier(&self, flag: &str) -> StorageResult<StorageTier> {
        Ok(match self.fallback.get(flag)?.as_deref() {
            Some(FALSE) => StorageTier::Fallback,
            Some(CLEARED) => StorageTier::Cleared,
            _ => StorageTier::Secure,
        })
    }

    /// Read a blob, trying the flagged tier first and the other second.
    ///
    /// A secure store that cannot be reached is an error, not an absent
    /// blob. A secret that does not parse reads as absent.
    fn load_blob<T: DeserializeOwned>(
        &self,
        flag: &str,
        blob_key: &str,
        read_secure: impl Fn(&K) -> Result<Option<T>, KeychainError>,
    ) -> StorageResult<Option<T>> {
        let read_fallback = || read_json::<T>(&self.fallback, blob_key);
        let secure_blob = || match read_secure(&self.secure) {
            Ok(value) => Ok(value),
            Err(KeychainError::Serialization(e)) => {
                warn!(key = %blob_key, error = %e, "Ignoring unreadable secret");
                Ok(None)
            }
            Err(e) => Err(StorageError::Keychain(e.to_string())),
        };

        match self.tier(flag)? {
            StorageTier::Secure => match secure_blob()? {
                Some(value) => Ok(Some(value)),
                None => read_fallback(),
            },
            StorageTier::Fallback => match read_fallback()? {
                Some(value) => Ok(Some(value)),
                None => secure_blob(),
            },
            StorageTier::Cleared => {
                debug!(key = %blob_key, "Session cleared; ignoring secure copy");
                Ok(None)
            }
        }
    }

    /// Write a blob to the secure tier, or to the session file if the
    /// secure tier refuses it, then record the tier.
    fn save_blob(
        &self,
        flag: &str,
        blob_key: &str,
        blob: &str,
        write_secure: impl Fn(&K) -> Result<(), KeychainError>,
    ) -> StorageResult<StorageTier> {
        match write_secure(&self.secure) {
            Ok(()) => {
                self.fallback.replace(&[(flag, TRUE)], &[blob_key])?;
                debug!(key = %blob_key, "Stored in secure tier");
                Ok(StorageTier::Secure)
            }
            Err(e) => {
                warn!(key = %blob_key, error = %e, "Secure storage unavailable, using fallback");
                self.fallback.replace(&[(blob_key, blob), (flag, FALSE)], &[])?;
                Ok(StorageTier::Fallback)
            }
        }
    }
}

#[async_trait]
impl<K: SecretStore> CredentialStore for TieredCredentialStore<K> {
    async fn load_credentials(&self) -> StorageResult<Option<Credentials>> {
        let credentials = self.load_blob(keys::TOKENS_IN_KEYCHAIN, keys::CREDENTIALS, |secure| {
            secure.retrieve_credentials()
        })?;
        Ok(credentials.and_then(valid))
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StorageResult<()> {
        let blob = serde_json::to_string(credentials)?;
        self.save_blob(keys::TOKENS_IN_KEYCHAIN, keys::CREDENTIALS, &blob, |secure| {
            secure.store_credentials(credentials)
        })?;
        Ok(())
    }

    async fn load_profile(&self) -> StorageResult<Option<Value>> {
        self.load_blob(keys::USER_DATA_IN_KEYCHAIN, keys::USER_DATA, |secure| secure.retrieve_profile())
    }

    async fn save_profile(&self, profile: &Value) -> StorageResult<()> {
        let blob = serde_json::to_string(profile)?;
        self.save_blob(keys::USER_DATA_IN_KEYCHAIN, keys::USER_DATA, &blob, |secure| {
            secure.store_profile(profile)
        })?;
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        match self.secure.delete_session() {
            Ok(()) => self.fallback.remove_many(&[
                keys::CREDENTIALS,
                keys::USER_DATA,
                keys::TOKENS_IN_KEYCHAIN,
                keys::USER_DATA_IN_KEYCHAIN,
            ]),
            Err(e) => {
                warn!(error = %e, "Could not clear secure storage, marking session cleared");
                self.fallback.replace(
                    &[(keys::TOKENS_IN_KEYCHAIN, CLEARED), (keys::USER_DATA_IN_KEYCHAIN, CLEARED)],
                    &[keys::CREDENTIALS, keys::USER_DATA],
                )
            }
        }
    }

    async fn set_remember_me(&self, remember: bool) -> StorageResult<()> {
        write_remember_me(&self.fallback, remember)
    }

    async fn remember_me(&self) -> StorageResult<bool> {
        read_remember_me(&self.fallback)
    }
}

/// Session file only
#[derive(Debug)]
pub struct FileCredentialStore {
    kv: FileKeyValueStore,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { kv: FileKeyValueStore::new(path) }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_credentials(&self) -> StorageResult<Option<Credentials>> {
        Ok(read_json::<Credentials>(&self.kv, keys::CREDENTIALS)?.and_then(valid))
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StorageResult<()> {
        let blob = serde_json::to_string(credentials)?;
        self.kv.set(keys::CREDENTIALS, &blob)
    }

    async fn load_profile(&self) -> StorageResult<Option<Value>> {
        read_json(&self.kv, keys::USER_DATA)
    }

    async fn save_profile(&self, profile: &Value) -> StorageResult<()> {
        let blob = serde_json::to_string(profile)?;
        self.kv.set(keys::USER_DATA, &blob)
    }

    async fn clear(&self) -> StorageResult<()> {
        self.kv.remove_many(&[keys::CREDENTIALS, keys::USER_DATA])
    }

    async fn set_remember_me(&self, remember: bool) -> StorageResult<()> {
        write_remember_me(&self.kv, remember)
    }

    async fn remember_me(&self) -> StorageResult<bool> {
        read_remember_me(&self.kv)
    }
}

/// Parse a JSON blob from the session file. An unparsable blob is logged
/// and treated as absent so a damaged file signs the user out instead of
/// wedging every request.
fn read_json<T: DeserializeOwned>(kv: &FileKeyValueStore, key: &str) -> StorageResult<Option<T>> {
    let Some(raw) = kv.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(key = %key, error = %e, "Ignoring unreadable stored value");
            Ok(None)
        }
    }
}

fn valid(credentials: Credentials) -> Option<Credentials> {
    match credentials.validate() {
        Ok(()) => Some(credentials),
        Err(e) => {
            warn!(error = %e, "Ignoring incomplete stored credentials");
            None
        }
    }
}

fn write_remember_me(kv: &FileKeyValueStore, remember: bool) -> StorageResult<()> {
    kv.set(keys::REMEMBER_ME, if remember { TRUE } else { FALSE })
}

fn read_remember_me(kv: &FileKeyValueStore) -> StorageResult<bool> {
    Ok(kv.get(keys::REMEMBER_ME)?.as_deref() == Some(TRUE))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::testing::MockKeychainProvider;

    fn creds(access: &str) -> Credentials {
        Credentials::new(access, "R1", None).unwrap()
    }

    fn tiered() -> (TempDir, TieredCredentialStore<MockKeychainProvider>) {
        let dir = tempdir().unwrap();
        let store = TieredCredentialStore::new(
            MockKeychainProvider::new("SungaTest.tiered"),
            FileKeyValueStore::new(dir.path().join("session.json")),
        );
        (dir, store)
    }

    /// Validates `TieredCredentialStore::save_credentials` behavior for the
    /// available keychain scenario.
    ///
    /// Assertions:
    /// - Confirms the blob lands in the secure tier and the flag says so.
    /// - Ensures the session file holds no copy of the tokens.
    #[tokio::test]
    async fn test_prefers_secure_tier() {
        let (_dir, store) = tiered();
        store.save_credentials(&creds("T1")).await.unwrap();

        assert_eq!(store.credentials_tier().unwrap(), StorageTier::Secure);
        assert_eq!(store.fallback().get(keys::CREDENTIALS).unwrap(), None);
        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T1")));
    }

    /// Validates `TieredCredentialStore::save_credentials` behavior for the
    /// unavailable keychain scenario.
    ///
    /// Assertions:
    /// - Confirms the flag records the fallback tier.
    /// - Confirms reads still return the credentials after the keychain
    ///   recovers but holds nothing.
    #[tokio::test]
    async fn test_falls_back_when_keychain_refuses_write() {
        let (_dir, store) = tiered();
        store.secure().set_unavailable(true);

        store.save_credentials(&creds("T1")).await.unwrap();
        assert_eq!(store.credentials_tier().unwrap(), StorageTier::Fallback);

        store.secure().set_unavailable(false);
        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T1")));
    }

    #[tokio::test]
    async fn test_fallback_flag_wins_over_stale_keychain_copy() {
        let (_dir, store) = tiered();
        store.save_credentials(&creds("T1")).await.unwrap();

        store.secure().set_unavailable(true);
        store.save_credentials(&creds("T2")).await.unwrap();
        store.secure().set_unavailable(false);

        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T2")));
    }

    #[tokio::test]
    async fn test_returning_to_secure_tier_drops_fallback_copy() {
        let (_dir, store) = tiered();
        store.secure().set_unavailable(true);
        store.save_credentials(&creds("T1")).await.unwrap();
        store.secure().set_unavailable(false);

        store.save_credentials(&creds("T2")).await.unwrap();

        assert_eq!(store.credentials_tier().unwrap(), StorageTier::Secure);
        assert_eq!(store.fallback().get(keys::CREDENTIALS).unwrap(), None);
        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T2")));
    }

    #[tokio::test]
    async fn test_clear_empties_both_tiers_but_keeps_remember_me() {
        let (_dir, store) = tiered();
        store.set_remember_me(true).await.unwrap();
        store.save_credentials(&creds("T1")).await.unwrap();
        store.save_profile(&json!({"id": 1})).await.unwrap();
        store.secure().set_unavailable(true);
        store.save_profile(&json!({"id": 2})).await.unwrap();
        store.secure().set_unavailable(false);

        store.clear().await.unwrap();

        assert_eq!(store.load_credentials().await.unwrap(), None);
        assert_eq!(store.load_profile().await.unwrap(), None);
        assert_eq!(store.secure().secret_count(), 0);
        assert!(store.remember_me().await.unwrap());
    }

    /// Validates `TieredCredentialStore::clear` behavior for the locked
    /// keychain scenario.
    ///
    /// Assertions:
    /// - Confirms the stale secrets are not read back once the keychain
    ///   unlocks.
    /// - Confirms the next write replaces the cleared marker.
    #[tokio::test]
    async fn test_clear_with_locked_keychain_hides_stale_secrets() {
        let (_dir, store) = tiered();
        store.save_credentials(&creds("T1")).await.unwrap();
        store.save_profile(&json!({"id": 1})).await.unwrap();

        store.secure().set_unavailable(true);
        store.clear().await.unwrap();
        store.secure().set_unavailable(false);

        assert_eq!(store.secure().secret_count(), 2);
        assert_eq!(store.credentials_tier().unwrap(), StorageTier::Cleared);
        assert_eq!(store.load_credentials().await.unwrap(), None);
        assert_eq!(store.load_profile().await.unwrap(), None);

        store.save_credentials(&creds("T2")).await.unwrap();
        assert_eq!(store.credentials_tier().unwrap(), StorageTier::Secure);
        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T2")));
        assert_eq!(store.load_profile().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_locked_keychain_read_is_an_error() {
        let (_dir, store) = tiered();
        store.save_credentials(&creds("T1")).await.unwrap();

        store.secure().set_unavailable(true);
        assert!(matches!(store.load_credentials().await, Err(StorageError::Keychain(_))));
        assert!(matches!(store.load_profile().await, Err(StorageError::Keychain(_))));

        store.secure().set_unavailable(false);
        assert_eq!(store.load_credentials().await.unwrap(), Some(creds("T1")));
    }

    #[tokio::test]
    async fn test_unparsable_secret_reads_as_absent() {
        let (_dir, store) = tiered();
        store.secure().set_secret(keys::CREDENTIALS, "{not json").unwrap();

        assert_eq!(store.load_credentials().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incomplete_blob_reads_as_signed_out() {
        let (_dir, store) = tiered();
        store
            .fallback()
            .set_many(&[
                (keys::CREDENTIALS, r#"{"access_token":"T1","refresh_token":""}"#),
                (keys::TOKENS_IN_KEYCHAIN, "false"),
            ])
            .unwrap();

        assert_eq!(store.load_credentials().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("web.json"));

        assert_eq!(store.load_credentials().await.unwrap(), None);
        assert!(!store.remember_me().await.unwrap());

        store.save_credentials(&creds("T1")).await.unwrap();
        store.save_profile(&json!({"id": 9, "username": "w"})).await.unwrap();

        let reopened = FileCredentialStore::new(dir.path().join("web.json"));
        assert_eq!(reopened.load_credentials().await.unwrap(), Some(creds("T1")));
        assert_eq!(reopened.load_profile().await.unwrap(), Some(json!({"id": 9, "username": "w"})));

        reopened.clear().await.unwrap();
        assert_eq!(store.load_credentials().await.unwrap(), None);
    }
}
