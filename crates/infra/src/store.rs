//! Credential store selected by configuration

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sunga_common::auth::{CredentialStore, Credentials, FileCredentialStore, TieredCredentialStore};
use sunga_common::storage::StorageResult;
use sunga_domain::constants::FALLBACK_STORE_FILE;
use sunga_domain::{StorageBackend, StorageConfig};
use tracing::debug;

use crate::config::default_data_dir;

/// The store behind a configured session
///
/// `Keychain` keeps tokens in the OS keychain and falls back to the session
/// file when the keychain refuses a write; `File` only uses the session file.
#[derive(Debug)]
pub enum SessionStore {
    Keychain(TieredCredentialStore),
    File(FileCredentialStore),
}

impl SessionStore {
    pub fn from_config(config: &StorageConfig) -> Self {
        let path = session_file_path(config);
        debug!(backend = ?config.backend, path = %path.display(), "Opening session store");
        match config.backend {
            StorageBackend::Keychain => {
                Self::Keychain(TieredCredentialStore::with_keychain(&config.keychain_service, path))
            }
            StorageBackend::File => Self::File(FileCredentialStore::new(path)),
        }
    }

    fn inner(&self) -> &dyn CredentialStore {
        match self {
            Self::Keychain(store) => store,
            Self::File(store) => store,
        }
    }
}

/// Location of the session file: `<data_dir>/session.json`.
pub fn session_file_path(config: &StorageConfig) -> PathBuf {
    config.data_dir.clone().unwrap_or_else(default_data_dir).join(FALLBACK_STORE_FILE)
}

#[async_trait]
impl CredentialStore for SessionStore {
    async fn load_credentials(&self) -> StorageResult<Option<Credentials>> {
        self.inner().load_credentials().await
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StorageResult<()> {
        self.inner().save_credentials(credentials).await
    }

    async fn load_profile(&self) -> StorageResult<Option<Value>> {
        self.inner().load_profile().await
    }

    async fn save_profile(&self, profile: &Value) -> StorageResult<()> {
        self.inner().save_profile(profile).await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.inner().clear().await
    }

    async fn set_remember_me(&self, remember: bool) -> StorageResult<()> {
        self.inner().set_remember_me(remember).await
    }

    async fn remember_me(&self) -> StorageResult<bool> {
        self.inner().remember_me().await
    }
}
