//! Mock implementations of the platform traits
//!
//! Provides mock objects for testing purposes.

// Mocks are deliberately simple; lock poisoning only happens after a test
// already panicked.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{AuthEndpoint, AuthEndpointError, CredentialStore, Credentials, TokenResponse};
use crate::security::{KeychainError, SecretStore};
use crate::storage::{StorageError, StorageResult};

type StorageData = Arc<Mutex<HashMap<String, String>>>;
type RefreshResult = Result<TokenResponse, AuthEndpointError>;

/// Mock keychain provider for testing
///
/// Mirrors `KeychainProvider` without touching the OS keychain. Clones share
/// storage.
#[derive(Debug, Clone)]
pub struct MockKeychainProvider {
    service_name: String,
    storage: StorageData,
    unavailable: Arc<AtomicBool>,
}

impl MockKeychainProvider {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            storage: Arc::new(Mutex::new(HashMap::new())),
            unavailable: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Make every operation fail with `KeychainError::AccessFailed`, the way
    /// a locked keyring or a missing Secret Service daemon does.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn secret_count(&self) -> usize {
        self.storage.lock().unwrap().len()
    }

    fn check_available(&self) -> Result<(), KeychainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(KeychainError::AccessFailed("mock keychain unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl SecretStore for MockKeychainProvider {
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        self.check_available()?;
        self.storage.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_secret(&self, key: &str) -> Result<String, KeychainError> {
        self.check_available()?;
        self.storage.lock().unwrap().get(key).cloned().ok_or(KeychainError::NotFound)
    }

    fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        self.check_available()?;
        self.storage.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Mock `/refresh` endpoint
///
/// Returns queued results first, then the default result forever.
#[derive(Debug)]
pub struct MockAuthEndpoint {
    default_result: RefreshResult,
    queued: Mutex<VecDeque<RefreshResult>>,
    calls: AtomicUsize,
    received: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl MockAuthEndpoint {
    fn with_default(default_result: RefreshResult) -> Self {
        Self {
            default_result,
            queued: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Always issue `access_token` (and `refresh_token` if given).
    pub fn succeeding(access_token: &str, refresh_token: Option<&str>) -> Self {
        Self::with_default(Ok(TokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.map(str::to_string),
            token_type: None,
        }))
    }

    /// Always fail with `error`.
    pub fn failing(error: AuthEndpointError) -> Self {
        Self::with_default(Err(error))
    }

    /// Sleep before answering, to widen race windows in concurrency tests.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer the next call with `result` instead of the default.
    pub fn enqueue(&self, result: RefreshResult) {
        self.queued.lock().unwrap().push_back(result);
    }

    pub fn refresh_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received_refresh_tokens(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthEndpoint for MockAuthEndpoint {
    async fn refresh(&self, refresh_token: &str) -> RefreshResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(refresh_token.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.queued.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.default_result.clone())
    }
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: Mutex<Option<Credentials>>,
    profile: Mutex<Option<Value>>,
    remember_me: AtomicBool,
    fail_writes: AtomicBool,
    clears: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        let store = Self::default();
        *store.credentials.lock().unwrap() = Some(credentials);
        store
    }

    /// Make `save_*` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn profile(&self) -> Option<Value> {
        self.profile.lock().unwrap().clone()
    }

    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(StorageError::Io(std::io::Error::other("mock store rejects writes")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_credentials(&self) -> StorageResult<Option<Credentials>> {
        Ok(self.credentials())
    }

    async fn save_credentials(&self, credentials: &Credentials) -> StorageResult<()> {
        self.check_writable()?;
        *self.credentials.lock().unwrap() = Some(credentials.clone());
        Ok(())
    }

    async fn load_profile(&self) -> StorageResult<Option<Value>> {
        Ok(self.profile())
    }

    async fn save_profile(&self, profile: &Value) -> StorageResult<()> {
        self.check_writable()?;
        *self.profile.lock().unwrap() = Some(profile.clone());
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        *self.credentials.lock().unwrap() = None;
        *self.profile.lock().unwrap() = None;
        Ok(())
    }

    async fn set_remember_me(&self, remember: bool) -> StorageResult<()> {
        self.remember_me.store(remember, Ordering::SeqCst);
        Ok(())
    }

    async fn remember_me(&self) -> StorageResult<bool> {
        Ok(self.remember_me.load(Ordering::SeqCst))
    }
}
