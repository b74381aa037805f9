//! Client configuration structures
//!
//! Every section has serde defaults so a partial TOML/JSON file (or an empty
//! one) still yields a usable configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_KEYCHAIN_SERVICE, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::errors::{Result, SungaError};

/// Top-level client configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
}

impl ClientConfig {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `SungaError::Config` when the base URL is empty or not
    /// http(s), or when the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let base_url = self.api.base_url.trim();
        if base_url.is_empty() {
            return Err(SungaError::Config("api.base_url must not be empty".into()));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SungaError::Config(format!(
                "api.base_url must use http or https: {base_url}"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(SungaError::Config("api.timeout_secs must be greater than zero".into()));
        }
        if self.storage.keychain_service.trim().is_empty() {
            return Err(SungaError::Config("storage.keychain_service must not be empty".into()));
        }
        Ok(())
    }
}

/// Remote API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: format!("sunga/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Where credentials live between runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// OS keychain, falling back to the session file when the keychain
    /// refuses a write.
    #[default]
    Keychain,
    /// Session file only.
    File,
}

impl std::str::FromStr for StorageBackend {
    type Err = SungaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "keychain" => Ok(Self::Keychain),
            "file" => Ok(Self::File),
            other => Err(SungaError::Config(format!("Unknown storage backend: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub keychain_service: String,
    /// Directory holding the session file. `None` uses the platform data
    /// directory chosen by the caller.
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            data_dir: None,
        }
    }
}

/// How `/login` expects its body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginEncoding {
    /// `application/x-www-form-urlencoded` with `username` and `password`.
    #[default]
    Form,
    /// JSON object with `email`, `username` and `password`.
    Json,
}

impl std::str::FromStr for LoginEncoding {
    type Err = SungaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "form" => Ok(Self::Form),
            "json" => Ok(Self::Json),
            other => Err(SungaError::Config(format!("Unknown login encoding: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub login_encoding: LoginEncoding,
}
