//! Configuration loader
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory is applied to the process
//!    environment (existing variables win)
//! 2. The base configuration comes from a file: the path passed in, else
//!    `SUNGA_CONFIG`, else the first probed location; with no file the
//!    built-in defaults are used
//! 3. Environment variables override individual fields
//! 4. The result is validated
//!
//! ## Environment Variables
//! - `SUNGA_CONFIG`: Config file path
//! - `SUNGA_API_URL`: API base URL
//! - `SUNGA_API_TIMEOUT_SECS`: Request timeout in seconds
//! - `SUNGA_STORAGE_BACKEND`: `keychain` or `file`
//! - `SUNGA_KEYCHAIN_SERVICE`: Keychain service name
//! - `SUNGA_DATA_DIR`: Directory for the session file
//! - `SUNGA_LOGIN_ENCODING`: `form` or `json`
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./sunga.toml`
//! 2. `./config/sunga.toml`
//! 3. `./sunga.json`
//! 4. `sunga.toml` next to the executable

use std::path::{Path, PathBuf};

use sunga_domain::{ClientConfig, Result, SungaError};

pub const CONFIG_PATH_VAR: &str = "SUNGA_CONFIG";
pub const API_URL_VAR: &str = "SUNGA_API_URL";
pub const API_TIMEOUT_VAR: &str = "SUNGA_API_TIMEOUT_SECS";
pub const STORAGE_BACKEND_VAR: &str = "SUNGA_STORAGE_BACKEND";
pub const KEYCHAIN_SERVICE_VAR: &str = "SUNGA_KEYCHAIN_SERVICE";
pub const DATA_DIR_VAR: &str = "SUNGA_DATA_DIR";
pub const LOGIN_ENCODING_VAR: &str = "SUNGA_LOGIN_ENCODING";

/// Load configuration using the full strategy described in the module docs.
///
/// # Errors
/// Returns `SungaError::Config` if the config file is unreadable or
/// invalid, an environment variable has an invalid value, or validation
/// fails.
pub fn load() -> Result<ClientConfig> {
    load_with(None)
}

/// Like [`load`], with an explicit config file taking precedence over
/// `SUNGA_CONFIG` and the probed locations.
///
/// # Errors
/// Same as [`load`]; additionally fails if `path` does not exist.
pub fn load_with(path: Option<PathBuf>) -> Result<ClientConfig> {
    if let Ok(dotenv) = dotenvy::dotenv() {
        tracing::debug!(path = %dotenv.display(), "Applied .env file");
    }

    let path = path.or_else(|| env_opt(CONFIG_PATH_VAR).map(PathBuf::from));
    let mut config = match path.or_else(probe_config_paths) {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, starting from defaults");
            ClientConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    tracing::info!(base_url = %config.api.base_url, backend = ?config.storage.backend, "Configuration loaded");
    Ok(config)
}

/// Defaults overridden by environment variables only.
///
/// # Errors
/// Returns `SungaError::Config` if a variable has an invalid value or
/// validation fails.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Supports TOML and
/// JSON (detected by file extension). Missing fields take their defaults.
///
/// # Errors
/// Returns `SungaError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(SungaError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            SungaError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| SungaError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content, by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SungaError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SungaError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(SungaError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([
            cwd.join("sunga.toml"),
            cwd.join("config").join("sunga.toml"),
            cwd.join("sunga.json"),
        ]);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.push(exe_dir.join("sunga.toml"));
        }
    }

    candidates.into_iter().find(|path| path.is_file())
}

/// Apply `SUNGA_*` variables on top of `config`. Unset or empty variables
/// leave the field alone.
///
/// # Errors
/// Returns `SungaError::Config` for unparsable values.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<()> {
    if let Some(url) = env_opt(API_URL_VAR) {
        config.api.base_url = url;
    }
    if let Some(timeout) = env_opt(API_TIMEOUT_VAR) {
        config.api.timeout_secs = timeout
            .parse()
            .map_err(|e| SungaError::Config(format!("Invalid {API_TIMEOUT_VAR}: {e}")))?;
    }
    if let Some(backend) = env_opt(STORAGE_BACKEND_VAR) {
        config.storage.backend = backend.parse()?;
    }
    if let Some(service) = env_opt(KEYCHAIN_SERVICE_VAR) {
        config.storage.keychain_service = service;
    }
    if let Some(dir) = env_opt(DATA_DIR_VAR) {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(encoding) = env_opt(LOGIN_ENCODING_VAR) {
        config.auth.login_encoding = encoding.parse()?;
    }
    Ok(())
}

/// Per-user data directory for the session file when none is configured.
///
/// `$XDG_DATA_HOME/sunga`, `%APPDATA%\Sunga`, `$HOME/.local/share/sunga`,
/// or `./.sunga` as a last resort.
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = env_opt("XDG_DATA_HOME") {
        return PathBuf::from(dir).join("sunga");
    }
    if let Some(dir) = env_opt("APPDATA") {
        return PathBuf::from(dir).join("Sunga");
    }
    if let Some(home) = env_opt("HOME") {
        return PathBuf::from(home).join(".local").join("share").join("sunga");
    }
    PathBuf::from(".sunga")
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use sunga_domain::{LoginEncoding, StorageBackend};
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 7] = [
        CONFIG_PATH_VAR,
        API_URL_VAR,
        API_TIMEOUT_VAR,
        STORAGE_BACKEND_VAR,
        KEYCHAIN_SERVICE_VAR,
        DATA_DIR_VAR,
        LOGIN_ENCODING_VAR,
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    fn temp_config(contents: &str, extension: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(extension).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_env_overrides_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(API_URL_VAR, "https://api.example.test");
        std::env::set_var(API_TIMEOUT_VAR, "25");
        std::env::set_var(STORAGE_BACKEND_VAR, "FILE");
        std::env::set_var(DATA_DIR_VAR, "/tmp/sunga-test");
        std::env::set_var(LOGIN_ENCODING_VAR, "json");

        let config = load_from_env().unwrap();
        assert_eq!(config.api.base_url, "https://api.example.test");
        assert_eq!(config.api.timeout_secs, 25);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("/tmp/sunga-test")));
        assert_eq!(config.auth.login_encoding, LoginEncoding::Json);
        assert_eq!(config.storage.keychain_service, "com.projectsunga.tokens");

        clear_env();
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(API_TIMEOUT_VAR, "ten");
        let err = load_from_env().unwrap_err();
        assert!(matches!(err, SungaError::Config(_)), "Should be a Config error");

        clear_env();
    }

    #[test]
    fn test_zero_timeout_fails_validation() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(API_TIMEOUT_VAR, "0");
        assert!(load_from_env().is_err());

        clear_env();
    }

    #[test]
    fn test_blank_variables_are_ignored() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        std::env::set_var(API_URL_VAR, "   ");
        let config = load_from_env().unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8000");

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let file = temp_config(
            r#"
            [api]
            base_url = "https://toml.example.test"
            timeout_secs = 5

            [storage]
            backend = "file"
            "#,
            ".toml",
        );

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.api.base_url, "https://toml.example.test");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.auth.login_encoding, LoginEncoding::Form);
    }

    #[test]
    fn test_load_from_file_json() {
        let file = temp_config(r#"{"auth": {"login_encoding": "json"}}"#, ".json");

        let config = load_from_file(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.auth.login_encoding, LoginEncoding::Json);
        assert_eq!(config.api.timeout_secs, 10);
    }

    #[test]
    fn test_load_from_file_rejects_unknown_extension() {
        let file = temp_config("base_url: x", ".yaml");
        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/sunga.toml"))).unwrap_err();
        assert!(matches!(err, SungaError::Config(_)));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = temp_config("[api]\nbase_url = \"https://file.example.test\"\n", ".toml");
        std::env::set_var(API_URL_VAR, "https://env.example.test");

        let config = load_with(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.api.base_url, "https://env.example.test");

        clear_env();
    }

    #[test]
    fn test_invalid_file_url_fails_validation() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let file = temp_config("[api]\nbase_url = \"ftp://files.example.test\"\n", ".toml");
        assert!(load_with(Some(file.path().to_path_buf())).is_err());

        clear_env();
    }
}
