//! Integration tests for configuration loader
//!
//! Loads real files from disk and layers environment overrides on top.

use std::io::Write;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use sunga_domain::{LoginEncoding, StorageBackend};
use sunga_infra::config;
use sunga_infra::store::session_file_path;
use tempfile::{Builder, TempDir};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

const OVERRIDE_VARS: &[&str] = &[
    "SUNGA_CONFIG",
    "SUNGA_API_URL",
    "SUNGA_API_TIMEOUT_SECS",
    "SUNGA_STORAGE_BACKEND",
    "SUNGA_KEYCHAIN_SERVICE",
    "SUNGA_DATA_DIR",
    "SUNGA_LOGIN_ENCODING",
];

fn clear_env() {
    for var in OVERRIDE_VARS {
        std::env::remove_var(var);
    }
}

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_config_from_toml_file() {
    let file = write_config(
        ".toml",
        r#"
        [api]
        base_url = "https://records.example.org"
        timeout_secs = 45

        [storage]
        backend = "file"
        data_dir = "/var/lib/sunga"

        [auth]
        login_encoding = "json"
        "#,
    );

    let config = config::load_from_file(Some(file.path().to_path_buf())).expect("toml config");

    assert_eq!(config.api.base_url, "https://records.example.org");
    assert_eq!(config.api.timeout_secs, 45);
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.auth.login_encoding, LoginEncoding::Json);
    assert_eq!(
        session_file_path(&config.storage),
        std::path::Path::new("/var/lib/sunga").join("session.json")
    );
}

#[test]
fn test_load_partial_json_keeps_defaults() {
    let file = write_config(".json", r#"{ "api": { "base_url": "http://localhost:8000" } }"#);

    let config = config::load_from_file(Some(file.path().to_path_buf())).expect("json config");

    let defaults = sunga_domain::ClientConfig::default();
    assert_eq!(config.api.base_url, "http://localhost:8000");
    assert_eq!(config.api.timeout_secs, defaults.api.timeout_secs);
    assert_eq!(config.storage, defaults.storage);
}

#[test]
fn test_missing_and_malformed_files_fail() {
    let dir = TempDir::new().expect("temp dir");
    assert!(config::load_from_file(Some(dir.path().join("absent.toml"))).is_err());

    let broken = write_config(".toml", "[api\nbase_url = ");
    assert!(config::load_from_file(Some(broken.path().to_path_buf())).is_err());

    let yaml = write_config(".yaml", "api: {}");
    assert!(config::load_from_file(Some(yaml.path().to_path_buf())).is_err());
}

#[test]
fn test_env_overrides_win_over_file() {
    let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
    clear_env();

    let file = write_config(
        ".toml",
        r#"
        [api]
        base_url = "https://from-file.example.org"
        "#,
    );
    std::env::set_var("SUNGA_API_URL", "https://from-env.example.org");
    std::env::set_var("SUNGA_STORAGE_BACKEND", "file");

    let config = config::load_with(Some(file.path().to_path_buf())).expect("layered config");
    clear_env();

    assert_eq!(config.api.base_url, "https://from-env.example.org");
    assert_eq!(config.storage.backend, StorageBackend::File);
}

#[test]
fn test_config_path_variable_and_validation() {
    let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
    clear_env();

    let file = write_config(
        ".toml",
        r#"
        [api]
        base_url = "ftp://records.example.org"
        "#,
    );
    std::env::set_var("SUNGA_CONFIG", file.path());

    let result = config::load();
    clear_env();

    let err = result.expect_err("non-http base url must be rejected");
    assert!(err.to_string().contains("http"));
}
