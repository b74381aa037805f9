//! Configuration loading
//!
//! Builds a [`sunga_domain::ClientConfig`] from a config file, environment
//! variables and defaults.

pub mod loader;

// Re-export commonly used items
pub use loader::{
    apply_env_overrides, default_data_dir, load, load_from_env, load_from_file, load_with,
    probe_config_paths,
};
