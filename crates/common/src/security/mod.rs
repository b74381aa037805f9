//! Secure secret storage
//!
//! [`KeychainProvider`] talks to the platform keychain (macOS Keychain
//! Access, Windows Credential Manager, Linux Secret Service). Code that only
//! needs to read and write secrets depends on the [`SecretStore`] trait so a
//! mock can stand in during tests.

pub mod keychain;
pub mod traits;

pub use keychain::{KeychainError, KeychainProvider};
pub use traits::SecretStore;
