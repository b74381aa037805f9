//! Secret storage trait

use super::keychain::KeychainError;

/// Key/value access to a secure secret store
///
/// Implementations are synchronous; platform keychains answer quickly and
/// the callers already run inside async tasks that tolerate the short block.
pub trait SecretStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the store rejects the write.
    fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    /// Returns `KeychainError::NotFound` if nothing is stored under `key`,
    /// `KeychainError::AccessFailed` if the store cannot be read.
    fn get_secret(&self, key: &str) -> Result<String, KeychainError>;

    /// Delete the value stored under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if the store rejects the delete.
    fn delete_secret(&self, key: &str) -> Result<(), KeychainError>;

    /// Whether a value is stored under `key`.
    fn secret_exists(&self, key: &str) -> bool {
        self.get_secret(key).is_ok()
    }
}
