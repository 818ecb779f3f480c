//! Credential storage seam.
//!
//! The poller never talks to a keychain directly; anything that can
//! save, load and delete a secret per (service, account) will do.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeychainError {
    #[error("Unable to encode password.")]
    UnableToEncode,
    #[error("Keychain error: {0}")]
    Store(String),
}

/// A secret store keyed by service and account.
pub trait SecretStore: Send + Sync {
    fn save(&self, secret: &str, service: &str, account: &str) -> Result<(), KeychainError>;

    fn load(&self, service: &str, account: &str) -> Option<String>;

    /// Deleting a missing entry is not an error.
    fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError>;
}

impl<T: SecretStore + ?Sized> SecretStore for Arc<T> {
    fn save(&self, secret: &str, service: &str, account: &str) -> Result<(), KeychainError> {
        (**self).save(secret, service, account)
    }

    fn load(&self, service: &str, account: &str) -> Option<String> {
        (**self).load(service, account)
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        (**self).delete(service, account)
    }
}

/// Process-local store, for tests and for passwords supplied on the command line.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn save(&self, secret: &str, service: &str, account: &str) -> Result<(), KeychainError> {
        // Keychain APIs take C strings
        if secret.contains('\0') {
            return Err(KeychainError::UnableToEncode);
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| KeychainError::Store("secret store lock poisoned".to_string()))?;
        entries.insert((service.to_string(), account.to_string()), secret.to_string());
        Ok(())
    }

    fn load(&self, service: &str, account: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(&(service.to_string(), account.to_string()))
            .cloned()
    }

    fn delete(&self, service: &str, account: &str) -> Result<(), KeychainError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| KeychainError::Store("secret store lock poisoned".to_string()))?;
        entries.remove(&(service.to_string(), account.to_string()));
        Ok(())
    }
}
