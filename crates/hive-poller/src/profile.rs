//! Editable connection profile backed by a secret store.
//!
//! Host, username and key path are plain values; the password lives in the
//! secret store under the current host. Every setter returns the new
//! [`ConnectionSettings`] only when the effective value changed, which is
//! what the controller should be handed.

use crate::secrets::{KeychainError, SecretStore};
use camino::Utf8PathBuf;
use hive_ssh::ConnectionSettings;

/// Secret store service name.
pub const KEYCHAIN_SERVICE: &str = "hive-squeue";

pub struct ConnectionProfile<S> {
    store: S,
    host: String,
    username: String,
    identity_file_path: Option<Utf8PathBuf>,
    password: String,
    current: ConnectionSettings,
}

impl<S: SecretStore> ConnectionProfile<S> {
    /// Build a profile, loading the stored password for `host`.
    pub fn load(
        store: S,
        host: impl Into<String>,
        username: impl Into<String>,
        identity_file_path: Option<Utf8PathBuf>,
    ) -> Self {
        let host = host.into();
        let password = store.load(KEYCHAIN_SERVICE, &host).unwrap_or_default();
        let mut profile = Self {
            store,
            host,
            username: username.into(),
            identity_file_path: identity_file_path.filter(|p| !p.as_str().is_empty()),
            password,
            current: ConnectionSettings::default(),
        };
        profile.current = profile.build();
        tracing::debug!(
            "Loaded connection profile for {} (configured: {})",
            profile.host,
            profile.current.is_configured()
        );
        profile
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.current
    }

    /// Switch host; the password is reloaded for the new host.
    pub fn set_host(&mut self, host: impl Into<String>) -> Option<ConnectionSettings> {
        self.host = host.into();
        self.password = self
            .store
            .load(KEYCHAIN_SERVICE, &self.host)
            .unwrap_or_default();
        self.refresh()
    }

    pub fn set_username(&mut self, username: impl Into<String>) -> Option<ConnectionSettings> {
        self.username = username.into();
        self.refresh()
    }

    pub fn set_identity_file(&mut self, path: Option<Utf8PathBuf>) -> Option<ConnectionSettings> {
        self.identity_file_path = path.filter(|p| !p.as_str().is_empty());
        self.refresh()
    }

    /// Store (or, when empty, delete) the password for the current host.
    pub fn set_password(
        &mut self,
        password: impl Into<String>,
    ) -> Result<Option<ConnectionSettings>, KeychainError> {
        let password = password.into();
        if password == self.password {
            return Ok(None);
        }

        if password.is_empty() {
            self.store.delete(KEYCHAIN_SERVICE, &self.host)?;
        } else {
            self.store.save(&password, KEYCHAIN_SERVICE, &self.host)?;
        }
        self.password = password;
        Ok(self.refresh())
    }

    fn build(&self) -> ConnectionSettings {
        ConnectionSettings {
            host: self.host.clone(),
            username: self.username.clone(),
            identity_file_path: self.identity_file_path.clone(),
            password: Some(self.password.clone()).filter(|p| !p.is_empty()),
        }
    }

    fn refresh(&mut self) -> Option<ConnectionSettings> {
        let next = self.build();
        if next == self.current {
            return None;
        }
        self.current = next.clone();
        Some(next)
    }
}
