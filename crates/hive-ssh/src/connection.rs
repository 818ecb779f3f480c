//! SSH connection settings.

use camino::Utf8PathBuf;
use std::fmt;

/// Where and how to connect.
///
/// Treated as an immutable value: a credential change produces a new
/// instance rather than mutating the active one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub username: String,
    pub identity_file_path: Option<Utf8PathBuf>,
    pub password: Option<String>,
}

impl ConnectionSettings {
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            identity_file_path: None,
            password: None,
        }
    }

    pub fn with_identity_file(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.identity_file_path = Some(path.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into()).filter(|p: &String| !p.is_empty());
        self
    }

    /// Host, username and an identity file are required; the password is optional.
    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty()
            && !self.username.trim().is_empty()
            && self.identity_file_path.is_some()
    }

    /// `user@host`, or the bare host when no username is set.
    pub fn destination(&self) -> String {
        if self.username.is_empty() {
            self.host.clone()
        } else {
            format!("{}@{}", self.username, self.host)
        }
    }
}

// Keep the password out of logs
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("identity_file_path", &self.identity_file_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
