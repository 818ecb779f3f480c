//! Short-lived askpass helper for password authentication.
//!
//! `ssh` never reads a password from stdin. When `SSH_ASKPASS` points at an
//! executable and `SSH_ASKPASS_REQUIRE=force`, it runs that program and uses
//! its stdout instead. The helper is an owner-only script that lives exactly
//! as long as this guard: dropping it deletes the file.

use crate::preamble::shell_quote;
use camino::Utf8Path;
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempPath;
use tokio::process::Command;

const SCRIPT_PREFIX: &str = "hive-askpass-";

/// Placeholder `DISPLAY` for clients that refuse askpass without one.
const FALLBACK_DISPLAY: &str = "hive";

/// Scoped askpass script.
#[derive(Debug)]
pub struct AskpassScript {
    path: TempPath,
}

impl AskpassScript {
    /// Write the helper into `dir` (or the system temp dir).
    pub fn create(password: &str, dir: Option<&Utf8Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRIPT_PREFIX);
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        write!(file, "#!/bin/sh\nprintf '%s\\n' {}\n", shell_quote(password))?;
        file.flush()?;

        // Close the write handle before anyone tries to exec the file
        let path = file.into_temp_path();
        set_owner_executable(&path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Point the ssh client at this helper.
    pub fn apply(&self, cmd: &mut Command) {
        cmd.env("SSH_ASKPASS", self.path.as_os_str())
            .env("SSH_ASKPASS_REQUIRE", "force");
        if std::env::var_os("DISPLAY").is_none() {
            cmd.env("DISPLAY", FALLBACK_DISPLAY);
        }
    }

    /// Delete the helper now, logging instead of failing.
    pub fn remove(self) {
        let path = self.path.to_path_buf();
        if let Err(e) = self.path.close() {
            tracing::error!("Failed to remove askpass helper {}: {}", path.display(), e);
        }
    }
}

#[cfg(unix)]
fn set_owner_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
}

#[cfg(not(unix))]
fn set_owner_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
