//! Run a command on the cluster through the system ssh client.

use crate::askpass::AskpassScript;
use crate::connection::ConnectionSettings;
use crate::preamble::{ModuleSetup, wrap_remote_command};
use camino::{Utf8Path, Utf8PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// How long to keep draining pipes after the process is gone. A killed
/// client can leave a grandchild holding the pipe open.
const READER_GRACE: Duration = Duration::from_millis(500);

/// Error type for remote execution.
#[derive(Error, Debug)]
pub enum SshError {
    #[error("SSH client missing at {0}.")]
    TransportUnavailable(Utf8PathBuf),
    #[error("Unable to launch ssh: {0}")]
    LaunchFailed(String),
    #[error("ssh failed: {0}")]
    CommandFailed(String),
}

/// Configuration for the ssh client.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// ssh binary; a bare name is looked up on `PATH`.
    pub ssh_path: Utf8PathBuf,
    /// Passed to ssh as `ConnectTimeout`.
    pub connect_timeout: Duration,
    /// Hard wall-clock limit for the whole invocation.
    pub command_timeout: Duration,
    /// Remote environment-module setup.
    pub modules: ModuleSetup,
    /// Where askpass helpers are written (system temp dir when unset).
    pub askpass_dir: Option<Utf8PathBuf>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            ssh_path: Utf8PathBuf::from("/usr/bin/ssh"),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            modules: ModuleSetup::default(),
            askpass_dir: None,
        }
    }
}

/// Runs remote commands with bounded lifetime.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    config: SshConfig,
}

impl RemoteExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Run `command` on the remote host and return its stdout.
    pub async fn run(
        &self,
        connection: &ConnectionSettings,
        command: &str,
    ) -> Result<Vec<u8>, SshError> {
        let ssh_path = resolve_executable(&self.config.ssh_path)
            .ok_or_else(|| SshError::TransportUnavailable(self.config.ssh_path.clone()))?;

        let remote = wrap_remote_command(command, &self.config.modules);
        let mut cmd = Command::new(ssh_path.as_std_path());
        cmd.args(self.build_args(connection, &remote))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Deleted when this guard drops, on every path out of this function
        let askpass = match connection.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                let script = AskpassScript::create(password, self.config.askpass_dir.as_deref())
                    .map_err(|e| {
                        SshError::LaunchFailed(format!("unable to write askpass helper: {}", e))
                    })?;
                script.apply(&mut cmd);
                Some(script)
            }
            None => None,
        };

        tracing::debug!("Running {} on {}", command, connection.destination());
        let mut child = cmd
            .spawn()
            .map_err(|e| SshError::LaunchFailed(e.to_string()))?;

        let stdout = Capture::spawn(child.stdout.take());
        let stderr = Capture::spawn(child.stderr.take());

        let timeout = self.config.command_timeout;
        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (status, false),
            Err(_) => {
                tracing::warn!(
                    "ssh to {} still running after {}, killing it",
                    connection.host,
                    format_timeout(timeout)
                );
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill ssh: {}", e);
                }
                (child.wait().await, true)
            }
        };

        if let Some(script) = askpass {
            script.remove();
        }

        let status = status.map_err(|e| SshError::LaunchFailed(e.to_string()))?;
        let stdout = stdout.finish().await;
        let stderr = stderr.finish().await;

        if timed_out || !status.success() {
            let stderr = String::from_utf8_lossy(&stderr).trim().to_string();
            return Err(SshError::CommandFailed(failure_message(
                &stderr, status, timed_out, timeout,
            )));
        }

        Ok(stdout)
    }

    /// Arguments passed to the ssh client, ending with the destination and
    /// the remote command.
    pub fn build_args(&self, connection: &ConnectionSettings, remote_command: &str) -> Vec<String> {
        let connect_secs = self.config.connect_timeout.as_secs().max(1);
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", connect_secs),
        ];

        let has_password = connection.password.as_deref().is_some_and(|p| !p.is_empty());
        args.push("-o".to_string());
        if has_password {
            args.push("NumberOfPasswordPrompts=1".to_string());
        } else {
            // Never block on an interactive prompt
            args.push("BatchMode=yes".to_string());
        }

        if let Some(identity) = &connection.identity_file_path {
            args.push("-i".to_string());
            args.push(expand_tilde(identity).into_string());
        }

        args.push(connection.destination());
        args.push(remote_command.to_string());
        args
    }
}

/// Pick the most useful message for a failed invocation.
fn failure_message(stderr: &str, status: ExitStatus, timed_out: bool, timeout: Duration) -> String {
    if timed_out {
        let message = format!("timed out after {}", format_timeout(timeout));
        if stderr.is_empty() {
            message
        } else {
            format!("{} ({})", message, stderr)
        }
    } else if !stderr.is_empty() {
        stderr.to_string()
    } else {
        match status.code() {
            Some(code) => format!("ssh exited with code {}", code),
            None => "ssh was terminated by a signal".to_string(),
        }
    }
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{:.1}s", timeout.as_secs_f64())
    }
}

/// Pipe output accumulated as it arrives, so partial output survives a kill.
struct Capture {
    buffer: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<()>,
}

impl Capture {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let reader = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        tracing::debug!("Pipe read failed: {}", e);
                        break;
                    }
                }
            }
        });
        Self { buffer, reader }
    }

    /// Wait briefly for the reader to hit EOF, then take what was captured.
    async fn finish(self) -> Vec<u8> {
        let mut reader = self.reader;
        if tokio::time::timeout(READER_GRACE, &mut reader).await.is_err() {
            reader.abort();
        }
        std::mem::take(&mut *self.buffer.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Resolve the client binary, searching `PATH` for bare names.
fn resolve_executable(path: &Utf8Path) -> Option<Utf8PathBuf> {
    if path.as_str().contains('/') {
        return is_executable(path.as_std_path()).then(|| path.to_path_buf());
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(path.as_std_path()))
        .find(|candidate| is_executable(candidate))
        .and_then(|found| Utf8PathBuf::from_path_buf(found).ok())
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.is_file()
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &Utf8Path) -> Utf8PathBuf {
    let rest = match path.as_str() {
        "~" => "",
        other => match other.strip_prefix("~/") {
            Some(rest) => rest,
            None => return path.to_path_buf(),
        },
    };
    match dirs::home_dir().and_then(|home| Utf8PathBuf::from_path_buf(home).ok()) {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Write an executable stand-in for ssh.
    fn fake_ssh(dir: &TempDir, body: &str) -> Utf8PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("ssh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Utf8PathBuf::from_path_buf(path).unwrap()
    }

    /// A "remote" that runs the wrapped command locally.
    const LOCAL_SHELL: &str = "for last; do :; done\nexec /bin/sh -c \"$last\"";

    fn executor(ssh_path: Utf8PathBuf, command_timeout: Duration) -> RemoteExecutor {
        RemoteExecutor::new(SshConfig {
            ssh_path,
            command_timeout,
            ..SshConfig::default()
        })
    }

    fn connection() -> ConnectionSettings {
        ConnectionSettings::new("hive.example.edu", "alice").with_identity_file("/keys/id_ed25519")
    }

    #[test]
    fn test_build_args() {
        let exec = executor(Utf8PathBuf::from("/usr/bin/ssh"), Duration::from_secs(30));
        let args = exec.build_args(&connection(), "squeue --me --json");
        assert_eq!(
            args,
            vec![
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ConnectTimeout=10",
                "-o",
                "BatchMode=yes",
                "-i",
                "/keys/id_ed25519",
                "alice@hive.example.edu",
                "squeue --me --json",
            ]
        );
    }

    #[test]
    fn test_build_args_with_password_and_bare_host() {
        let exec = executor(Utf8PathBuf::from("/usr/bin/ssh"), Duration::from_secs(30));
        let conn = ConnectionSettings::new("hive", "").with_password("pw");
        let args = exec.build_args(&conn, "true");
        assert!(args.contains(&"NumberOfPasswordPrompts=1".to_string()));
        assert!(!args.contains(&"BatchMode=yes".to_string()));
        assert!(!args.contains(&"-i".to_string()));
        assert_eq!(&args[args.len() - 2..], ["hive", "true"]);
    }

    #[test]
    fn test_expand_tilde() {
        let home = Utf8PathBuf::from_path_buf(dirs::home_dir().unwrap()).unwrap();
        assert_eq!(
            expand_tilde(Utf8Path::new("~/.ssh/id_rsa")),
            home.join(".ssh/id_rsa")
        );
        assert_eq!(expand_tilde(Utf8Path::new("~")), home);
        assert_eq!(expand_tilde(Utf8Path::new("/abs/key")), Utf8PathBuf::from("/abs/key"));
        assert_eq!(
            expand_tilde(Utf8Path::new("~alice/key")),
            Utf8PathBuf::from("~alice/key")
        );
    }

    #[test]
    fn test_format_timeout() {
        assert_eq!(format_timeout(Duration::from_secs(30)), "30s");
        assert_eq!(format_timeout(Duration::from_millis(200)), "0.2s");
    }

    #[tokio::test]
    async fn test_missing_client() {
        let exec = executor(Utf8PathBuf::from("/nonexistent/ssh"), Duration::from_secs(5));
        let result = exec.run(&connection(), "true").await;
        assert!(matches!(result, Err(SshError::TransportUnavailable(_))));

        let exec = executor(Utf8PathBuf::from("no-such-ssh-client-12345"), Duration::from_secs(5));
        let result = exec.run(&connection(), "true").await;
        assert!(matches!(result, Err(SshError::TransportUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_returns_stdout() {
        let dir = TempDir::new().unwrap();
        let exec = executor(fake_ssh(&dir, LOCAL_SHELL), Duration::from_secs(10));
        let stdout = exec.run(&connection(), "echo '{\"jobs\": []}'").await.unwrap();
        assert_eq!(String::from_utf8_lossy(&stdout).trim(), "{\"jobs\": []}");
    }

    #[tokio::test]
    async fn test_nonzero_exit_prefers_stderr() {
        let dir = TempDir::new().unwrap();
        let exec = executor(fake_ssh(&dir, LOCAL_SHELL), Duration::from_secs(10));

        let err = exec
            .run(&connection(), "echo 'Permission denied (publickey).' >&2; exit 255")
            .await
            .unwrap_err();
        match err {
            SshError::CommandFailed(message) => assert_eq!(message, "Permission denied (publickey)."),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = exec.run(&connection(), "exit 3").await.unwrap_err();
        assert_eq!(err.to_string(), "ssh failed: ssh exited with code 3");
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let dir = TempDir::new().unwrap();
        let exec = executor(
            fake_ssh(&dir, "echo 'connecting...' >&2\nexec sleep 5"),
            Duration::from_millis(200),
        );

        let started = std::time::Instant::now();
        let err = exec.run(&connection(), "true").await.unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));

        let message = err.to_string();
        assert!(message.contains("timed out after 0.2s"), "{}", message);
        assert!(message.contains("connecting..."), "{}", message);
    }

    #[tokio::test]
    async fn test_password_via_askpass_is_cleaned_up() {
        let dir = TempDir::new().unwrap();
        let askpass_dir = TempDir::new().unwrap();
        let ssh = fake_ssh(
            &dir,
            "echo \"$SSH_ASKPASS_REQUIRE\"\n\"$SSH_ASKPASS\"\necho \"$SSH_ASKPASS\"",
        );
        let exec = RemoteExecutor::new(SshConfig {
            ssh_path: ssh,
            askpass_dir: Some(Utf8PathBuf::from_path_buf(askpass_dir.path().to_path_buf()).unwrap()),
            ..SshConfig::default()
        });

        let conn = connection().with_password("s3cr3t");
        let stdout = exec.run(&conn, "true").await.unwrap();
        let stdout = String::from_utf8_lossy(&stdout);
        let lines: Vec<&str> = stdout.lines().collect();

        assert_eq!(lines[0], "force");
        assert_eq!(lines[1], "s3cr3t");
        assert!(!std::path::Path::new(lines[2]).exists());
        assert_eq!(std::fs::read_dir(askpass_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_askpass_removed_after_timeout() {
        let dir = TempDir::new().unwrap();
        let askpass_dir = TempDir::new().unwrap();
        let exec = RemoteExecutor::new(SshConfig {
            ssh_path: fake_ssh(&dir, "\"$SSH_ASKPASS\" >/dev/null\nexec sleep 5"),
            command_timeout: Duration::from_millis(200),
            askpass_dir: Some(Utf8PathBuf::from_path_buf(askpass_dir.path().to_path_buf()).unwrap()),
            ..SshConfig::default()
        });

        let started = std::time::Instant::now();
        let err = exec
            .run(&connection().with_password("s3cr3t"), "true")
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));

        let message = err.to_string();
        assert!(message.contains("timed out after 0.2s"), "{}", message);
        assert_eq!(std::fs::read_dir(askpass_dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_askpass_removed_when_launch_fails() {
        let dir = TempDir::new().unwrap();
        let askpass_dir = TempDir::new().unwrap();

        // Executable, but its interpreter does not exist, so spawn fails
        let path = dir.path().join("ssh");
        std::fs::write(&path, "#!/nonexistent/interpreter\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let exec = RemoteExecutor::new(SshConfig {
            ssh_path: Utf8PathBuf::from_path_buf(path).unwrap(),
            askpass_dir: Some(Utf8PathBuf::from_path_buf(askpass_dir.path().to_path_buf()).unwrap()),
            ..SshConfig::default()
        });

        let result = exec.run(&connection().with_password("pw"), "true").await;
        assert!(matches!(result, Err(SshError::LaunchFailed(_))));
        assert_eq!(std::fs::read_dir(askpass_dir.path()).unwrap().count(), 0);
    }
}
