//! CLI argument parsing for hive.

use camino::Utf8PathBuf;
use clap::Parser;
use hive_poller::PollingConfig;
use hive_slurm::SQUEUE_COMMAND;
use hive_ssh::{ModuleSetup, SshConfig};
use std::time::Duration;

/// Login node polled when no host is given.
pub const DEFAULT_HOST: &str = "hive.hpc.ucdavis.edu";

#[derive(Parser, Debug)]
#[command(name = "hive")]
#[command(about = "Watch your Slurm jobs on a remote cluster over ssh")]
pub struct Args {
    /// Cluster login host
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Remote username
    #[arg(short, long, env = "USER", default_value = "")]
    pub user: String,

    /// Private key used to authenticate
    #[arg(short, long)]
    pub identity: Option<Utf8PathBuf>,

    /// Key passphrase or account password, fed to ssh through askpass
    #[arg(long, env = "HIVE_SSH_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// ssh client binary
    #[arg(long, default_value = "/usr/bin/ssh")]
    pub ssh_path: Utf8PathBuf,

    /// ssh connect timeout in seconds
    #[arg(long, default_value = "10")]
    pub connect_timeout: u64,

    /// Hard limit for one remote call in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub command_timeout: u64,

    /// Minimum seconds between regular refreshes
    #[arg(long, default_value = "30")]
    pub cooldown: u64,

    /// Minimum seconds between forced refreshes
    #[arg(long, default_value = "5")]
    pub min_force_interval: u64,

    /// Consecutive failures before polling pauses
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..))]
    pub max_failures: u32,

    /// Script to source on the remote side before loading modules
    #[arg(long)]
    pub module_init: Option<String>,

    /// Environment module providing squeue
    #[arg(long)]
    pub module: Option<String>,

    /// modulecmd binary used when `module` is not a shell function
    #[arg(long)]
    pub modulecmd: Option<String>,

    /// Command run on the login node
    #[arg(long, default_value = SQUEUE_COMMAND)]
    pub remote_command: String,

    /// Number of jobs shown
    #[arg(long, default_value = "20")]
    pub max_visible_jobs: usize,

    /// Poll interval in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Fetch once, print, and exit
    #[arg(long)]
    pub once: bool,

    /// Print snapshots as JSON
    #[arg(long)]
    pub json: bool,
}

/// Everything the binary needs, resolved once at startup.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub username: String,
    pub identity_file: Option<Utf8PathBuf>,
    pub password: Option<String>,
    pub ssh: SshConfig,
    pub polling: PollingConfig,
    pub remote_command: String,
    pub max_visible_jobs: usize,
    pub poll_interval: Duration,
    pub once: bool,
    pub json: bool,
}

impl Args {
    pub fn into_config(self) -> AppConfig {
        let modules = ModuleSetup {
            init_script: non_empty(self.module_init),
            module_name: non_empty(self.module),
            modulecmd_path: non_empty(self.modulecmd),
        };

        AppConfig {
            host: self.host.trim().to_string(),
            username: self.user.trim().to_string(),
            identity_file: self.identity.filter(|p| !p.as_str().is_empty()),
            password: non_empty(self.password),
            ssh: SshConfig {
                ssh_path: self.ssh_path,
                connect_timeout: Duration::from_secs(self.connect_timeout),
                command_timeout: Duration::from_secs(self.command_timeout),
                modules,
                askpass_dir: None,
            },
            polling: PollingConfig {
                refresh_cooldown: Duration::from_secs(self.cooldown),
                min_force_interval: Duration::from_secs(self.min_force_interval),
                max_consecutive_failures: self.max_failures,
            },
            remote_command: self.remote_command,
            max_visible_jobs: self.max_visible_jobs,
            poll_interval: Duration::from_secs(self.poll_interval),
            once: self.once,
            json: self.json,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("hive").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&["--user", "alice"]).into_config();
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.username, "alice");
        assert_eq!(config.identity_file, None);
        assert_eq!(config.remote_command, "squeue --me --json");
        assert_eq!(config.max_visible_jobs, 20);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.ssh.ssh_path, Utf8PathBuf::from("/usr/bin/ssh"));
        assert_eq!(config.ssh.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.ssh.command_timeout, Duration::from_secs(30));
        assert_eq!(config.ssh.modules, ModuleSetup::default());
        assert_eq!(config.polling.refresh_cooldown, Duration::from_secs(30));
        assert_eq!(config.polling.min_force_interval, Duration::from_secs(5));
        assert_eq!(config.polling.max_consecutive_failures, 3);
        assert!(!config.once);
        assert!(!config.json);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--host",
            " login.example.edu ",
            "-u",
            "bob",
            "-i",
            "~/.ssh/id_ed25519",
            "--password",
            "pw",
            "--module-init",
            "/etc/profile.d/modules.sh",
            "--module",
            "slurm",
            "--modulecmd",
            "",
            "--cooldown",
            "60",
            "--max-failures",
            "5",
            "--once",
            "--json",
        ])
        .into_config();

        assert_eq!(config.host, "login.example.edu");
        assert_eq!(config.username, "bob");
        assert_eq!(config.identity_file, Some(Utf8PathBuf::from("~/.ssh/id_ed25519")));
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(
            config.ssh.modules.init_script.as_deref(),
            Some("/etc/profile.d/modules.sh")
        );
        assert_eq!(config.ssh.modules.module_name.as_deref(), Some("slurm"));
        assert_eq!(config.ssh.modules.modulecmd_path, None);
        assert_eq!(config.polling.refresh_cooldown, Duration::from_secs(60));
        assert_eq!(config.polling.max_consecutive_failures, 5);
        assert!(config.once);
        assert!(config.json);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let zero_failures = ["hive", "--max-failures", "0"];
        assert!(Args::try_parse_from(zero_failures).is_err());

        let zero_interval = ["hive", "--poll-interval", "0"];
        assert!(Args::try_parse_from(zero_interval).is_err());
    }
}
