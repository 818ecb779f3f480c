//! One round trip to the cluster: run squeue remotely and decode the jobs.

use chrono::Utc;
use hive_slurm::{Job, SQUEUE_COMMAND, SqueueError, parse_squeue_json};
use hive_ssh::{ConnectionSettings, RemoteExecutor, SshError};
use thiserror::Error;

/// Error type for a single fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Ssh(#[from] SshError),
    #[error(transparent)]
    Decode(#[from] SqueueError),
    #[error("Fetch task stopped unexpectedly: {0}")]
    Worker(String),
}

/// Source of job lists for the controller.
pub trait JobFetcher: Send + Sync + 'static {
    fn fetch_jobs(
        &self,
        connection: &ConnectionSettings,
    ) -> impl Future<Output = Result<Vec<Job>, FetchError>> + Send;
}

/// Fetches jobs by running squeue on the login node over ssh.
#[derive(Debug, Clone)]
pub struct SlurmFetcher {
    executor: RemoteExecutor,
    command: String,
}

impl SlurmFetcher {
    pub fn new(executor: RemoteExecutor, command: impl Into<String>) -> Self {
        Self {
            executor,
            command: command.into(),
        }
    }

    /// Fetcher for the default `squeue --me --json` invocation.
    pub fn with_default_command(executor: RemoteExecutor) -> Self {
        Self::new(executor, SQUEUE_COMMAND)
    }
}

impl JobFetcher for SlurmFetcher {
    async fn fetch_jobs(&self, connection: &ConnectionSettings) -> Result<Vec<Job>, FetchError> {
        let stdout = self.executor.run(connection, &self.command).await?;
        let jobs = parse_squeue_json(&stdout, Utc::now())?;
        tracing::debug!("Decoded {} jobs from {}", jobs.len(), connection.host);
        Ok(jobs)
    }
}
