//! Published polling state.

use chrono::{DateTime, Utc};
use hive_slurm::{Job, JobState};
use serde::Serialize;

/// Everything the presentation layer reads about one connection.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollingState {
    /// Jobs in display order
    pub jobs: Vec<Job>,

    /// Message from the last failed or refused fetch
    pub last_error: Option<String>,

    /// Whether a fetch is outstanding
    pub is_fetching: bool,

    /// When the last fetch finished
    pub last_fetch_time: Option<DateTime<Utc>>,

    /// Failed fetches since the last success
    pub consecutive_failures: u32,

    /// Polling paused after too many failures
    pub is_throttled: bool,
}

impl PollingState {
    pub fn running_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|j| j.state == JobState::Running)
    }

    pub fn pending_jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter().filter(|j| j.state == JobState::Pending)
    }

    /// Compact status line, e.g. "Slurm: 2R 1Q", or "Slurm: !" on error.
    pub fn menu_title(&self) -> String {
        if self.last_error.is_some() {
            return "Slurm: !".to_string();
        }
        format!(
            "Slurm: {}R {}Q",
            self.running_jobs().count(),
            self.pending_jobs().count()
        )
    }

    /// The first `max` jobs, for panels with limited room.
    pub fn visible_jobs(&self, max: usize) -> &[Job] {
        &self.jobs[..self.jobs.len().min(max)]
    }
}

/// Snapshot sent to subscribers on every change.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollingSnapshot {
    pub host: String,

    #[serde(flatten)]
    pub state: PollingState,
}
