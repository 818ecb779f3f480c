//! Polling controller.
//!
//! One controller serves one active connection. It owns the published
//! [`PollingState`] behind a tokio mutex and decides whether a fetch may
//! start: at most one is outstanding, every fetch respects the anti-spam
//! floor, non-forced ones also respect the refresh cooldown, and after
//! too many consecutive failures polling stays paused until the
//! connection changes.
//!
//! Every fetch carries the connection generation it started under. A
//! result that comes back after the connection was replaced is dropped.

use crate::config::PollingConfig;
use crate::fetcher::{FetchError, JobFetcher};
use crate::state::{PollingSnapshot, PollingState};
use chrono::Utc;
use hive_slurm::{Job, sort_jobs};
use hive_ssh::ConnectionSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const NOT_CONFIGURED: &str = "Connection not configured: set host, username and identity file";

/// Why a fetch request did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch is outstanding.
    InFlight,
    /// Polling is paused after repeated failures.
    Throttled,
    /// The connection is missing host, username or key.
    NotConfigured,
    /// Too soon after the last fetch.
    Cooldown { remaining: Duration },
}

/// Result of a fetch request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The fetch is running; the handle resolves once its result is applied.
    Started(JoinHandle<()>),
    Skipped(SkipReason),
}

impl FetchOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, FetchOutcome::Started(_))
    }

    /// Wait for a started fetch to be applied. Returns the skip reason otherwise.
    pub async fn wait(self) -> Option<SkipReason> {
        match self {
            FetchOutcome::Started(handle) => {
                if let Err(e) = handle.await {
                    tracing::error!("Fetch task failed: {}", e);
                }
                None
            }
            FetchOutcome::Skipped(reason) => Some(reason),
        }
    }
}

struct Inner {
    connection: ConnectionSettings,
    generation: u64,
    state: PollingState,
    last_fetch_at: Option<Instant>,
}

impl Inner {
    /// Time left in `window` since the last completed fetch.
    fn remaining(&self, window: Duration) -> Option<Duration> {
        let last = self.last_fetch_at?;
        let remaining = window.saturating_sub(last.elapsed());
        (!remaining.is_zero()).then_some(remaining)
    }

    fn snapshot(&self) -> PollingSnapshot {
        PollingSnapshot {
            host: self.connection.host.clone(),
            state: self.state.clone(),
        }
    }
}

struct Shared<F> {
    fetcher: F,
    config: PollingConfig,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<PollingSnapshot>,
}

impl<F> Shared<F> {
    fn publish(&self, inner: &Inner) {
        self.snapshots.send_replace(inner.snapshot());
    }

    fn max_failures(&self) -> u32 {
        self.config.max_consecutive_failures.max(1)
    }

    /// Apply a finished fetch, unless the connection changed meanwhile.
    async fn complete(&self, generation: u64, result: Result<Vec<Job>, FetchError>) {
        let mut inner = self.inner.lock().await;
        if inner.generation != generation {
            tracing::debug!(
                "Discarding result from connection generation {} (now {})",
                generation,
                inner.generation
            );
            return;
        }

        let max = self.max_failures();
        let state = &mut inner.state;
        match result {
            Ok(mut jobs) => {
                sort_jobs(&mut jobs);
                tracing::info!("Fetched {} jobs", jobs.len());
                state.jobs = jobs;
                state.last_error = None;
                state.consecutive_failures = 0;
                state.is_throttled = false;
            }
            Err(e) => {
                state.consecutive_failures += 1;
                let failures = state.consecutive_failures;
                if failures >= max {
                    tracing::warn!(
                        "Fetch failed ({}), pausing after {} consecutive failures",
                        e,
                        failures
                    );
                    state.is_throttled = true;
                    state.last_error = Some(format!(
                        "{} (polling paused after {} consecutive failures, check credentials)",
                        e, failures
                    ));
                } else {
                    tracing::warn!("Fetch failed (attempt {}/{}): {}", failures, max, e);
                    state.last_error = Some(format!("{} (attempt {}/{})", e, failures, max));
                }
            }
        }

        state.is_fetching = false;
        state.last_fetch_time = Some(Utc::now());
        inner.last_fetch_at = Some(Instant::now());
        self.publish(&inner);
    }
}

/// Cooldown-gated, single-flight poller for one connection.
pub struct PollingController<F> {
    shared: Arc<Shared<F>>,
}

impl<F> Clone for PollingController<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<F: JobFetcher> PollingController<F> {
    pub fn new(fetcher: F, config: PollingConfig, connection: ConnectionSettings) -> Self {
        let inner = Inner {
            connection,
            generation: 0,
            state: PollingState::default(),
            last_fetch_at: None,
        };
        let (snapshots, _) = watch::channel(inner.snapshot());
        Self {
            shared: Arc::new(Shared {
                fetcher,
                config,
                inner: Mutex::new(inner),
                snapshots,
            }),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.shared.fetcher
    }

    /// Receive a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<PollingSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> PollingSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub async fn connection(&self) -> ConnectionSettings {
        self.shared.inner.lock().await.connection.clone()
    }

    /// Request a fetch. `force` bypasses the refresh cooldown but not the
    /// anti-spam floor.
    pub async fn fetch(&self, force: bool) -> FetchOutcome {
        let mut inner = self.shared.inner.lock().await;

        if inner.state.is_fetching {
            tracing::debug!("Fetch already in flight, skipping");
            return FetchOutcome::Skipped(SkipReason::InFlight);
        }

        if inner.state.is_throttled {
            tracing::debug!("Polling is paused, skipping fetch");
            inner.state.last_error = Some(format!(
                "Polling paused after {} consecutive failures, check credentials",
                inner.state.consecutive_failures
            ));
            self.shared.publish(&inner);
            return FetchOutcome::Skipped(SkipReason::Throttled);
        }

        if !inner.connection.is_configured() {
            tracing::debug!("Connection not configured, skipping fetch");
            inner.state.last_error = Some(NOT_CONFIGURED.to_string());
            self.shared.publish(&inner);
            return FetchOutcome::Skipped(SkipReason::NotConfigured);
        }

        if let Some(remaining) = inner.remaining(self.shared.config.fetch_window(force)) {
            tracing::debug!("Last fetch too recent, next allowed in {:?}", remaining);
            return FetchOutcome::Skipped(SkipReason::Cooldown { remaining });
        }

        inner.state.is_fetching = true;
        self.shared.publish(&inner);

        let generation = inner.generation;
        let connection = inner.connection.clone();
        drop(inner);

        tracing::debug!("Fetching jobs from {}", connection.host);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            // Run the fetch on its own task so a panic still clears is_fetching
            let worker = {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.fetcher.fetch_jobs(&connection).await })
            };
            let result = match worker.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::Worker(e.to_string())),
            };
            shared.complete(generation, result).await;
        });

        FetchOutcome::Started(handle)
    }

    /// Replace the connection and start over. Returns the outcome of the
    /// automatic fetch when the connection just became usable.
    pub async fn update_connection(&self, connection: ConnectionSettings) -> Option<FetchOutcome> {
        let became_configured = {
            let mut inner = self.shared.inner.lock().await;
            let was_configured = inner.connection.is_configured();

            inner.generation += 1;
            inner.connection = connection;
            inner.state = PollingState::default();
            inner.last_fetch_at = None;
            self.shared.publish(&inner);

            tracing::info!(
                "Connection updated to {} (configured: {})",
                inner.connection.destination(),
                inner.connection.is_configured()
            );
            !was_configured && inner.connection.is_configured()
        };

        if became_configured {
            Some(self.fetch(false).await)
        } else {
            None
        }
    }

    /// Time until a non-forced fetch would be allowed, if it is not yet.
    pub async fn time_until_next_allowed_refresh(&self) -> Option<Duration> {
        self.shared
            .inner
            .lock()
            .await
            .remaining(self.shared.config.fetch_window(false))
    }
}
