//! hive - Slurm job watcher for a remote cluster.

mod render;

use clap::Parser;
use hive_cli::{AppConfig, Args};
use hive_poller::{
    ConnectionProfile, FetchOutcome, MemorySecretStore, PollingController, SkipReason,
    SlurmFetcher,
};
use hive_ssh::{ConnectionSettings, RemoteExecutor};
use miette::{IntoDiagnostic, Result};
use tokio::time::{MissedTickBehavior, interval};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout only carries job listings
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Args::parse().into_config();

    let mut profile = ConnectionProfile::load(
        MemorySecretStore::new(),
        config.host.as_str(),
        config.username.as_str(),
        config.identity_file.clone(),
    );
    if let Some(password) = &config.password {
        profile.set_password(password.as_str()).into_diagnostic()?;
    }
    if !profile.settings().is_configured() {
        return Err(miette::miette!(
            "Connection not configured: pass --user and --identity"
        ));
    }

    let fetcher = SlurmFetcher::new(
        RemoteExecutor::new(config.ssh.clone()),
        config.remote_command.as_str(),
    );
    let controller = PollingController::new(
        fetcher,
        config.polling.clone(),
        ConnectionSettings::default(),
    );
    let first = controller
        .update_connection(profile.settings().clone())
        .await;

    if config.once {
        run_once(&controller, &config, first).await
    } else {
        watch(&controller, &config).await
    }
}

/// Fetch once, print, and fail if the fetch failed.
async fn run_once(
    controller: &PollingController<SlurmFetcher>,
    config: &AppConfig,
    first: Option<FetchOutcome>,
) -> Result<()> {
    let outcome = match first {
        Some(outcome) => outcome,
        None => controller.fetch(true).await,
    };
    outcome.wait().await;

    let snapshot = controller.snapshot();
    print!(
        "{}",
        render::render(&snapshot, config.max_visible_jobs, config.json).into_diagnostic()?
    );

    match snapshot.state.last_error {
        Some(error) => Err(miette::miette!("{}", error)),
        None => Ok(()),
    }
}

/// Poll on an interval and print whenever a fetch completes.
async fn watch(controller: &PollingController<SlurmFetcher>, config: &AppConfig) -> Result<()> {
    let mut snapshots = controller.subscribe();
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Skip the first tick (fires immediately); the connection update already fetched
    ticker.tick().await;

    let mut last_output = String::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match controller.fetch(false).await {
                    FetchOutcome::Started(_) => {}
                    FetchOutcome::Skipped(SkipReason::Cooldown { remaining }) => {
                        tracing::debug!("Cooldown active, retrying in {:?}", remaining);
                        ticker.reset_after(remaining);
                    }
                    FetchOutcome::Skipped(reason) => {
                        tracing::debug!("Poll skipped: {:?}", reason);
                    }
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.state.is_fetching {
                    continue;
                }
                let output = render::render(&snapshot, config.max_visible_jobs, config.json)
                    .into_diagnostic()?;
                if output != last_output {
                    print!("{}", output);
                    last_output = output;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, exiting");
                return Ok(());
            }
        }
    }
}
