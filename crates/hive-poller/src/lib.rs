//! Polling controller for hive.
//!
//! Owns the published job list for one active connection and decides when
//! the cluster may be asked again.

pub mod config;
pub mod controller;
pub mod fetcher;
pub mod profile;
pub mod secrets;
pub mod state;

pub use config::PollingConfig;
pub use controller::{FetchOutcome, PollingController, SkipReason};
pub use fetcher::{FetchError, JobFetcher, SlurmFetcher};
pub use profile::{ConnectionProfile, KEYCHAIN_SERVICE};
pub use secrets::{KeychainError, MemorySecretStore, SecretStore};
pub use state::{PollingSnapshot, PollingState};
