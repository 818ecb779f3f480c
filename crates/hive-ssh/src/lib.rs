//! Remote command execution for hive.
//!
//! Shells out to the system `ssh` client with hard timeouts and optional
//! password injection through a short-lived askpass helper.

pub mod askpass;
pub mod connection;
pub mod executor;
pub mod preamble;

pub use askpass::AskpassScript;
pub use connection::ConnectionSettings;
pub use executor::{RemoteExecutor, SshConfig, SshError};
pub use preamble::{ModuleSetup, shell_quote, wrap_remote_command};
