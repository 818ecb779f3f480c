//! Polling limits.

use std::time::Duration;

/// Configuration for the polling controller.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Minimum time between non-forced fetches.
    pub refresh_cooldown: Duration,
    /// Minimum time between fetches even when forced.
    pub min_force_interval: Duration,
    /// Consecutive failures before polling is paused.
    pub max_consecutive_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            refresh_cooldown: Duration::from_secs(30),
            min_force_interval: Duration::from_secs(5),
            max_consecutive_failures: 3,
        }
    }
}

impl PollingConfig {
    /// Minimum time since the last fetch before the next may start. The
    /// anti-spam floor applies whether or not the fetch is forced.
    pub fn fetch_window(&self, force: bool) -> Duration {
        if force {
            self.min_force_interval
        } else {
            self.refresh_cooldown.max(self.min_force_interval)
        }
    }
}
