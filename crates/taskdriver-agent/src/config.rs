//! Agent configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding persisted task handles.
    pub state_dir: PathBuf,

    /// Registry name of the driver to use.
    pub driver: String,

    /// Driver-level configuration passed to the driver factory.
    pub driver_config: serde_json::Value,

    /// Grace period given to a task on stop before it is killed.
    pub stop_timeout: Duration,

    /// Signal sent on stop. Empty means the driver default.
    pub stop_signal: String,

    /// Requested stats sampling interval.
    pub stats_interval: Duration,

    /// Maximum `StartTask` attempts, including the first.
    pub start_attempts: u32,

    /// Delay before the first retry; doubles per attempt.
    pub start_backoff: Duration,

    /// Upper bound for the retry delay.
    pub max_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("taskdriver-state"),
            driver: taskdriver_sim::DRIVER_NAME.to_string(),
            driver_config: serde_json::Value::Null,
            stop_timeout: Duration::from_secs(5),
            stop_signal: String::new(),
            stats_interval: Duration::from_secs(1),
            start_attempts: 3,
            start_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.start_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
