//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::env_var_or_default;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Periodic resync interval for SecurityConfigs that are not Pending (seconds)
    pub reconcile_interval_secs: u64,
    /// Requeue interval while a SecurityConfig is Pending (seconds)
    pub pending_requeue_secs: u64,
    /// Lower bound of the error policy backoff (seconds)
    pub error_backoff_min_secs: u64,
    /// Upper bound of the error policy backoff (seconds)
    pub error_backoff_max_secs: u64,
    /// Attempts made when a status write conflicts
    pub status_update_attempts: u32,
    /// First delay between conflicting status writes (milliseconds)
    pub status_update_backoff_ms: u64,
    /// Watch stream restart delay after an error (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// First backoff when the API server throttles the watch (milliseconds)
    pub watch_backoff_start_ms: u64,
    /// Upper bound of the watch throttling backoff (milliseconds)
    pub watch_backoff_max_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            pending_requeue_secs: DEFAULT_PENDING_REQUEUE_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            status_update_attempts: DEFAULT_STATUS_UPDATE_ATTEMPTS,
            status_update_backoff_ms: DEFAULT_STATUS_UPDATE_BACKOFF_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            watch_backoff_start_ms: DEFAULT_WATCH_BACKOFF_START_MS,
            watch_backoff_max_ms: DEFAULT_WATCH_BACKOFF_MAX_MS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            reconcile_interval_secs: env_var_or_default(
                "RECONCILE_INTERVAL_SECS",
                DEFAULT_RECONCILE_INTERVAL_SECS,
            ),
            pending_requeue_secs: env_var_or_default(
                "PENDING_REQUEUE_SECS",
                DEFAULT_PENDING_REQUEUE_SECS,
            ),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            status_update_attempts: env_var_or_default(
                "STATUS_UPDATE_ATTEMPTS",
                DEFAULT_STATUS_UPDATE_ATTEMPTS,
            )
            .max(1),
            status_update_backoff_ms: env_var_or_default(
                "STATUS_UPDATE_BACKOFF_MS",
                DEFAULT_STATUS_UPDATE_BACKOFF_MS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            watch_backoff_start_ms: env_var_or_default(
                "WATCH_BACKOFF_START_MS",
                DEFAULT_WATCH_BACKOFF_START_MS,
            ),
            watch_backoff_max_ms: env_var_or_default(
                "WATCH_BACKOFF_MAX_MS",
                DEFAULT_WATCH_BACKOFF_MAX_MS,
            ),
        }
    }

    /// Get periodic resync duration
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Get Pending requeue duration
    pub fn pending_requeue(&self) -> Duration {
        Duration::from_secs(self.pending_requeue_secs)
    }

    /// Get first status write retry delay
    pub fn status_update_backoff(&self) -> Duration {
        Duration::from_millis(self.status_update_backoff_ms)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = ControllerConfig::default();
        assert_eq!(config.reconcile_interval(), Duration::from_secs(300));
        assert_eq!(config.pending_requeue(), Duration::from_secs(10));
        assert_eq!(config.status_update_attempts, 5);
        assert_eq!(config.status_update_backoff(), Duration::from_millis(100));
    }
}
