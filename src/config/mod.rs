//! # Configuration
//!
//! Process configuration loaded once at startup and treated as immutable for
//! the lifetime of the process.
//!
//! - `operator`: `ACCESSERATOR_*` settings that shape generated resources and sidecars
//! - `controller`: reconcile cadence, backoff and status write retry
//! - `server`: HTTP listener ports and startup polling

mod controller;
mod operator;
mod server;

pub use controller::ControllerConfig;
pub use operator::{ConfigError, OperatorConfig};
pub use server::ServerConfig;

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
