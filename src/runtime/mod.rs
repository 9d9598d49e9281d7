//! # Runtime
//!
//! Process wiring around the reconciler and the admission engine.
//!
//! - `initialization.rs` - tracing, rustls, metrics, servers and the Kubernetes client
//! - `watch_loop.rs` - the `kube_runtime::Controller` over SecurityConfigs and what they own
//! - `error_policy.rs` - per-resource backoff and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

pub use initialization::{initialize, InitializationResult};
pub use watch_loop::run_watch_loop;
