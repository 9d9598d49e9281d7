//! # Observability
//!
//! Observability modules for metrics.
//!
//! - `metrics`: Prometheus metrics collection
//!
//! Tracing spans and structured logs are emitted inline with `tracing`; the
//! subscriber is installed in `runtime::initialization`.

pub mod metrics;

// Re-export for convenience
pub use metrics::*;
