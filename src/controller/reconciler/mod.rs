//! # Reconciler
//!
//! Core reconciliation logic for `SecurityConfig` resources.
//!
//! The reconciler:
//! - Resolves the SecurityConfig and its Application into a Scope
//! - Generates the Jwker, OPA ConfigMaps, discovery server and NetworkPolicies
//! - Creates, patches or deletes each owned resource
//! - Aggregates the outcomes into the SecurityConfig status
//!
//! ## Reconciliation Flow
//!
//! 1. Load the latest SecurityConfig; skip it when gone or being deleted
//! 2. Resolve; on failure write a Failed status and back off
//! 3. Converge every desired resource in a fixed order, collecting failures
//! 4. Compute and write status
//! 5. Requeue: quickly while Pending, at the resync interval otherwise

pub mod desired;
pub mod engine;
pub mod kinds;
pub mod reconcile;
pub mod status;
pub mod types;

// Re-export public API
pub use desired::{Desired, DesiredResource};
pub use engine::{converge, AggregateError, ConvergenceError};
pub use kinds::OwnedKind;
pub use reconcile::{reconcile, run_pass};
pub use status::{compute_status, failure_status, jwker_synchronized, write_status_with_retry};
pub use types::{BackoffState, Reconciler, ReconcilerError};
