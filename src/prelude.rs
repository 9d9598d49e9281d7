//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use accesserator::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (SecurityConfig, Application, Jwker, etc.)
//! - The resource store trait and its implementations
//! - Reconciler types (Reconciler, ReconcilerError, etc.)
//! - Config types (OperatorConfig, ControllerConfig, ServerConfig)
//! - The admission engine entry points

// CRD types - most commonly used
pub use crate::crd::*;

// Store - every cluster read and write goes through it
pub use crate::store::{KubeStore, MemoryStore, ResourceStore, StoreError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{reconcile, run_pass, Reconciler, ReconcilerError};
pub use crate::controller::scope::Scope;

// Config types - for configuration management
pub use crate::config::{ConfigError, ControllerConfig, OperatorConfig, ServerConfig};

// Events
pub use crate::events::{EventPublisher, KubeEventPublisher};

// Admission
pub use crate::webhook::{
    default_pod, resolve_pod_security_configuration, validate_pod, AdmissionError,
    PodSecurityConfiguration,
};
