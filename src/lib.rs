//! Accesserator Library
//!
//! This library provides the core functionality for the accesserator operator:
//! resolving `SecurityConfig` resources into a scope, converging the owned
//! resources that scope describes, aggregating their outcomes into status, and
//! enforcing the derived sidecar configuration on Pod admission.
//!
//! ## Quick Start
//!
//! ```rust
//! use accesserator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod events;
pub mod names;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;
pub mod sidecar;
pub mod store;
pub mod webhook;
