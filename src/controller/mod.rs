//! # Controller
//!
//! Core controller modules for the accesserator operator.
//!
//! - `backoff`: Fibonacci backoff for failed reconciles
//! - `scope`: per-pass state of one SecurityConfig
//! - `resolver`: SecurityConfig plus cluster state into a Scope
//! - `generators`: desired owned resources from a Scope
//! - `reconciler`: convergence, status aggregation and the reconcile pass

pub mod backoff;
pub mod generators;
pub mod reconciler;
pub mod resolver;
pub mod scope;
