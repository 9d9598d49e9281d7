//! # Types
//!
//! Core types for the reconciler.

use super::engine::AggregateError;
use crate::config::{ControllerConfig, OperatorConfig};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::generators::GeneratorError;
use crate::controller::resolver::ResolutionError;
use crate::events::EventPublisher;
use crate::store::{KubeStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{0}")]
    Convergence(AggregateError),
    #[error("failed to generate desired resources: {0}")]
    Generation(#[from] GeneratorError),
    #[error("failed to read SecurityConfig: {0}")]
    Store(#[from] StoreError),
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            backoff: FibonacciBackoff::new(
                config.error_backoff_min_secs,
                config.error_backoff_max_secs,
            ),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context of every reconcile pass
pub struct Reconciler<S = KubeStore> {
    pub config: Arc<OperatorConfig>,
    pub controller_config: ControllerConfig,
    pub store: S,
    pub events: Arc<dyn EventPublisher>,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl<S> std::fmt::Debug for Reconciler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

impl<S> Reconciler<S> {
    pub fn new(
        config: Arc<OperatorConfig>,
        controller_config: ControllerConfig,
        store: S,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            config,
            controller_config,
            store,
            events,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of `resource_key` after a clean pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(resource_key) {
                state.reset();
            }
        }
    }
}
