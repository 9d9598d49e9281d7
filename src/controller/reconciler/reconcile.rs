//! # Reconciliation Logic
//!
//! One reconcile pass of a SecurityConfig: resolve, generate, converge every
//! owned resource, then aggregate and write status.
//!
//! A failed convergence does not stop the pass. Every resource is attempted,
//! status is always written, and the collected failures are returned so the
//! error policy can back off.

use super::engine::{converge, AggregateError};
use super::status::{compute_status, failure_status, jwker_synchronized, write_status_with_retry};
use super::types::{Reconciler, ReconcilerError};
use crate::config::{ControllerConfig, OperatorConfig};
use crate::controller::generators::desired_resources;
use crate::controller::resolver::resolve;
use crate::crd::{Phase, SecurityConfig, SecurityConfigStatus};
use crate::events::{actions, reasons, EventPublisher};
use crate::observability;
use crate::store::ResourceStore;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::EventType;
use kube::Resource;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn, Instrument};

/// Entry point called by the controller for every trigger
pub async fn reconcile<S: ResourceStore>(
    security_config: Arc<SecurityConfig>,
    ctx: Arc<Reconciler<S>>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let name = security_config.metadata.name.clone().unwrap_or_default();
    let namespace = security_config.metadata.namespace.clone().unwrap_or_default();

    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.kind = "SecurityConfig",
        resource.generation = security_config.metadata.generation.unwrap_or(0)
    );

    observability::increment_reconciliations();
    let result = run_pass(
        &ctx.store,
        ctx.events.as_ref(),
        &ctx.config,
        &ctx.controller_config,
        &security_config,
    )
    .instrument(span)
    .await;
    observability::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    match &result {
        Ok(action) => {
            ctx.reset_backoff(&format!("{namespace}/{name}"));
            debug!(resource.name = name.as_str(), action = ?action, "Reconcile pass finished");
        }
        Err(e) => {
            error!(resource.name = name.as_str(), error = %e, "Reconcile pass failed");
        }
    }
    result
}

/// One pass over the latest state of `trigger`
///
/// Generic over the store and event sink so it runs unchanged against an
/// in-memory cluster.
pub async fn run_pass<S: ResourceStore>(
    store: &S,
    events: &dyn EventPublisher,
    config: &OperatorConfig,
    controller_config: &ControllerConfig,
    trigger: &SecurityConfig,
) -> Result<Action, ReconcilerError> {
    let namespace = trigger.metadata.namespace.clone().unwrap_or_default();
    let name = trigger.metadata.name.clone().unwrap_or_default();

    let security_config: SecurityConfig = match store.get(&namespace, &name).await {
        Ok(latest) => latest,
        Err(e) if e.is_not_found() => {
            debug!("SecurityConfig {namespace}/{name} is gone");
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };
    if security_config.metadata.deletion_timestamp.is_some() {
        debug!("SecurityConfig {namespace}/{name} is being deleted");
        return Ok(Action::await_change());
    }

    info!("Reconciling SecurityConfig {namespace}/{name}");
    let object_ref = security_config.object_ref(&());
    let previous = security_config.status.clone();
    events
        .publish(
            &object_ref,
            EventType::Normal,
            reasons::RECONCILE_STARTED,
            actions::RECONCILE,
            None,
        )
        .await;

    let writer = StatusWriter {
        store,
        events,
        controller_config,
        security_config: &security_config,
        object_ref: &object_ref,
        previous: previous.as_ref(),
    };

    let mut scope = match resolve(store, &security_config).await {
        Ok(scope) => scope,
        Err(e) => {
            let message = e.to_string();
            warn!("{message}");
            writer
                .write(&failure_status(&security_config, &message, previous.as_ref(), &now()))
                .await;
            fail(events, &object_ref, &message).await;
            return Err(e.into());
        }
    };

    let desired = if scope.invalid_config {
        warn!(
            "SecurityConfig {namespace}/{name} is invalid: {}",
            scope.validation_error.as_deref().unwrap_or_default()
        );
        Vec::new()
    } else {
        match desired_resources(&scope, config) {
            Ok(desired) => desired,
            Err(e) => {
                let message = e.to_string();
                writer
                    .write(&failure_status(&security_config, &message, previous.as_ref(), &now()))
                    .await;
                fail(events, &object_ref, &message).await;
                return Err(e.into());
            }
        }
    };

    let expected: Vec<(String, String)> = desired
        .iter()
        .filter(|r| r.is_present())
        .map(|r| (r.kind().to_string(), r.name().to_string()))
        .collect();

    let mut failures = AggregateError::default();
    for resource in desired {
        let kind = resource.kind();
        match converge(store, &mut scope, &security_config, resource).await {
            Ok(()) => {
                observability::record_resource_converged(kind, true);
                events
                    .publish(
                        &object_ref,
                        EventType::Normal,
                        &reasons::reconciled(kind),
                        actions::RECONCILE,
                        None,
                    )
                    .await;
            }
            Err(e) => {
                warn!(kind, name = e.name.as_str(), error = ?e.source, "{}", e.message);
                observability::record_resource_converged(kind, false);
                events
                    .publish(
                        &object_ref,
                        EventType::Warning,
                        &reasons::reconcile_failed(kind),
                        actions::RECONCILE,
                        Some(e.message.clone()),
                    )
                    .await;
                failures.0.push(e);
            }
        }
    }

    let synchronized = jwker_synchronized(store, &scope).await;
    let status = compute_status(&scope, &expected, synchronized, previous.as_ref(), &now());
    writer.write(&status).await;

    if !failures.is_empty() {
        fail(events, &object_ref, &failures.to_string()).await;
        return Err(ReconcilerError::Convergence(failures));
    }

    events
        .publish(
            &object_ref,
            EventType::Normal,
            reasons::RECONCILE_SUCCESS,
            actions::RECONCILE,
            status.message.clone(),
        )
        .await;

    if status.phase == Some(Phase::Pending) {
        observability::increment_requeues_total("pending");
        Ok(Action::requeue(controller_config.pending_requeue()))
    } else {
        observability::increment_requeues_total("resync");
        Ok(Action::requeue(controller_config.reconcile_interval()))
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

async fn fail(events: &dyn EventPublisher, object_ref: &ObjectReference, message: &str) {
    events
        .publish(
            object_ref,
            EventType::Warning,
            reasons::RECONCILE_FAILED,
            actions::RECONCILE,
            Some(message.to_string()),
        )
        .await;
}

struct StatusWriter<'a, S> {
    store: &'a S,
    events: &'a dyn EventPublisher,
    controller_config: &'a ControllerConfig,
    security_config: &'a SecurityConfig,
    object_ref: &'a ObjectReference,
    previous: Option<&'a SecurityConfigStatus>,
}

impl<S: ResourceStore> StatusWriter<'_, S> {
    /// Write unless nothing but transition times changed
    ///
    /// Failures are reported and logged but never fail the pass.
    async fn write(&self, status: &SecurityConfigStatus) {
        if self
            .previous
            .is_some_and(|previous| previous.semantically_equal(status))
        {
            debug!("Status unchanged, skipping write");
            return;
        }

        let result = write_status_with_retry(
            self.store,
            self.security_config,
            status,
            self.controller_config.status_update_attempts,
            self.controller_config.status_update_backoff(),
        )
        .await;

        match result {
            Ok(()) => {
                observability::record_status_update("success");
                self.events
                    .publish(
                        self.object_ref,
                        EventType::Normal,
                        reasons::STATUS_UPDATE_SUCCESS,
                        actions::UPDATE_STATUS,
                        None,
                    )
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Failed to update SecurityConfig status");
                observability::record_status_update("error");
                self.events
                    .publish(
                        self.object_ref,
                        EventType::Warning,
                        reasons::STATUS_UPDATE_FAILED,
                        actions::UPDATE_STATUS,
                        Some(e.to_string()),
                    )
                    .await;
            }
        }
    }
}
