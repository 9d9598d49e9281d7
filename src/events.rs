//! Kubernetes Event recording.
//!
//! A trait over `kube::runtime::events::Recorder` so the reconcile pass can emit
//! Events visible via `kubectl describe securityconfig`.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate. A failed event must never break reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{EventType, Recorder, Reporter};
use kube::Client;
use std::sync::{Mutex, PoisonError};
use tracing::warn;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on `resource_ref`
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventPublisher").finish_non_exhaustive()
    }
}

impl KubeEventPublisher {
    /// The controller name is reported as the Event's `reportingComponent`
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = kube::runtime::events::Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// Drops every event.
#[derive(Debug, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub warning: bool,
    pub reason: String,
    pub action: String,
    pub note: Option<String>,
}

/// Keeps every published event in memory, in publish order.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEventPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let object = format!(
            "{}/{}",
            resource_ref.namespace.as_deref().unwrap_or_default(),
            resource_ref.name.as_deref().unwrap_or_default()
        );
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                object,
                warning: matches!(type_, EventType::Warning),
                reason: reason.to_string(),
                action: action.to_string(),
                note,
            });
    }
}

/// Well-known event reason strings.
///
/// Per-resource reasons are built with [`reasons::reconciled`] and
/// [`reasons::reconcile_failed`], e.g. `JwkerReconciledSuccessfully`.
pub mod reasons {
    pub const RECONCILE_STARTED: &str = "ReconcileStarted";
    pub const RECONCILE_SUCCESS: &str = "ReconcileSuccess";
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
    pub const STATUS_UPDATE_SUCCESS: &str = "StatusUpdateSuccess";
    pub const STATUS_UPDATE_FAILED: &str = "StatusUpdateFailed";

    #[must_use]
    pub fn reconciled(kind: &str) -> String {
        format!("{kind}ReconciledSuccessfully")
    }

    #[must_use]
    pub fn reconcile_failed(kind: &str) -> String {
        format!("{kind}ReconcileFailed")
    }
}

/// Well-known event action strings.
pub mod actions {
    pub const RECONCILE: &str = "Reconcile";
    pub const UPDATE_STATUS: &str = "UpdateStatus";
}
