//! Admission transport
//!
//! Defaulting answers with a JSON Patch from the submitted Pod to the
//! defaulted one. Lookup failures deny the request.

use super::{default_pod, resolve_pod_security_configuration, validate_pod, AdmissionError};
use crate::config::OperatorConfig;
use crate::observability;
use crate::store::ResourceStore;
use axum::{extract::State, routing::post, Json, Router};
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const MUTATE_PATH: &str = "/mutate--v1-pod";
pub const VALIDATE_PATH: &str = "/validate--v1-pod";

pub struct WebhookState<S> {
    pub store: S,
    pub config: Arc<OperatorConfig>,
}

impl<S> std::fmt::Debug for WebhookState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub fn router<S: ResourceStore + 'static>(state: Arc<WebhookState<S>>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_handler::<S>))
        .route(VALIDATE_PATH, post(validate_handler::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_webhook_server<S: ResourceStore + 'static>(
    port: u16,
    state: Arc<WebhookState<S>>,
) -> Result<(), anyhow::Error> {
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr).await?;

    info!("Admission server listening on {}", addr);

    axum::serve(listener, router(state)).await?;

    Ok(())
}

async fn mutate_handler<S: ResourceStore + 'static>(
    State(state): State<Arc<WebhookState<S>>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let start = Instant::now();
    let request: AdmissionRequest<Pod> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = mutate(&state, &request).await;
    observability::record_admission("mutate", response.allowed, start.elapsed().as_secs_f64());
    Json(response.into_review())
}

async fn validate_handler<S: ResourceStore + 'static>(
    State(state): State<Arc<WebhookState<S>>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let start = Instant::now();
    let request: AdmissionRequest<Pod> = match review.try_into() {
        Ok(request) => request,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(AdmissionResponse::invalid(e.to_string()).into_review());
        }
    };

    let response = validate(&state, &request).await;
    observability::record_admission("validate", response.allowed, start.elapsed().as_secs_f64());
    Json(response.into_review())
}

async fn mutate<S: ResourceStore>(
    state: &WebhookState<S>,
    request: &AdmissionRequest<Pod>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if request.operation == Operation::Delete {
        return response;
    }
    let Some(pod) = request.object.as_ref() else {
        debug!(uid = %request.uid, "No Pod in request, allowing unchanged");
        return response;
    };

    debug!(uid = %request.uid, name = ?pod.metadata.name, "Defaulting Pod");
    let expected = match resolve(state, request, pod).await {
        Ok(expected) => expected,
        Err(e) => {
            warn!(uid = %request.uid, error = %e, "Failed to default Pod");
            return response.deny(e.to_string());
        }
    };
    if !expected.security_enabled {
        return response;
    }

    let mut defaulted = pod.clone();
    default_pod(&mut defaulted, &expected);
    let patch = match (serde_json::to_value(pod), serde_json::to_value(&defaulted)) {
        (Ok(before), Ok(after)) => json_patch::diff(&before, &after),
        (Err(e), _) | (_, Err(e)) => {
            error!(uid = %request.uid, error = %e, "Failed to serialize Pod");
            return response.deny(format!("failed to serialize Pod: {e}"));
        }
    };

    match response.clone().with_patch(patch) {
        Ok(patched) => patched,
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Failed to serialize patch");
            response.deny(format!("patch serialization error: {e}"))
        }
    }
}

async fn validate<S: ResourceStore>(
    state: &WebhookState<S>,
    request: &AdmissionRequest<Pod>,
) -> AdmissionResponse {
    let response = AdmissionResponse::from(request);
    if request.operation == Operation::Delete {
        debug!(uid = %request.uid, name = %request.name, "Pod deletion is always admitted");
        return response;
    }
    let Some(pod) = request.object.as_ref() else {
        return response.deny(
            AdmissionError::InvalidObject("request carries no object".to_string()).to_string(),
        );
    };

    let outcome = match resolve(state, request, pod).await {
        Ok(expected) => validate_pod(pod, &expected),
        Err(e) => Err(e),
    };
    match outcome {
        Ok(()) => response,
        Err(e) => {
            warn!(uid = %request.uid, name = ?pod.metadata.name, error = %e, "Denying Pod");
            response.deny(e.to_string())
        }
    }
}

/// Resolve with the request namespace standing in for a missing Pod namespace
async fn resolve<S: ResourceStore>(
    state: &WebhookState<S>,
    request: &AdmissionRequest<Pod>,
    pod: &Pod,
) -> Result<super::PodSecurityConfiguration, AdmissionError> {
    if pod.metadata.namespace.is_some() {
        return resolve_pod_security_configuration(&state.store, pod, &state.config).await;
    }
    let mut scoped = pod.clone();
    scoped.metadata.namespace = request.namespace.clone();
    resolve_pod_security_configuration(&state.store, &scoped, &state.config).await
}
