//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::SecurityConfig;
use crate::observability;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

/// Requeue a failed SecurityConfig with per-resource Fibonacci backoff
///
/// Backoff state is tracked per `namespace/name` so one failing resource does
/// not slow down the others. A clean pass resets it.
pub fn handle_reconciliation_error<S>(
    obj: Arc<SecurityConfig>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<S>>,
) -> Action {
    let name = obj.metadata.name.as_deref().unwrap_or("unknown");
    let namespace = obj.metadata.namespace.as_deref().unwrap_or("default");

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name,
        resource.namespace = namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error);
    observability::increment_reconciliation_errors();

    let resource_key = format!("{namespace}/{name}");
    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(resource_key)
                .or_insert_with(|| BackoffState::new(&ctx.controller_config));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
            (ctx.controller_config.error_backoff_min_secs, 0)
        }
    };

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        backoff_seconds, error_count
    );

    observability::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Kind of failure reported by the controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// 401: RBAC revoked or token expired
    Unauthorized,
    /// 410: resource version too old, normal after restarts
    Expired,
    /// 429: API server storage reinitializing
    Throttled,
    /// 404: object deleted or CRD missing
    NotFound,
    Other,
}

/// Classify a controller stream error by its rendered message
///
/// 404 is checked first: a plain-text 404 body surfaces as a serde error
/// wrapped in `WatchFailed`, which would otherwise look like an auth failure.
#[must_use]
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 = error_string.contains("401") || error_string.contains("Unauthorized");
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 && !is_not_found {
        WatchErrorClass::Unauthorized
    } else if is_410 {
        WatchErrorClass::Expired
    } else if is_429 {
        WatchErrorClass::Throttled
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Other
    }
}

/// Handle an error item of the controller stream
///
/// A failed reconcile has already been requeued by
/// [`handle_reconciliation_error`], so it is passed through without delay.
/// Everything else is a watch or queue failure and goes to
/// [`handle_watch_stream_error`].
pub async fn handle_controller_error<E>(
    error: &controller::Error<E, watcher::Error>,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()>
where
    E: std::error::Error + 'static,
{
    if let controller::Error::ReconcilerFailed(reconcile_error, object_ref) = error {
        debug!(
            resource = %object_ref,
            error = %reconcile_error,
            "Reconcile failed, requeued with backoff"
        );
        return Some(());
    }
    handle_watch_stream_error(
        &format!("{error:?}"),
        backoff,
        max_backoff_ms,
        watch_restart_delay,
    )
    .await
}

/// Handle a watch or queue failure by its rendered message
///
/// Returns `None` to drop the item from the stream, after sleeping where the
/// error class calls for it, or `Some(())` to keep it.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );

    async {
        match classify_watch_error(error_string) {
            WatchErrorClass::Unauthorized => {
                error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
                error!("Check that the accesserator ServiceAccount can still list SecurityConfigs:");
                error!(
                    "  kubectl auth can-i list securityconfigs.accesserator.kartverket.no --as=system:serviceaccount:<namespace>:accesserator --all-namespaces"
                );
                warn!(
                    "Waiting {}s before retrying watch (RBAC may need time to propagate)...",
                    watch_restart_delay.as_secs()
                );
                tokio::time::sleep(watch_restart_delay).await;
                None
            }
            WatchErrorClass::Expired => {
                warn!(error_type = "410", "Watch resource version expired, watch will restart");
                None
            }
            WatchErrorClass::Throttled => {
                let current_backoff = backoff.load(Ordering::Relaxed);
                warn!(
                    "API server storage reinitializing (429), backing off for {}ms before restart...",
                    current_backoff
                );
                tokio::time::sleep(Duration::from_millis(current_backoff)).await;
                backoff.store(
                    current_backoff.saturating_mul(2).min(max_backoff_ms),
                    Ordering::Relaxed,
                );
                None
            }
            WatchErrorClass::NotFound => {
                warn!(
                    "Resource not found (404) - normal when an object was deleted mid-reconcile. Error: {}",
                    error_string
                );
                Some(())
            }
            WatchErrorClass::Other => {
                error!("Controller stream error: {}", error_string);
                tokio::time::sleep(watch_restart_delay).await;
                None
            }
        }
    }
    .instrument(error_span)
    .await
}
