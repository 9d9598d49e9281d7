//! # Status Aggregation
//!
//! Folds the Descendants of a pass into the SecurityConfig status and writes
//! it through the status subresource.
//!
//! The top-level condition is decided by the first matching rule:
//!
//! 1. invalid configuration
//! 2. a desired resource without a recorded Descendant
//! 3. any failed Descendant
//! 4. Jwker not yet synchronized
//! 5. ready

use crate::controller::scope::{descendant_id, Descendant, Outcome, Scope};
use crate::crd::{Condition, ConditionStatus, Jwker, Phase, SecurityConfig, SecurityConfigStatus};
use crate::names::jwker_name;
use crate::store::{ResourceStore, StoreError};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const PENDING_DESCENDANTS_MESSAGE: &str = "SecurityConfig pending due to missing Descendants.";
pub const FAILED_MESSAGE: &str = "SecurityConfig reconciliation failed.";
pub const PENDING_JWKER_MESSAGE: &str =
    "SecurityConfig pending due to Jwker not being synchronized.";
pub const READY_MESSAGE: &str = "SecurityConfig ready.";

/// Condition type of the top-level condition
#[must_use]
pub fn top_condition_type(security_config_name: &str) -> String {
    format!("SecurityConfig-{security_config_name}")
}

struct Verdict {
    phase: Phase,
    phase_message: String,
    status: ConditionStatus,
    reason: &'static str,
    message: String,
}

fn verdict(scope: &Scope, expected: &[(String, String)], jwker_synchronized: bool) -> Verdict {
    if scope.invalid_config {
        let message = scope.validation_error.clone().unwrap_or_default();
        return Verdict {
            phase: Phase::Invalid,
            phase_message: message.clone(),
            status: ConditionStatus::False,
            reason: "InvalidConfiguration",
            message,
        };
    }

    let recorded = scope.descendants.iter().filter(|d| d.desired).count();
    if recorded != expected.len() {
        return Verdict {
            phase: Phase::Pending,
            phase_message: PENDING_DESCENDANTS_MESSAGE.to_string(),
            status: ConditionStatus::Unknown,
            reason: "ReconciliationPending",
            message: "Descendants of SecurityConfig are not reconciled yet.".to_string(),
        };
    }

    if scope.descendants.iter().any(Descendant::is_error) {
        return Verdict {
            phase: Phase::Failed,
            phase_message: FAILED_MESSAGE.to_string(),
            status: ConditionStatus::False,
            reason: "ReconciliationFailed",
            message: "Descendants of SecurityConfig failed during reconciliation.".to_string(),
        };
    }

    if scope.token_exchange.enabled && !jwker_synchronized {
        return Verdict {
            phase: Phase::Pending,
            phase_message: PENDING_JWKER_MESSAGE.to_string(),
            status: ConditionStatus::Unknown,
            reason: "ReconciliationPending",
            message: format!(
                "Jwker {}/{} has not finished synchronizing.",
                scope.namespace(),
                jwker_name(scope.application_ref())
            ),
        };
    }

    Verdict {
        phase: Phase::Ready,
        phase_message: READY_MESSAGE.to_string(),
        status: ConditionStatus::True,
        reason: "ReconciliationSuccess",
        message: "Descendants of SecurityConfig reconciled successfully.".to_string(),
    }
}

/// Status after a pass
///
/// `expected` lists `(kind, name)` of every resource desired to exist.
/// `now` stamps conditions whose status changed since `previous`.
#[must_use]
pub fn compute_status(
    scope: &Scope,
    expected: &[(String, String)],
    jwker_synchronized: bool,
    previous: Option<&SecurityConfigStatus>,
    now: &str,
) -> SecurityConfigStatus {
    let generation = scope.security_config.metadata.generation;
    let verdict = verdict(scope, expected, jwker_synchronized);

    let condition = |type_: String, status: ConditionStatus, reason: &str, message: String| {
        let last_transition_time = previous
            .and_then(|p| p.condition(&type_))
            .filter(|c| c.status == status)
            .and_then(|c| c.last_transition_time.clone())
            .unwrap_or_else(|| now.to_string());
        Condition {
            r#type: type_,
            status,
            reason: reason.to_string(),
            message,
            last_transition_time: Some(last_transition_time),
            observed_generation: generation,
        }
    };

    let mut conditions = vec![condition(
        top_condition_type(scope.name()),
        verdict.status,
        verdict.reason,
        verdict.message,
    )];

    for descendant in &scope.descendants {
        let (status, reason) = match descendant.outcome {
            Outcome::Success(_) => (ConditionStatus::True, "Success"),
            Outcome::Error(_) => (ConditionStatus::False, "Error"),
        };
        conditions.push(condition(
            descendant.id.clone(),
            status,
            reason,
            descendant.message().to_string(),
        ));
    }

    for (kind, name) in expected {
        let id = descendant_id(kind, name);
        if scope.descendant(&id).is_none() {
            conditions.push(condition(
                id,
                ConditionStatus::False,
                "NotFound",
                format!("Expected resource {name} of kind {kind} was not created"),
            ));
        }
    }

    let mut status = SecurityConfigStatus {
        observed_generation: generation,
        conditions,
        ..SecurityConfigStatus::default()
    };
    status.set_phase(verdict.phase, verdict.phase_message);
    status
}

/// Status of a pass that failed before any resource was converged
#[must_use]
pub fn failure_status(
    security_config: &SecurityConfig,
    message: &str,
    previous: Option<&SecurityConfigStatus>,
    now: &str,
) -> SecurityConfigStatus {
    let generation = security_config.metadata.generation;
    let type_ = top_condition_type(security_config.metadata.name.as_deref().unwrap_or_default());
    let last_transition_time = previous
        .and_then(|p| p.condition(&type_))
        .filter(|c| c.status == ConditionStatus::False)
        .and_then(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| now.to_string());

    let mut status = SecurityConfigStatus {
        observed_generation: generation,
        conditions: vec![Condition {
            r#type: type_,
            status: ConditionStatus::False,
            reason: "ReconciliationFailed".to_string(),
            message: message.to_string(),
            last_transition_time: Some(last_transition_time),
            observed_generation: generation,
        }],
        ..SecurityConfigStatus::default()
    };
    status.set_phase(Phase::Failed, message);
    status
}

/// Whether the Jwker of the scope reports `RolloutComplete`
///
/// A missing or unreadable Jwker counts as not synchronized.
pub async fn jwker_synchronized<S: ResourceStore>(store: &S, scope: &Scope) -> bool {
    if !scope.token_exchange.enabled {
        return true;
    }
    let name = jwker_name(scope.application_ref());
    match store.get::<Jwker>(scope.namespace(), &name).await {
        Ok(jwker) => jwker.is_synchronized(),
        Err(e) => {
            debug!(jwker = %name, error = %e, "Jwker not readable");
            false
        }
    }
}

fn status_patch(resource_version: Option<&str>, status: &SecurityConfigStatus) -> Value {
    match resource_version {
        Some(rv) => json!({ "metadata": { "resourceVersion": rv }, "status": status }),
        None => json!({ "status": status }),
    }
}

/// Write `status`, retrying on Conflict with doubling delays
///
/// Each retry re-reads the object for its latest resourceVersion.
pub async fn write_status_with_retry<S: ResourceStore>(
    store: &S,
    security_config: &SecurityConfig,
    status: &SecurityConfigStatus,
    attempts: u32,
    base_delay: Duration,
) -> Result<(), StoreError> {
    let namespace = security_config.metadata.namespace.as_deref().unwrap_or_default();
    let name = security_config.metadata.name.as_deref().unwrap_or_default();
    let mut resource_version = security_config.metadata.resource_version.clone();
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        let patch = status_patch(resource_version.as_deref(), status);
        match store
            .patch_status::<SecurityConfig>(namespace, name, &patch)
            .await
        {
            Ok(_) => return Ok(()),
            Err(e) if e.is_conflict() && attempt < attempts => {
                warn!(
                    resource.name = name,
                    resource.namespace = namespace,
                    attempt,
                    "Conflict writing status, retrying in {}ms",
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
                let latest: SecurityConfig = store.get(namespace, name).await?;
                resource_version = latest.metadata.resource_version;
            }
            Err(e) => return Err(e),
        }
    }
}
