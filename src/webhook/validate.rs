use super::{AdmissionError, PodSecurityConfiguration};
use crate::sidecar::{OPA_CONTAINER_NAME, TEXAS_CONTAINER_NAME};
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod};
use tracing::info;

/// Reject `pod` unless it carries exactly the sidecars `expected` derives
pub fn validate_pod(pod: &Pod, expected: &PodSecurityConfiguration) -> Result<(), AdmissionError> {
    if !expected.security_enabled {
        return Ok(());
    }
    let init_containers = pod
        .spec
        .as_ref()
        .and_then(|spec| spec.init_containers.as_deref())
        .unwrap_or_default();
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default();

    if let (Some(texas), Some(env)) = (&expected.texas_container, &expected.texas_url_env) {
        let Some(actual) = init_containers.iter().find(|c| c.name == TEXAS_CONTAINER_NAME) else {
            info!(application = %expected.app_name, "TokenX is enabled but texas init container is missing");
            return Err(AdmissionError::Validation(format!(
                "TokenX is enabled but init container '{TEXAS_CONTAINER_NAME}' is missing"
            )));
        };
        if !sidecar_matches(texas, actual) {
            return Err(AdmissionError::Validation(
                "texas init container is not as expected given the SecurityConfig".to_string(),
            ));
        }
        if !app_has_env(containers, &expected.app_name, env) {
            return Err(AdmissionError::Validation(format!(
                "TokenX is enabled but container '{}' is missing environment variable '{}'",
                expected.app_name, env.name
            )));
        }
    }

    if let (Some(opa), Some(env)) = (&expected.opa_container, &expected.opa_url_env) {
        let Some(actual) = init_containers.iter().find(|c| c.name == OPA_CONTAINER_NAME) else {
            info!(application = %expected.app_name, "Opa is enabled but opa init container is missing");
            return Err(AdmissionError::Validation(format!(
                "Opa is enabled but init container '{OPA_CONTAINER_NAME}' is missing"
            )));
        };
        if !sidecar_matches(opa, actual) {
            return Err(AdmissionError::Validation(
                "opa init container is not as expected given the SecurityConfig".to_string(),
            ));
        }
        if !app_has_env(containers, &expected.app_name, env) {
            return Err(AdmissionError::Validation(format!(
                "Opa is enabled but {} env var is missing for pod from skiperator app with name {}/{}",
                env.name, expected.namespace, expected.app_name
            )));
        }
    }

    Ok(())
}

/// Whether `actual` is the sidecar `expected` describes
///
/// Volume mounts, resources and probes are not compared; the API server and
/// other admission plugins may legitimately change them.
#[must_use]
pub fn sidecar_matches(expected: &Container, actual: &Container) -> bool {
    expected.name == actual.name
        && expected.image == actual.image
        && expected.args == actual.args
        && expected.env == actual.env
        && expected.env_from == actual.env_from
        && expected.ports == actual.ports
        && expected.restart_policy == actual.restart_policy
        && expected.security_context == actual.security_context
        && expected.termination_message_path == actual.termination_message_path
        && expected.termination_message_policy == actual.termination_message_policy
}

/// The first container named `app_name` carries `env` with the expected value
fn app_has_env(containers: &[Container], app_name: &str, env: &EnvVar) -> bool {
    containers
        .iter()
        .find(|c| c.name == app_name)
        .and_then(|c| c.env.as_ref())
        .is_some_and(|vars| vars.iter().any(|v| v.name == env.name && v.value == env.value))
}
