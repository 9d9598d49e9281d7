use super::{network_policy, GeneratorError};
use crate::config::OperatorConfig;
use crate::controller::scope::Scope;
use crate::names::{app_labels, discovery_labels};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::ObjectMeta;
use serde_json::json;

/// Egress from the application to the token broker
///
/// With authz also enabled, a second rule opens the path to the discovery
/// server so the OPA sidecar can fetch its bundle pointer.
pub fn tokenx_egress_policy(
    meta: ObjectMeta,
    scope: &Scope,
    config: &OperatorConfig,
) -> Result<Option<NetworkPolicy>, GeneratorError> {
    if !scope.token_exchange.enabled {
        return Ok(None);
    }
    let app = scope.application_ref();

    let mut egress = vec![json!({
        "to": [{
            "namespaceSelector": {
                "matchLabels": { "kubernetes.io/metadata.name": config.tokenx_namespace }
            },
            "podSelector": { "matchLabels": app_labels(&config.tokenx_name) },
        }],
    })];
    if scope.authz.enabled {
        egress.push(json!({
            "to": [{ "podSelector": { "matchLabels": discovery_labels(app) } }],
        }));
    }

    let spec = json!({
        "podSelector": { "matchLabels": app_labels(app) },
        "policyTypes": ["Egress"],
        "egress": egress,
    });
    network_policy(meta, spec).map(Some)
}
