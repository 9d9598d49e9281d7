use super::{network_policy, GeneratorError};
use crate::config::OperatorConfig;
use crate::constants::OPA_DISCOVERY_CONTAINER_PORT;
use crate::controller::scope::Scope;
use crate::names::{app_labels, discovery_labels};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::ObjectMeta;
use serde_json::json;

/// Lets the application pods reach the discovery server
pub fn discovery_egress_policy(
    meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Result<Option<NetworkPolicy>, GeneratorError> {
    if !scope.authz.enabled {
        return Ok(None);
    }
    let app = scope.application_ref();
    let spec = json!({
        "podSelector": { "matchLabels": app_labels(app) },
        "policyTypes": ["Egress"],
        "egress": [{
            "to": [{ "podSelector": { "matchLabels": discovery_labels(app) } }],
            "ports": [{ "protocol": "TCP", "port": OPA_DISCOVERY_CONTAINER_PORT }],
        }],
    });
    network_policy(meta, spec).map(Some)
}

/// Admits the application pods into the discovery server
pub fn discovery_ingress_policy(
    meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Result<Option<NetworkPolicy>, GeneratorError> {
    if !scope.authz.enabled {
        return Ok(None);
    }
    let app = scope.application_ref();
    let spec = json!({
        "podSelector": { "matchLabels": discovery_labels(app) },
        "policyTypes": ["Ingress"],
        "ingress": [{
            "from": [{ "podSelector": { "matchLabels": app_labels(app) } }],
            "ports": [{ "protocol": "TCP", "port": OPA_DISCOVERY_CONTAINER_PORT }],
        }],
    });
    network_policy(meta, spec).map(Some)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::controller::generators::object_meta;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_egress_selects_app_and_targets_discovery() {
        let scope = scope(false, registry("r:v1"));
        let policy = discovery_egress_policy(object_meta("app-opa-discovery-egress", &scope), &scope, &config())
            .unwrap()
            .unwrap();
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(value["metadata"]["name"], "app-opa-discovery-egress");
        assert_eq!(value["metadata"]["namespace"], "team");
        assert_eq!(value["spec"]["podSelector"]["matchLabels"], json!({"app": "app"}));
        assert_eq!(value["spec"]["policyTypes"], json!(["Egress"]));
        assert_eq!(
            value["spec"]["egress"][0]["to"][0]["podSelector"]["matchLabels"],
            json!({
                "app.kubernetes.io/name": "app-opa-discovery",
                "app.kubernetes.io/component": "opa-discovery"
            })
        );
        assert_eq!(
            value["spec"]["egress"][0]["ports"],
            json!([{"protocol": "TCP", "port": 8080}])
        );
    }

    #[test]
    fn test_ingress_mirrors_egress() {
        let scope = scope(false, registry("r:v1"));
        let policy = discovery_ingress_policy(object_meta("i", &scope), &scope, &config())
            .unwrap()
            .unwrap();
        let value = serde_json::to_value(&policy).unwrap();

        assert_eq!(value["spec"]["policyTypes"], json!(["Ingress"]));
        assert_eq!(
            value["spec"]["podSelector"]["matchLabels"]["app.kubernetes.io/name"],
            "app-opa-discovery"
        );
        assert_eq!(
            value["spec"]["ingress"][0]["from"][0]["podSelector"]["matchLabels"],
            json!({"app": "app"})
        );
    }

    #[test]
    fn test_disabled_yields_none() {
        let scope = scope(true, None);
        assert!(discovery_egress_policy(object_meta("e", &scope), &scope, &config())
            .unwrap()
            .is_none());
        assert!(discovery_ingress_policy(object_meta("i", &scope), &scope, &config())
            .unwrap()
            .is_none());
    }
}
