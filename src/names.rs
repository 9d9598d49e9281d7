//! # Resource names
//!
//! Well-known names and labels of everything the operator generates. Both the
//! generators and the admission engine derive names from here.

use crate::constants::*;
use std::collections::BTreeMap;

/// The Jwker is named after the application it registers
#[must_use]
pub fn jwker_name(application_ref: &str) -> String {
    application_ref.to_string()
}

#[must_use]
pub fn jwker_secret_name(jwker_name: &str) -> String {
    format!("{jwker_name}-{JWKER_SECRET_NAME_SUFFIX}")
}

#[must_use]
pub fn opa_config_name(app: &str) -> String {
    format!("{app}-{OPA_CONFIG_NAME_SUFFIX}")
}

#[must_use]
pub fn discovery_config_name(app: &str) -> String {
    format!("{app}-{OPA_DISCOVERY_CONFIG_NAME_SUFFIX}")
}

/// Name of both the discovery Service and Deployment
#[must_use]
pub fn discovery_name(app: &str) -> String {
    format!("{app}-{OPA_DISCOVERY_NAME_SUFFIX}")
}

#[must_use]
pub fn discovery_egress_name(app: &str) -> String {
    format!("{app}-{OPA_DISCOVERY_EGRESS_NAME_SUFFIX}")
}

#[must_use]
pub fn discovery_ingress_name(app: &str) -> String {
    format!("{app}-{OPA_DISCOVERY_INGRESS_NAME_SUFFIX}")
}

#[must_use]
pub fn tokenx_egress_name(security_config_name: &str, tokenx_name: &str) -> String {
    format!("{security_config_name}-{tokenx_name}-{EGRESS_NAME_SUFFIX}")
}

/// In-cluster URL of the discovery Service
#[must_use]
pub fn discovery_service_url(app: &str, namespace: &str) -> String {
    format!("http://{}.{namespace}.svc.cluster.local", discovery_name(app))
}

/// Labels selecting the discovery server pods
#[must_use]
pub fn discovery_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app.kubernetes.io/name".to_string(), discovery_name(app)),
        (
            "app.kubernetes.io/component".to_string(),
            OPA_DISCOVERY_COMPONENT.to_string(),
        ),
    ])
}

/// Labels selecting the application's own pods
#[must_use]
pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([("app".to_string(), app.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names() {
        assert_eq!(jwker_secret_name(&jwker_name("my-app")), "my-app-jwker-secret");
        assert_eq!(opa_config_name("my-app"), "my-app-opa-config");
        assert_eq!(discovery_config_name("my-app"), "my-app-opa-discovery-config");
        assert_eq!(discovery_name("my-app"), "my-app-opa-discovery");
        assert_eq!(discovery_egress_name("my-app"), "my-app-opa-discovery-egress");
        assert_eq!(discovery_ingress_name("my-app"), "my-app-opa-discovery-ingress");
        assert_eq!(tokenx_egress_name("sc", "tokendings"), "sc-tokendings-egress");
        assert_eq!(
            discovery_service_url("my-app", "team"),
            "http://my-app-opa-discovery.team.svc.cluster.local"
        );
    }
}
