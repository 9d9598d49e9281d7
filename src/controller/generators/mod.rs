//! # Resource Generators
//!
//! Pure functions from a resolved [`Scope`] to the objects the operator owns.
//! Each generator returns `None` when its feature is disabled, which the
//! engine reads as "must not exist".
//!
//! - `jwker.rs` - Jwker client registration
//! - `tokenx_egress.rs` - egress to the token broker
//! - `opa_config.rs` - OPA configuration ConfigMap
//! - `discovery.rs` - discovery ConfigMap, Service and Deployment
//! - `discovery_policies.rs` - network policies around the discovery server

mod discovery;
mod discovery_policies;
mod jwker;
mod opa_config;
mod tokenx_egress;

pub use discovery::{
    discovery_config, discovery_deployment, discovery_service, read_discovery_document,
};
pub use discovery_policies::{discovery_egress_policy, discovery_ingress_policy};
pub use jwker::jwker;
pub use opa_config::{opa_config, OpaConfigDocument};
pub use tokenx_egress::tokenx_egress_policy;

use crate::config::OperatorConfig;
use crate::controller::reconciler::{Desired, DesiredResource};
use crate::controller::scope::Scope;
use crate::names;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::ObjectMeta;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("failed to build discovery bundle: {0}")]
    Archive(#[from] std::io::Error),
    #[error("failed to render OPA configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to build {kind}: {source}")]
    Json {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Metadata every generated object starts from
pub(crate) fn object_meta(name: &str, scope: &Scope) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(scope.namespace().to_string()),
        ..ObjectMeta::default()
    }
}

/// NetworkPolicy from a JSON spec
pub(crate) fn network_policy(meta: ObjectMeta, spec: Value) -> Result<NetworkPolicy, GeneratorError> {
    serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "NetworkPolicy",
        "metadata": meta,
        "spec": spec,
    }))
    .map_err(|source| GeneratorError::Json {
        kind: "NetworkPolicy",
        source,
    })
}

/// Every owned resource in convergence order
///
/// Disabled features still yield an entry, with no object, so stale
/// resources get deleted.
pub fn desired_resources(
    scope: &Scope,
    config: &OperatorConfig,
) -> Result<Vec<DesiredResource>, GeneratorError> {
    let app = scope.application_ref();

    let jwker_name = names::jwker_name(app);
    let tokenx_egress_name = names::tokenx_egress_name(scope.name(), &config.tokenx_name);
    let opa_config_name = names::opa_config_name(app);
    let discovery_config_name = names::discovery_config_name(app);
    let discovery_name = names::discovery_name(app);
    let discovery_egress_name = names::discovery_egress_name(app);
    let discovery_ingress_name = names::discovery_ingress_name(app);

    Ok(vec![
        DesiredResource::Jwker(Desired {
            object: jwker(object_meta(&jwker_name, scope), scope, config),
            name: jwker_name,
        }),
        DesiredResource::NetworkPolicy(Desired {
            object: tokenx_egress_policy(object_meta(&tokenx_egress_name, scope), scope, config)?,
            name: tokenx_egress_name,
        }),
        DesiredResource::ConfigMap(Desired {
            object: opa_config(object_meta(&opa_config_name, scope), scope, config)?,
            name: opa_config_name,
        }),
        DesiredResource::ConfigMap(Desired {
            object: discovery_config(object_meta(&discovery_config_name, scope), scope, config)?,
            name: discovery_config_name,
        }),
        DesiredResource::Service(Desired {
            object: discovery_service(object_meta(&discovery_name, scope), scope, config),
            name: discovery_name.clone(),
        }),
        DesiredResource::Deployment(Desired {
            object: discovery_deployment(object_meta(&discovery_name, scope), scope, config),
            name: discovery_name,
        }),
        DesiredResource::NetworkPolicy(Desired {
            object: discovery_egress_policy(object_meta(&discovery_egress_name, scope), scope, config)?,
            name: discovery_egress_name,
        }),
        DesiredResource::NetworkPolicy(Desired {
            object: discovery_ingress_policy(object_meta(&discovery_ingress_name, scope), scope, config)?,
            name: discovery_ingress_name,
        }),
    ])
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::OperatorConfig;
    use crate::controller::scope::{AuthzConfig, BundleSource, Scope, TokenExchangeConfig};
    use crate::crd::{SecurityConfig, SecurityConfigSpec};

    pub fn config() -> OperatorConfig {
        OperatorConfig::from_lookup(|key| match key {
            "ACCESSERATOR_CLUSTER_NAME" => Some("atkv3-dev".to_string()),
            "ACCESSERATOR_TOKENX_NAMESPACE" => Some("obo".to_string()),
            "ACCESSERATOR_TEXAS_IMAGE_TAG" => Some("v1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    pub fn scope(tokenx: bool, bundle: Option<BundleSource>) -> Scope {
        let mut sc = SecurityConfig::new(
            "sc",
            SecurityConfigSpec {
                application_ref: "app".to_string(),
                ..Default::default()
            },
        );
        sc.metadata.namespace = Some("team".to_string());
        let mut scope = Scope::new(sc);
        scope.token_exchange = TokenExchangeConfig {
            enabled: tokenx,
            access_policy: None,
        };
        scope.authz = AuthzConfig {
            enabled: bundle.is_some(),
            bundle,
        };
        scope
    }

    pub fn registry(reference: &str) -> Option<BundleSource> {
        Some(BundleSource::Registry {
            reference: reference.to_string(),
        })
    }
}
