//! OPA configuration ConfigMap.
//!
//! The `${GITHUB_TOKEN}` and `${OPA_PUBLIC_KEY}` placeholders are left for OPA
//! to substitute from the sidecar's environment.

use super::GeneratorError;
use crate::config::OperatorConfig;
use crate::constants::*;
use crate::controller::scope::{BundleSource, Scope};
use crate::names::discovery_service_url;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaConfigDocument {
    pub plugins: BTreeMap<String, ExtAuthzPlugin>,
    pub decision_logs: DecisionLogs,
    pub services: BTreeMap<String, OpaService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryPointer>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bundles: BTreeMap<String, BundleConfig>,
    pub keys: BTreeMap<String, VerificationKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtAuthzPlugin {
    pub addr: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogs {
    pub console: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpaService {
    pub url: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub bearer: Bearer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bearer {
    pub scheme: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryPointer {
    pub service: String,
    pub resource: String,
}

/// A bundle OPA polls; also the payload of the discovery document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConfig {
    pub service: String,
    pub resource: String,
    pub polling: Polling,
    pub signing: Signing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Polling {
    pub min_delay_seconds: u32,
    pub max_delay_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signing {
    pub keyid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKey {
    pub algorithm: String,
    pub key: String,
}

/// The `authz` bundle pulled from the registry
pub(crate) fn authz_bundle(reference: &str) -> BTreeMap<String, BundleConfig> {
    BTreeMap::from([(
        OPA_BUNDLE_NAME.to_string(),
        BundleConfig {
            service: OPA_REGISTRY_SERVICE_NAME.to_string(),
            resource: reference.to_string(),
            polling: Polling {
                min_delay_seconds: OPA_BUNDLE_MIN_DELAY_SECONDS,
                max_delay_seconds: OPA_BUNDLE_MAX_DELAY_SECONDS,
            },
            signing: Signing {
                keyid: OPA_SIGNING_KEY_ID.to_string(),
            },
        },
    )])
}

impl OpaConfigDocument {
    #[must_use]
    pub fn new(bundle: &BundleSource, app: &str, namespace: &str) -> Self {
        let mut services = BTreeMap::from([(
            OPA_REGISTRY_SERVICE_NAME.to_string(),
            OpaService {
                url: OPA_REGISTRY_URL.to_string(),
                service_type: Some("oci".to_string()),
                credentials: Some(Credentials {
                    bearer: Bearer {
                        scheme: "Bearer".to_string(),
                        token: format!("${{{OPA_GITHUB_TOKEN_ENV_VAR}}}"),
                    },
                }),
            },
        )]);

        let (discovery, bundles) = match bundle {
            BundleSource::Registry { .. } => {
                services.insert(
                    OPA_DISCOVERY_SERVICE_NAME.to_string(),
                    OpaService {
                        url: discovery_service_url(app, namespace),
                        service_type: None,
                        credentials: None,
                    },
                );
                (
                    Some(DiscoveryPointer {
                        service: OPA_DISCOVERY_SERVICE_NAME.to_string(),
                        resource: OPA_DISCOVERY_RESOURCE_PATH.to_string(),
                    }),
                    BTreeMap::new(),
                )
            }
            BundleSource::LocalVolume { reference } => (None, authz_bundle(reference)),
        };

        Self {
            plugins: BTreeMap::from([(
                "envoy_ext_authz_grpc".to_string(),
                ExtAuthzPlugin {
                    addr: ":9191".to_string(),
                    path: "istio/authz/allow".to_string(),
                },
            )]),
            decision_logs: DecisionLogs { console: true },
            services,
            discovery,
            bundles,
            keys: BTreeMap::from([(
                OPA_SIGNING_KEY_ID.to_string(),
                VerificationKey {
                    algorithm: "RS256".to_string(),
                    key: format!("${{{OPA_PUBLIC_KEY_ENV_VAR}}}"),
                },
            )]),
        }
    }
}

pub fn opa_config(
    meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Result<Option<ConfigMap>, GeneratorError> {
    let Some(bundle) = scope.authz.bundle.as_ref().filter(|_| scope.authz.enabled) else {
        return Ok(None);
    };
    let document = OpaConfigDocument::new(bundle, scope.application_ref(), scope.namespace());
    let rendered = serde_yaml::to_string(&document)?;

    Ok(Some(ConfigMap {
        metadata: meta,
        data: Some(BTreeMap::from([(OPA_CONFIG_FILE_NAME.to_string(), rendered)])),
        ..ConfigMap::default()
    }))
}
