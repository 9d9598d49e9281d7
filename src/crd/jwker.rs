//! # Jwker
//!
//! The nais `Jwker` client registration. The operator owns the spec and only
//! reads `status.synchronizationState`.

use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[kube(
    kind = "Jwker",
    group = "nais.io",
    version = "v1",
    namespaced,
    status = "crate::crd::JwkerStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct JwkerSpec {
    /// Secret the registration's client credentials are written to
    pub secret_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<JwkerAccessPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwkerAccessPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<JwkerInbound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<JwkerOutbound>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkerInbound {
    #[serde(default)]
    pub rules: Vec<JwkerAccessPolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkerOutbound {
    #[serde(default)]
    pub rules: Vec<JwkerAccessPolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct JwkerAccessPolicyRule {
    pub application: String,
    pub namespace: String,
    pub cluster: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JwkerStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_time: Option<i64>,
}

impl Jwker {
    /// Whether the registration has been rolled out by the token broker
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.synchronization_state.as_deref())
            == Some(crate::constants::JWKER_ROLLOUT_COMPLETE)
    }
}
