//! # Skiperator Application
//!
//! The subset of the Skiperator `Application` kind the operator reads. Only the
//! access policy is typed; every other spec field is carried through untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[kube(
    kind = "Application",
    group = "skiperator.kartverket.no",
    version = "v1alpha1",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_policy: Option<AccessPolicy>,
    /// Fields this operator does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Which applications may talk to this one, and which it may talk to
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<InboundPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<OutboundPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPolicy {
    #[serde(default)]
    pub rules: Vec<InternalRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundPolicy {
    #[serde(default)]
    pub rules: Vec<InternalRule>,
    /// External hosts; not used for token exchange
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A rule referencing another application inside the cluster
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalRule {
    pub application: String,
    /// Defaults to the rule owner's namespace when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces_by_label: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ports: Option<Vec<serde_json::Value>>,
}
