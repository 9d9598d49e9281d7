//! # SecurityConfig Spec
//!
//! Per-application security intent: token exchange (Texas sidecar plus Jwker
//! registration) and authorization (OPA sidecar plus bundle discovery).

use serde::{Deserialize, Serialize};

/// SecurityConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: accesserator.kartverket.no/v1alpha
/// kind: SecurityConfig
/// metadata:
///   name: my-app-security
///   namespace: my-namespace
/// spec:
///   applicationRef: my-app
///   tokenx:
///     enabled: true
///   opa:
///     enabled: true
///     githubToken:
///       name: github-token
///       key: token
///     bundlePublicKey:
///       name: opa-bundle-key
///       key: public.pem
///     ghcr:
///       bundlePath: ghcr.io/kartverket/opa-bundles
///       bundleResource: my-app
///       bundleVersion: v1.2.0
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "SecurityConfig",
    group = "accesserator.kartverket.no",
    version = "v1alpha",
    namespaced,
    status = "crate::crd::SecurityConfigStatus",
    shortname = "sc",
    printcolumn = r#"{"name":"Status", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfigSpec {
    /// Name of the Skiperator Application this SecurityConfig applies to
    pub application_ref: String,
    /// Token exchange sidecar (Texas) configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokenx: Option<TokenXSpec>,
    /// Authorization sidecar (OPA) configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opa: Option<OpaSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenXSpec {
    pub enabled: bool,
}

/// OPA sidecar configuration
///
/// Exactly one of `ghcr` and `pv` must be set when `enabled` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpaSpec {
    pub enabled: bool,
    /// Secret key holding the token used to pull bundles from the registry
    pub github_token: SecretKeyRef,
    /// ConfigMap key holding the public key that verifies bundle signatures
    pub bundle_public_key: ConfigMapKeyRef,
    /// Registry-backed bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghcr: Option<BundleSpec>,
    /// Local-volume-backed bundle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pv: Option<BundleSpec>,
}

/// Bundle coordinates shared by both bundle sources
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BundleSpec {
    /// Repository path, e.g. `ghcr.io/org/opa-bundle`
    pub bundle_path: String,
    /// Resource within the repository; may be empty
    #[serde(default)]
    pub bundle_resource: String,
    /// Tag or digest, e.g. `v3.0.1`
    pub bundle_version: String,
}

/// Selects a key of a Secret in the SecurityConfig's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// Selects a key of a ConfigMap in the SecurityConfig's namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapKeyRef {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

impl SecurityConfigSpec {
    #[must_use]
    pub fn tokenx_enabled(&self) -> bool {
        self.tokenx.as_ref().is_some_and(|t| t.enabled)
    }

    #[must_use]
    pub fn opa_enabled(&self) -> bool {
        self.opa.as_ref().is_some_and(|o| o.enabled)
    }
}
