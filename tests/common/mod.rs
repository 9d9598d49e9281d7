//! Shared fixtures for the integration tests
//!
//! Everything runs against `MemoryStore`; no cluster is needed.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use accesserator::config::{ControllerConfig, OperatorConfig};
use accesserator::constants::{POD_APP_NAME_LABEL, SECURITY_LABEL_ENABLED, SECURITY_LABEL_KEY};
use accesserator::crd::{
    AccessPolicy, Application, ApplicationSpec, BundleSpec, ConfigMapKeyRef, InboundPolicy,
    InternalRule, Jwker, OpaSpec, SecretKeyRef, SecurityConfig, SecurityConfigSpec,
    SecurityConfigStatus, TokenXSpec,
};
use accesserator::store::{MemoryStore, ResourceStore};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use serde_json::json;
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "team";
pub const SECURITY_CONFIG: &str = "sc";
pub const APP: &str = "app";

pub fn operator_config() -> OperatorConfig {
    OperatorConfig::from_lookup(|key| match key {
        "ACCESSERATOR_CLUSTER_NAME" => Some("atkv3-dev".to_string()),
        "ACCESSERATOR_TOKENX_NAMESPACE" => Some("obo".to_string()),
        "ACCESSERATOR_TEXAS_IMAGE_TAG" => Some("v1".to_string()),
        _ => None,
    })
    .expect("fixture config is complete")
}

/// Zero delays so conflict retries do not slow the suite down
pub fn controller_config() -> ControllerConfig {
    ControllerConfig {
        status_update_backoff_ms: 0,
        ..ControllerConfig::default()
    }
}

pub fn opa_spec(ghcr: Option<BundleSpec>, pv: Option<BundleSpec>) -> OpaSpec {
    OpaSpec {
        enabled: true,
        github_token: SecretKeyRef {
            name: "github-token".to_string(),
            key: "token".to_string(),
            optional: None,
        },
        bundle_public_key: ConfigMapKeyRef {
            name: "opa-bundle-key".to_string(),
            key: "public.pem".to_string(),
            optional: None,
        },
        ghcr,
        pv,
    }
}

pub fn bundle() -> BundleSpec {
    BundleSpec {
        bundle_path: "ghcr.io/kartverket/opa-bundles".to_string(),
        bundle_resource: APP.to_string(),
        bundle_version: "v1.2.0".to_string(),
    }
}

pub fn security_config(tokenx: bool, opa: Option<OpaSpec>) -> SecurityConfig {
    let mut sc = SecurityConfig::new(
        SECURITY_CONFIG,
        SecurityConfigSpec {
            application_ref: APP.to_string(),
            tokenx: Some(TokenXSpec { enabled: tokenx }),
            opa,
        },
    );
    sc.metadata.namespace = Some(NAMESPACE.to_string());
    sc.metadata.generation = Some(1);
    sc
}

pub fn application(secured: bool) -> Application {
    let mut app = Application::new(
        APP,
        ApplicationSpec {
            access_policy: Some(AccessPolicy {
                inbound: Some(InboundPolicy {
                    rules: vec![InternalRule {
                        application: "frontend".to_string(),
                        ..Default::default()
                    }],
                }),
                outbound: None,
            }),
            ..Default::default()
        },
    );
    app.metadata.namespace = Some(NAMESPACE.to_string());
    if secured {
        app.metadata.labels = Some(BTreeMap::from([(
            SECURITY_LABEL_KEY.to_string(),
            SECURITY_LABEL_ENABLED.to_string(),
        )]));
    }
    app
}

/// Mark the application's Jwker as rolled out by the token broker
pub async fn synchronize_jwker(store: &MemoryStore) {
    store
        .patch_status::<Jwker>(
            NAMESPACE,
            APP,
            &json!({"status": {"synchronizationState": "RolloutComplete"}}),
        )
        .await
        .expect("Jwker exists");
}

pub async fn status_of(store: &MemoryStore) -> SecurityConfigStatus {
    store
        .get::<SecurityConfig>(NAMESPACE, SECURITY_CONFIG)
        .await
        .expect("SecurityConfig exists")
        .status
        .unwrap_or_default()
}

pub fn pod(app: &str) -> Pod {
    let mut pod = Pod::default();
    pod.metadata.generate_name = Some(format!("{app}-"));
    pod.metadata.labels = Some(BTreeMap::from([(
        POD_APP_NAME_LABEL.to_string(),
        app.to_string(),
    )]));
    pod.spec = Some(PodSpec {
        containers: vec![Container {
            name: app.to_string(),
            image: Some("registry/app:1".to_string()),
            ..Default::default()
        }],
        ..Default::default()
    });
    pod
}
