//! # CRD Validation Tests
//!
//! Sample manifests must deserialize into the typed resources, and the
//! generated CustomResourceDefinition must keep its served shape.

use accesserator::crd::{Application, Phase, SecurityConfig};
use kube::CustomResourceExt;

#[test]
fn test_security_config_with_registry_bundle() {
    let yaml = r#"
apiVersion: accesserator.kartverket.no/v1alpha
kind: SecurityConfig
metadata:
  name: my-app-security
  namespace: my-namespace
spec:
  applicationRef: my-app
  tokenx:
    enabled: true
  opa:
    enabled: true
    githubToken:
      name: github-token
      key: token
    bundlePublicKey:
      name: opa-bundle-key
      key: public.pem
      optional: false
    ghcr:
      bundlePath: ghcr.io/kartverket/opa-bundles
      bundleResource: my-app
      bundleVersion: v1.2.0
"#;

    let sc: SecurityConfig =
        serde_yaml::from_str(yaml).expect("Should deserialize SecurityConfig with all fields");

    assert_eq!(sc.spec.application_ref, "my-app");
    assert!(sc.spec.tokenx_enabled());
    assert!(sc.spec.opa_enabled());
    let opa = sc.spec.opa.as_ref().unwrap();
    assert_eq!(opa.github_token.name, "github-token");
    assert_eq!(opa.bundle_public_key.optional, Some(false));
    let ghcr = opa.ghcr.as_ref().unwrap();
    assert_eq!(ghcr.bundle_path, "ghcr.io/kartverket/opa-bundles");
    assert_eq!(ghcr.bundle_version, "v1.2.0");
    assert!(opa.pv.is_none());
    assert!(sc.status.is_none());
}

#[test]
fn test_security_config_minimal() {
    let yaml = r"
apiVersion: accesserator.kartverket.no/v1alpha
kind: SecurityConfig
metadata:
  name: minimal
  namespace: team
spec:
  applicationRef: app
";

    let sc: SecurityConfig = serde_yaml::from_str(yaml).expect("Should deserialize minimal spec");

    assert!(!sc.spec.tokenx_enabled());
    assert!(!sc.spec.opa_enabled());
}

#[test]
fn test_volume_bundle_without_resource() {
    let yaml = r"
apiVersion: accesserator.kartverket.no/v1alpha
kind: SecurityConfig
metadata:
  name: pv
  namespace: team
spec:
  applicationRef: app
  opa:
    enabled: true
    githubToken: {name: gh, key: token}
    bundlePublicKey: {name: keys, key: pub.pem}
    pv:
      bundlePath: /bundles/authz
      bundleVersion: v3
";

    let sc: SecurityConfig = serde_yaml::from_str(yaml).expect("Should deserialize pv bundle");

    let pv = sc.spec.opa.unwrap().pv.unwrap();
    assert_eq!(pv.bundle_resource, "");
}

#[test]
fn test_status_round_trips_through_the_api_shape() {
    let yaml = r#"
apiVersion: accesserator.kartverket.no/v1alpha
kind: SecurityConfig
metadata:
  name: sc
  namespace: team
spec:
  applicationRef: app
status:
  observedGeneration: 3
  phase: Pending
  message: SecurityConfig pending due to Jwker not being synchronized.
  ready: false
  conditions:
    - type: SecurityConfig-sc
      status: Unknown
      reason: ReconciliationPending
      message: Jwker team/app has not finished synchronizing.
      lastTransitionTime: "2025-01-01T00:00:00Z"
      observedGeneration: 3
"#;

    let sc: SecurityConfig = serde_yaml::from_str(yaml).expect("Should deserialize status");
    let status = sc.status.unwrap();

    assert_eq!(status.phase, Some(Phase::Pending));
    assert_eq!(status.observed_generation, Some(3));
    let condition = status.condition("SecurityConfig-sc").unwrap();
    assert_eq!(condition.reason, "ReconciliationPending");
}

#[test]
fn test_missing_application_ref_is_rejected() {
    let yaml = r"
apiVersion: accesserator.kartverket.no/v1alpha
kind: SecurityConfig
metadata:
  name: broken
spec:
  tokenx:
    enabled: true
";

    let result: Result<SecurityConfig, _> = serde_yaml::from_str(yaml);
    assert!(result.is_err());
}

#[test]
fn test_application_keeps_unknown_fields() {
    let yaml = r"
apiVersion: skiperator.kartverket.no/v1alpha1
kind: Application
metadata:
  name: app
  namespace: team
  labels:
    skiperator/security: enabled
spec:
  image: registry/app:1
  port: 8080
  accessPolicy:
    inbound:
      rules:
        - application: frontend
        - application: batch
          namespace: jobs
    outbound:
      rules:
        - application: backend
      external:
        - host: example.com
";

    let app: Application = serde_yaml::from_str(yaml).expect("Should deserialize Application");

    assert_eq!(app.spec.extra["port"], serde_json::json!(8080));
    let policy = app.spec.access_policy.unwrap();
    let inbound = policy.inbound.unwrap().rules;
    assert_eq!(inbound.len(), 2);
    assert_eq!(inbound[0].namespace, None);
    assert_eq!(inbound[1].namespace.as_deref(), Some("jobs"));
    let outbound = policy.outbound.unwrap();
    assert_eq!(outbound.rules[0].application, "backend");
    assert!(outbound.extra.contains_key("external"));
}

#[test]
fn test_generated_crd_shape() {
    let crd = SecurityConfig::crd();

    assert_eq!(
        crd.metadata.name.as_deref(),
        Some("securityconfigs.accesserator.kartverket.no")
    );
    assert_eq!(crd.spec.group, "accesserator.kartverket.no");
    assert_eq!(crd.spec.scope, "Namespaced");
    assert_eq!(crd.spec.names.kind, "SecurityConfig");
    assert_eq!(crd.spec.names.short_names, Some(vec!["sc".to_string()]));

    let version = &crd.spec.versions[0];
    assert_eq!(version.name, "v1alpha");
    assert!(version.served);
    assert!(version.storage);
    assert!(version
        .subresources
        .as_ref()
        .and_then(|s| s.status.as_ref())
        .is_some());

    let columns = version.additional_printer_columns.as_ref().unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Status", "Ready"]);

    let schema = serde_json::to_value(&version.schema).unwrap();
    let spec = &schema["openAPIV3Schema"]["properties"]["spec"];
    assert_eq!(spec["required"], serde_json::json!(["applicationRef"]));
    assert!(spec["properties"]["opa"].is_object());
}
