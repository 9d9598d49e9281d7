//! # Admission Endpoint Tests
//!
//! Drives the admission router with `AdmissionReview` bodies the way the API
//! server sends them.

mod common;

use accesserator::config::OperatorConfig;
use accesserator::store::MemoryStore;
use accesserator::webhook::{
    default_pod, resolve_pod_security_configuration, router, WebhookState, MUTATE_PATH,
    VALIDATE_PATH,
};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use k8s_openapi::api::core::v1::Pod;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn state(store: MemoryStore) -> Arc<WebhookState<MemoryStore>> {
    Arc::new(WebhookState {
        store,
        config: Arc::new(operator_config()),
    })
}

fn review(operation: &str, pod: &Pod) -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "705ab4f5-6393-11e8-b7cc-42010a800002",
            "kind": {"group": "", "version": "v1", "kind": "Pod"},
            "resource": {"group": "", "version": "v1", "resource": "pods"},
            "name": "",
            "namespace": NAMESPACE,
            "operation": operation,
            "userInfo": {"username": "system:serviceaccount:kube-system:replicaset-controller"},
            "object": pod,
            "oldObject": null,
            "dryRun": false
        }
    })
}

async fn post(store: MemoryStore, path: &str, body: String) -> (StatusCode, Value) {
    let response = router(state(store))
        .oneshot(
            Request::post(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn admit(store: MemoryStore, path: &str, operation: &str, pod: &Pod) -> Value {
    let (status, body) = post(store, path, review(operation, pod).to_string()).await;
    assert_eq!(status, StatusCode::OK);
    body["response"].clone()
}

fn secured_store(tokenx: bool, opa: bool) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(application(true)).unwrap();
    store
        .insert(security_config(
            tokenx,
            opa.then(|| opa_spec(Some(bundle()), None)),
        ))
        .unwrap();
    store
}

fn denial(response: &Value) -> &str {
    assert_eq!(response["allowed"], json!(false));
    response["status"]["message"].as_str().unwrap_or_default()
}

/// The response carries the patch as raw bytes, serialized as a number array
fn decode_patch(response: &Value) -> json_patch::Patch {
    let bytes: Vec<u8> = response["patch"]
        .as_array()
        .expect("patch is a byte array")
        .iter()
        .map(|b| u8::try_from(b.as_u64().expect("byte")).expect("byte fits u8"))
        .collect();
    serde_json::from_slice(&bytes).expect("patch is a JSON Patch document")
}

/// The Pod as defaulting would leave it
async fn defaulted_pod(store: &MemoryStore, config: &OperatorConfig) -> Pod {
    let mut pod = pod(APP);
    pod.metadata.namespace = Some(NAMESPACE.to_string());
    let expected = resolve_pod_security_configuration(store, &pod, config)
        .await
        .unwrap();
    default_pod(&mut pod, &expected);
    pod
}

#[tokio::test]
async fn test_mutate_returns_json_patch_for_secured_pod() {
    let submitted = pod(APP);
    let response = admit(secured_store(true, true), MUTATE_PATH, "CREATE", &submitted).await;

    assert_eq!(response["uid"], json!("705ab4f5-6393-11e8-b7cc-42010a800002"));
    assert_eq!(response["allowed"], json!(true));
    assert_eq!(response["patchType"], json!("JSONPatch"));

    let patch = decode_patch(&response);
    assert!(patch
        .0
        .iter()
        .all(|op| matches!(op, json_patch::PatchOperation::Add(_))));

    let mut document = serde_json::to_value(&submitted).unwrap();
    json_patch::patch(&mut document, &patch.0).unwrap();
    let mutated: Pod = serde_json::from_value(document).unwrap();
    let spec = mutated.spec.unwrap();

    let init: Vec<&str> = spec
        .init_containers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(init, vec!["texas", "opa"]);

    let env: Vec<&str> = spec.containers[0]
        .env
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|e| e.name.as_str())
        .collect();
    assert!(env.contains(&"TEXAS_URL"));
    assert!(env.contains(&"OPA_URL"));

    let volumes: Vec<&str> = spec
        .volumes
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    assert!(volumes.contains(&"opa-config"));
    assert!(volumes.contains(&"opa-tmp"));
}

#[tokio::test]
async fn test_mutate_leaves_unlabelled_pod_alone() {
    let mut unlabelled = pod(APP);
    unlabelled.metadata.labels = None;

    let response = admit(secured_store(true, true), MUTATE_PATH, "CREATE", &unlabelled).await;

    assert_eq!(response["allowed"], json!(true));
    assert_eq!(response.get("patch"), None);
}

#[tokio::test]
async fn test_mutate_denies_when_no_security_config_exists() {
    let store = MemoryStore::new();
    store.insert(application(true)).unwrap();

    let response = admit(store, MUTATE_PATH, "CREATE", &pod(APP)).await;

    assert_eq!(
        denial(&response),
        "the application is labelled with skiperator/security=enabled but no SecurityConfig resource was found for Application"
    );
}

#[tokio::test]
async fn test_validate_denies_pod_without_sidecars() {
    let response = admit(secured_store(true, false), VALIDATE_PATH, "CREATE", &pod(APP)).await;
    assert_eq!(
        denial(&response),
        "TokenX is enabled but init container 'texas' is missing"
    );

    let response = admit(secured_store(false, true), VALIDATE_PATH, "CREATE", &pod(APP)).await;
    assert_eq!(denial(&response), "Opa is enabled but init container 'opa' is missing");
}

#[tokio::test]
async fn test_validate_admits_defaulted_pod() {
    let store = secured_store(true, true);
    let pod = defaulted_pod(&store, &operator_config()).await;

    let response = admit(store, VALIDATE_PATH, "CREATE", &pod).await;

    assert_eq!(response["allowed"], json!(true));
}

#[tokio::test]
async fn test_validate_denies_tampered_sidecar() {
    let store = secured_store(true, false);
    let mut pod = defaulted_pod(&store, &operator_config()).await;
    let spec = pod.spec.as_mut().unwrap();
    let texas = spec
        .init_containers
        .as_mut()
        .unwrap()
        .iter_mut()
        .find(|c| c.name == "texas")
        .unwrap();
    texas.image = Some("attacker/texas:latest".to_string());

    let response = admit(store, VALIDATE_PATH, "UPDATE", &pod).await;

    assert_eq!(
        denial(&response),
        "texas init container is not as expected given the SecurityConfig"
    );
}

#[tokio::test]
async fn test_validate_denies_missing_app_env() {
    let store = secured_store(true, false);
    let mut pod = defaulted_pod(&store, &operator_config()).await;
    pod.spec.as_mut().unwrap().containers[0].env = None;

    let response = admit(store, VALIDATE_PATH, "CREATE", &pod).await;

    assert_eq!(
        denial(&response),
        "TokenX is enabled but container 'app' is missing environment variable 'TEXAS_URL'"
    );
}

#[tokio::test]
async fn test_delete_is_always_admitted() {
    let store = MemoryStore::new();
    store.insert(application(true)).unwrap();

    let response = admit(store, VALIDATE_PATH, "DELETE", &pod(APP)).await;

    assert_eq!(response["allowed"], json!(true));
}

#[tokio::test]
async fn test_review_without_request_is_rejected() {
    let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});

    let (status, body) = post(MemoryStore::new(), VALIDATE_PATH, body.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["allowed"], json!(false));
}

#[tokio::test]
async fn test_malformed_body_is_a_client_error() {
    let (status, _) = post(MemoryStore::new(), MUTATE_PATH, "{not json".to_string()).await;

    assert!(status.is_client_error());
}
