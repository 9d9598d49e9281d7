//! # Owned Kinds
//!
//! Per-kind equality and field copy used by convergence. Only the fields the
//! operator manages are compared, so server-side defaults on live objects never
//! trigger an update.

use crate::crd::Jwker;
use crate::store::{json_is_subset, StoreObject};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::ObjectMeta;
use serde::Serialize;

pub trait OwnedKind: StoreObject {
    const KIND: &'static str;

    /// Whether `current` already carries every managed field of `desired`
    fn is_equal(current: &Self, desired: &Self) -> bool;

    /// Overwrite the managed fields of `current` with those of `desired`
    fn copy_fields(current: &mut Self, desired: &Self);
}

/// `desired` serialized is contained in `current` serialized
fn is_subset<T: Serialize>(desired: &T, current: &T) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(current)) {
        (Ok(desired), Ok(current)) => json_is_subset(&desired, &current),
        _ => false,
    }
}

fn labels_match(current: &ObjectMeta, desired: &ObjectMeta) -> bool {
    desired.labels.iter().flatten().all(|(key, value)| {
        current
            .labels
            .as_ref()
            .and_then(|labels| labels.get(key))
            == Some(value)
    })
}

fn merge_labels(current: &mut ObjectMeta, desired: &ObjectMeta) {
    if let Some(desired_labels) = &desired.labels {
        current
            .labels
            .get_or_insert_with(Default::default)
            .extend(desired_labels.clone());
    }
}

impl OwnedKind for Jwker {
    const KIND: &'static str = "Jwker";

    fn is_equal(current: &Self, desired: &Self) -> bool {
        labels_match(&current.metadata, &desired.metadata) && current.spec == desired.spec
    }

    fn copy_fields(current: &mut Self, desired: &Self) {
        merge_labels(&mut current.metadata, &desired.metadata);
        current.spec = desired.spec.clone();
    }
}

impl OwnedKind for ConfigMap {
    const KIND: &'static str = "ConfigMap";

    fn is_equal(current: &Self, desired: &Self) -> bool {
        labels_match(&current.metadata, &desired.metadata)
            && current.data == desired.data
            && current.binary_data == desired.binary_data
    }

    fn copy_fields(current: &mut Self, desired: &Self) {
        merge_labels(&mut current.metadata, &desired.metadata);
        current.data.clone_from(&desired.data);
        current.binary_data.clone_from(&desired.binary_data);
    }
}

impl OwnedKind for Service {
    const KIND: &'static str = "Service";

    fn is_equal(current: &Self, desired: &Self) -> bool {
        labels_match(&current.metadata, &desired.metadata) && is_subset(&desired.spec, &current.spec)
    }

    fn copy_fields(current: &mut Self, desired: &Self) {
        merge_labels(&mut current.metadata, &desired.metadata);
        let Some(desired_spec) = &desired.spec else {
            return;
        };
        // clusterIP and friends are immutable once allocated
        let spec = current.spec.get_or_insert_with(Default::default);
        spec.selector.clone_from(&desired_spec.selector);
        spec.ports.clone_from(&desired_spec.ports);
        spec.type_.clone_from(&desired_spec.type_);
    }
}

impl OwnedKind for Deployment {
    const KIND: &'static str = "Deployment";

    fn is_equal(current: &Self, desired: &Self) -> bool {
        labels_match(&current.metadata, &desired.metadata) && is_subset(&desired.spec, &current.spec)
    }

    fn copy_fields(current: &mut Self, desired: &Self) {
        merge_labels(&mut current.metadata, &desired.metadata);
        let Some(desired_spec) = &desired.spec else {
            return;
        };
        // the selector is immutable
        let spec = current.spec.get_or_insert_with(|| desired_spec.clone());
        spec.replicas = desired_spec.replicas;
        spec.template = desired_spec.template.clone();
    }
}

impl OwnedKind for NetworkPolicy {
    const KIND: &'static str = "NetworkPolicy";

    fn is_equal(current: &Self, desired: &Self) -> bool {
        labels_match(&current.metadata, &desired.metadata) && is_subset(&desired.spec, &current.spec)
    }

    fn copy_fields(current: &mut Self, desired: &Self) {
        merge_labels(&mut current.metadata, &desired.metadata);
        current.spec.clone_from(&desired.spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ServicePort, ServiceSpec};
    use std::collections::BTreeMap;

    fn service(cluster_ip: Option<&str>, port: i32) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some("svc".to_string()),
                labels: Some(BTreeMap::from([("a".to_string(), "b".to_string())])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                cluster_ip: cluster_ip.map(str::to_string),
                type_: Some("ClusterIP".to_string()),
                ports: Some(vec![ServicePort {
                    port,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_server_defaults_do_not_cause_drift() {
        let live = service(Some("10.0.0.1"), 80);
        let desired = service(None, 80);
        assert!(Service::is_equal(&live, &desired));
    }

    #[test]
    fn test_copy_fields_keeps_immutable_fields() {
        let mut live = service(Some("10.0.0.1"), 80);
        let desired = service(None, 81);
        assert!(!Service::is_equal(&live, &desired));

        Service::copy_fields(&mut live, &desired);
        let spec = live.spec.as_ref().unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(spec.ports.as_ref().unwrap()[0].port, 81);
        assert!(Service::is_equal(&live, &desired));
    }

    #[test]
    fn test_foreign_labels_are_kept() {
        let mut live = ConfigMap {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([("owner".to_string(), "someone".to_string())])),
                ..Default::default()
            },
            ..Default::default()
        };
        let desired = ConfigMap {
            metadata: ObjectMeta {
                labels: Some(BTreeMap::from([("app".to_string(), "x".to_string())])),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        };
        assert!(!ConfigMap::is_equal(&live, &desired));

        ConfigMap::copy_fields(&mut live, &desired);
        let labels = live.metadata.labels.as_ref().unwrap();
        assert_eq!(labels.len(), 2);
        assert!(ConfigMap::is_equal(&live, &desired));
    }
}
