//! OPA discovery server: an nginx Deployment serving a discovery bundle from a
//! ConfigMap, fronted by a ClusterIP Service.
//!
//! The bundle is a gzip tar archive with a single `data.json` entry. Headers
//! carry no timestamps or owners, so the archive only changes when the
//! embedded bundle reference does.

use super::opa_config::{authz_bundle, BundleConfig};
use super::GeneratorError;
use crate::config::OperatorConfig;
use crate::constants::*;
use crate::controller::scope::Scope;
use crate::names::{discovery_config_name, discovery_labels};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, KeyToPath, PodSpec,
    PodTemplateSpec, Service, ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

const DISCOVERY_DATA_FILE: &str = "data.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    pub bundles: BTreeMap<String, BundleConfig>,
}

fn nginx_config() -> String {
    format!(
        r#"server {{
  listen {OPA_DISCOVERY_CONTAINER_PORT};
  server_name _;

  location = {OPA_DISCOVERY_RESOURCE_PATH} {{
    alias {OPA_DISCOVERY_MOUNT_PATH}/{OPA_DISCOVERY_BUNDLE_FILE_NAME};
    default_type application/gzip;
    add_header Cache-Control "no-store";
  }}
}}
"#
    )
}

fn build_archive(document: &DiscoveryDocument) -> Result<Vec<u8>, GeneratorError> {
    let data = serde_json::to_vec(document).map_err(|source| GeneratorError::Json {
        kind: "discovery document",
        source,
    })?;

    let mut header = tar::Header::new_gnu();
    header.set_path(DISCOVERY_DATA_FILE)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_cksum();

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.append(&header, data.as_slice())?;
    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Extract `data.json` from a discovery archive
pub fn read_discovery_document(archive: &[u8]) -> std::io::Result<serde_json::Value> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_str() == Some(DISCOVERY_DATA_FILE) {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            return serde_json::from_slice(&buf).map_err(std::io::Error::other);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "discovery archive has no data.json",
    ))
}

pub fn discovery_config(
    meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Result<Option<ConfigMap>, GeneratorError> {
    let Some(bundle) = scope.authz.bundle.as_ref().filter(|_| scope.authz.enabled) else {
        return Ok(None);
    };
    let archive = build_archive(&DiscoveryDocument {
        bundles: authz_bundle(bundle.reference()),
    })?;

    Ok(Some(ConfigMap {
        metadata: meta,
        data: Some(BTreeMap::from([(
            OPA_DISCOVERY_NGINX_CONFIG_FILE_NAME.to_string(),
            nginx_config(),
        )])),
        binary_data: Some(BTreeMap::from([(
            OPA_DISCOVERY_BUNDLE_FILE_NAME.to_string(),
            ByteString(archive),
        )])),
        ..ConfigMap::default()
    }))
}

pub fn discovery_service(
    mut meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Option<Service> {
    if !scope.authz.enabled {
        return None;
    }
    let labels = discovery_labels(scope.application_ref());
    meta.labels = Some(labels.clone());

    Some(Service {
        metadata: meta,
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(labels),
            ports: Some(vec![ServicePort {
                name: Some("http".to_string()),
                port: OPA_DISCOVERY_SERVICE_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(OPA_DISCOVERY_CONTAINER_PORT)),
                ..ServicePort::default()
            }]),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    })
}

pub fn discovery_deployment(
    mut meta: ObjectMeta,
    scope: &Scope,
    _config: &OperatorConfig,
) -> Option<Deployment> {
    if !scope.authz.enabled {
        return None;
    }
    let app = scope.application_ref();
    let labels = discovery_labels(app);
    meta.labels = Some(labels.clone());

    let items = [OPA_DISCOVERY_BUNDLE_FILE_NAME, OPA_DISCOVERY_NGINX_CONFIG_FILE_NAME]
        .into_iter()
        .map(|key| KeyToPath {
            key: key.to_string(),
            path: key.to_string(),
            mode: None,
        })
        .collect();

    Some(Deployment {
        metadata: meta,
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..ObjectMeta::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: OPA_DISCOVERY_CONTAINER_NAME.to_string(),
                        image: Some(OPA_DISCOVERY_IMAGE.to_string()),
                        ports: Some(vec![ContainerPort {
                            name: Some("http".to_string()),
                            container_port: OPA_DISCOVERY_CONTAINER_PORT,
                            protocol: Some("TCP".to_string()),
                            ..ContainerPort::default()
                        }]),
                        volume_mounts: Some(vec![VolumeMount {
                            name: OPA_DISCOVERY_VOLUME_NAME.to_string(),
                            mount_path: OPA_DISCOVERY_MOUNT_PATH.to_string(),
                            read_only: Some(true),
                            ..VolumeMount::default()
                        }]),
                        ..Container::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: OPA_DISCOVERY_VOLUME_NAME.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: discovery_config_name(app),
                            items: Some(items),
                            ..ConfigMapVolumeSource::default()
                        }),
                        ..Volume::default()
                    }]),
                    ..PodSpec::default()
                }),
            },
            ..DeploymentSpec::default()
        }),
        ..Deployment::default()
    })
}
