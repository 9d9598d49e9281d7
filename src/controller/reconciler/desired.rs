//! # Desired Resources
//!
//! The closed set of kinds the operator owns. A `None` object means the
//! resource must not exist.

use crate::crd::Jwker;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;

/// One owned resource, identified by name, with its desired state
#[derive(Debug, Clone)]
pub struct Desired<K> {
    pub name: String,
    pub object: Option<K>,
}

#[derive(Debug, Clone)]
pub enum DesiredResource {
    Jwker(Desired<Jwker>),
    ConfigMap(Desired<ConfigMap>),
    Service(Desired<Service>),
    Deployment(Desired<Deployment>),
    NetworkPolicy(Desired<NetworkPolicy>),
}

impl DesiredResource {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            DesiredResource::Jwker(_) => "Jwker",
            DesiredResource::ConfigMap(_) => "ConfigMap",
            DesiredResource::Service(_) => "Service",
            DesiredResource::Deployment(_) => "Deployment",
            DesiredResource::NetworkPolicy(_) => "NetworkPolicy",
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            DesiredResource::Jwker(d) => &d.name,
            DesiredResource::ConfigMap(d) => &d.name,
            DesiredResource::Service(d) => &d.name,
            DesiredResource::Deployment(d) => &d.name,
            DesiredResource::NetworkPolicy(d) => &d.name,
        }
    }

    /// Whether the resource should exist after convergence
    #[must_use]
    pub fn is_present(&self) -> bool {
        match self {
            DesiredResource::Jwker(d) => d.object.is_some(),
            DesiredResource::ConfigMap(d) => d.object.is_some(),
            DesiredResource::Service(d) => d.object.is_some(),
            DesiredResource::Deployment(d) => d.object.is_some(),
            DesiredResource::NetworkPolicy(d) => d.object.is_some(),
        }
    }
}
