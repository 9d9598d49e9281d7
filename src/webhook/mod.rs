//! # Pod Admission
//!
//! Injects and enforces the Texas and OPA sidecars on Pods of Skiperator
//! applications labelled `skiperator/security=enabled`.
//!
//! - `resolve.rs` - finds the single SecurityConfig governing a Pod
//! - `mutate.rs` - defaulting: adds sidecars, env and volumes
//! - `validate.rs` - rejects Pods whose sidecars differ from the expected ones
//! - `server.rs` - axum routes speaking `AdmissionReview`
//!
//! Both the defaulting and the validating side derive the expected sidecars
//! from the same `sidecar` library the generators use.

mod mutate;
mod resolve;
mod server;
mod validate;

pub use mutate::default_pod;
pub use resolve::resolve_pod_security_configuration;
pub use server::{router, start_webhook_server, WebhookState, MUTATE_PATH, VALIDATE_PATH};
pub use validate::{sidecar_matches, validate_pod};

use crate::crd::SecurityConfig;
use crate::store::StoreError;
use k8s_openapi::api::core::v1::{Container, EnvVar, Volume};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("failed to fetch Application resource named {app}: {source}")]
    ApplicationLookup {
        app: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to fetch SecurityConfig resources: {0}")]
    SecurityConfigLookup(#[source] StoreError),
    #[error("the application is labelled with skiperator/security=enabled but no SecurityConfig resource was found for Application")]
    NoSecurityConfig { app: String },
    #[error("multiple SecurityConfig resources found for Application")]
    MultipleSecurityConfigs { app: String },
    #[error("{0}")]
    Validation(String),
    #[error("expected a Pod object: {0}")]
    InvalidObject(String),
}

/// What admission expects of one Pod
///
/// With `security_enabled` false the Pod is left alone and every other field
/// is empty.
#[derive(Debug, Clone, Default)]
pub struct PodSecurityConfiguration {
    pub app_name: String,
    pub namespace: String,
    pub security_enabled: bool,
    pub security_config: Option<SecurityConfig>,
    /// Set when token exchange is enabled
    pub texas_container: Option<Container>,
    pub texas_url_env: Option<EnvVar>,
    /// Set when authorization is enabled
    pub opa_container: Option<Container>,
    pub opa_url_env: Option<EnvVar>,
    pub opa_volumes: Vec<Volume>,
}

impl PodSecurityConfiguration {
    #[must_use]
    pub fn disabled(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }
}
