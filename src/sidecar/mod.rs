//! # Sidecars
//!
//! Container, env and volume constructions for the Texas and OPA sidecars.
//! The admission engine injects and checks exactly what is built here, and the
//! generators derive their ConfigMap names from the same helpers.

mod opa;
mod texas;

pub use opa::{
    opa_container, opa_url_env, opa_volumes, OPA_CONFIG_MOUNT_PATH, OPA_CONFIG_VOLUME_NAME,
    OPA_CONTAINER_NAME, OPA_TMP_MOUNT_PATH, OPA_TMP_VOLUME_NAME,
};
pub use texas::{texas_container, texas_url_env, TEXAS_CONTAINER_NAME};

use k8s_openapi::api::core::v1::{Capabilities, ContainerPort, EnvVar, SecurityContext};

pub(crate) const SIDECAR_PORT_NAME: &str = "http";
pub(crate) const SIDECAR_RESTART_POLICY: &str = "Always";
pub(crate) const TERMINATION_MESSAGE_PATH: &str = "/dev/termination-log";
pub(crate) const TERMINATION_MESSAGE_POLICY: &str = "File";
const SIDECAR_USER_ID: i64 = 150;

/// Security context shared by every injected sidecar
pub(crate) fn locked_down_security_context() -> SecurityContext {
    SecurityContext {
        allow_privilege_escalation: Some(false),
        capabilities: Some(Capabilities {
            add: Some(vec!["NET_BIND_SERVICE".to_string()]),
            drop: Some(vec!["ALL".to_string()]),
        }),
        privileged: Some(false),
        read_only_root_filesystem: Some(true),
        run_as_group: Some(SIDECAR_USER_ID),
        run_as_non_root: Some(true),
        run_as_user: Some(SIDECAR_USER_ID),
        ..Default::default()
    }
}

pub(crate) fn http_port(port: i32) -> ContainerPort {
    ContainerPort {
        container_port: port,
        name: Some(SIDECAR_PORT_NAME.to_string()),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub(crate) fn plain_env(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}
