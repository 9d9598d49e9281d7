use super::{
    http_port, locked_down_security_context, plain_env, SIDECAR_RESTART_POLICY,
    TERMINATION_MESSAGE_PATH, TERMINATION_MESSAGE_POLICY,
};
use crate::config::OperatorConfig;
use crate::constants::{OPA_CONFIG_FILE_NAME, OPA_GITHUB_TOKEN_ENV_VAR, OPA_PUBLIC_KEY_ENV_VAR};
use crate::crd::OpaSpec;
use crate::names::opa_config_name;
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, SecretKeySelector, Volume, VolumeMount,
};

pub const OPA_CONTAINER_NAME: &str = "opa";
pub const OPA_CONFIG_VOLUME_NAME: &str = "opa-config";
pub const OPA_CONFIG_MOUNT_PATH: &str = "/config";
pub const OPA_TMP_VOLUME_NAME: &str = "opa-tmp";
pub const OPA_TMP_MOUNT_PATH: &str = "/tmp";

/// OPA authorization sidecar
///
/// Reads its configuration from the generated `<app>-opa-config` ConfigMap.
/// The registry token and bundle public key are passed as env so OPA can
/// resolve the `${...}` placeholders in that configuration.
#[must_use]
pub fn opa_container(config: &OperatorConfig, opa: &OpaSpec) -> Container {
    Container {
        name: OPA_CONTAINER_NAME.to_string(),
        image: Some(config.opa_image()),
        args: Some(vec![
            "run".to_string(),
            "--server".to_string(),
            format!("--addr=:{}", config.opa_port),
            format!("--config-file={OPA_CONFIG_MOUNT_PATH}/{OPA_CONFIG_FILE_NAME}"),
        ]),
        ports: Some(vec![http_port(config.opa_port)]),
        restart_policy: Some(SIDECAR_RESTART_POLICY.to_string()),
        security_context: Some(locked_down_security_context()),
        termination_message_path: Some(TERMINATION_MESSAGE_PATH.to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        env: Some(vec![
            plain_env("OPA_ENABLED", "true"),
            EnvVar {
                name: OPA_GITHUB_TOKEN_ENV_VAR.to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    secret_key_ref: Some(SecretKeySelector {
                        name: opa.github_token.name.clone(),
                        key: opa.github_token.key.clone(),
                        optional: opa.github_token.optional,
                    }),
                    ..Default::default()
                }),
            },
            EnvVar {
                name: OPA_PUBLIC_KEY_ENV_VAR.to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: opa.bundle_public_key.name.clone(),
                        key: opa.bundle_public_key.key.clone(),
                        optional: opa.bundle_public_key.optional,
                    }),
                    ..Default::default()
                }),
            },
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: OPA_CONFIG_VOLUME_NAME.to_string(),
                mount_path: OPA_CONFIG_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            },
            VolumeMount {
                name: OPA_TMP_VOLUME_NAME.to_string(),
                mount_path: OPA_TMP_MOUNT_PATH.to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    }
}

/// Volumes the OPA container mounts
#[must_use]
pub fn opa_volumes(application_ref: &str) -> Vec<Volume> {
    vec![
        Volume {
            name: OPA_CONFIG_VOLUME_NAME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: opa_config_name(application_ref),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: OPA_TMP_VOLUME_NAME.to_string(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ]
}

/// Env var pointing the application container at OPA
#[must_use]
pub fn opa_url_env(config: &OperatorConfig) -> EnvVar {
    plain_env(&config.opa_url_env_var_name, &config.opa_url())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ConfigMapKeyRef, SecretKeyRef};

    fn config() -> OperatorConfig {
        OperatorConfig::from_lookup(|key| match key {
            "ACCESSERATOR_CLUSTER_NAME" => Some("c".to_string()),
            "ACCESSERATOR_TOKENX_NAMESPACE" => Some("obo".to_string()),
            "ACCESSERATOR_TEXAS_IMAGE_TAG" => Some("v1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn opa_spec() -> OpaSpec {
        OpaSpec {
            enabled: true,
            github_token: SecretKeyRef {
                name: "gh".to_string(),
                key: "token".to_string(),
                optional: None,
            },
            bundle_public_key: ConfigMapKeyRef {
                name: "keys".to_string(),
                key: "pub.pem".to_string(),
                optional: None,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_opa_container_args_and_env() {
        let container = opa_container(&config(), &opa_spec());
        assert_eq!(
            container.args.unwrap(),
            vec![
                "run",
                "--server",
                "--addr=:8181",
                "--config-file=/config/config.yaml"
            ]
        );

        let env = container.env.unwrap();
        assert_eq!(env[0].name, "OPA_ENABLED");
        let token = env[1].value_from.as_ref().unwrap().secret_key_ref.as_ref().unwrap();
        assert_eq!((token.name.as_str(), token.key.as_str()), ("gh", "token"));
        let key = env[2]
            .value_from
            .as_ref()
            .unwrap()
            .config_map_key_ref
            .as_ref()
            .unwrap();
        assert_eq!((key.name.as_str(), key.key.as_str()), ("keys", "pub.pem"));

        let mounts = container.volume_mounts.unwrap();
        assert_eq!(mounts[0].mount_path, "/config");
        assert_eq!(mounts[0].read_only, Some(true));
        assert_eq!(mounts[1].mount_path, "/tmp");
    }

    #[test]
    fn test_opa_volumes_reference_generated_config() {
        let volumes = opa_volumes("my-app");
        assert_eq!(volumes[0].name, "opa-config");
        assert_eq!(
            volumes[0].config_map.as_ref().unwrap().name,
            "my-app-opa-config"
        );
        assert!(volumes[1].empty_dir.is_some());
    }
}
