use super::{
    http_port, locked_down_security_context, plain_env, SIDECAR_RESTART_POLICY,
    TERMINATION_MESSAGE_PATH, TERMINATION_MESSAGE_POLICY,
};
use crate::config::OperatorConfig;
use crate::names::{jwker_name, jwker_secret_name};
use k8s_openapi::api::core::v1::{Container, EnvFromSource, EnvVar, SecretEnvSource};

pub const TEXAS_CONTAINER_NAME: &str = "texas";

/// Texas token-exchange sidecar for `application_ref`
///
/// Only token exchange is turned on; client credentials come from the Jwker
/// secret of the same application.
#[must_use]
pub fn texas_container(config: &OperatorConfig, application_ref: &str) -> Container {
    Container {
        name: TEXAS_CONTAINER_NAME.to_string(),
        image: Some(config.texas_image()),
        ports: Some(vec![http_port(config.texas_port)]),
        restart_policy: Some(SIDECAR_RESTART_POLICY.to_string()),
        security_context: Some(locked_down_security_context()),
        termination_message_path: Some(TERMINATION_MESSAGE_PATH.to_string()),
        termination_message_policy: Some(TERMINATION_MESSAGE_POLICY.to_string()),
        env: Some(vec![
            plain_env("TOKEN_X_ENABLED", "true"),
            plain_env("MASKINPORTEN_ENABLED", "false"),
            plain_env("AZURE_ENABLED", "false"),
            plain_env("IDPORTEN_ENABLED", "false"),
        ]),
        env_from: Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: jwker_secret_name(&jwker_name(application_ref)),
                optional: None,
            }),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

/// Env var pointing the application container at Texas
#[must_use]
pub fn texas_url_env(config: &OperatorConfig) -> EnvVar {
    plain_env(&config.texas_url_env_var_name, &config.texas_url())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;

    fn config() -> OperatorConfig {
        OperatorConfig::from_lookup(|key| match key {
            "ACCESSERATOR_CLUSTER_NAME" => Some("c".to_string()),
            "ACCESSERATOR_TOKENX_NAMESPACE" => Some("obo".to_string()),
            "ACCESSERATOR_TEXAS_IMAGE_TAG" => Some("v1".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_texas_container_shape() {
        let container = texas_container(&config(), "my-app");
        assert_eq!(container.name, "texas");
        assert_eq!(container.image.as_deref(), Some("ghcr.io/nais/texas:v1"));
        assert_eq!(container.restart_policy.as_deref(), Some("Always"));

        let port = &container.ports.as_ref().unwrap()[0];
        assert_eq!(port.container_port, 3000);
        assert_eq!(port.name.as_deref(), Some("http"));

        let env_from = &container.env_from.as_ref().unwrap()[0];
        assert_eq!(
            env_from.secret_ref.as_ref().unwrap().name,
            "my-app-jwker-secret"
        );

        let sc = container.security_context.unwrap();
        assert_eq!(sc.run_as_user, Some(150));
        assert_eq!(sc.read_only_root_filesystem, Some(true));
    }

    #[test]
    fn test_texas_url_env() {
        let env = texas_url_env(&config());
        assert_eq!(env.name, "TEXAS_URL");
        assert_eq!(env.value.as_deref(), Some("http://localhost:3000"));
    }
}
