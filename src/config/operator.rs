//! # Operator Configuration
//!
//! Settings read from `ACCESSERATOR_*` environment variables. They decide the
//! cluster name stamped on Jwker rules, where the token-exchange broker lives,
//! and which images, ports and URL env var names the injected sidecars use.

use std::fmt;
use thiserror::Error;

const ENV_PREFIX: &str = "ACCESSERATOR_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config: {}", .0.join(", "))]
    Missing(Vec<String>),
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Immutable operator configuration
///
/// Built once in `runtime::initialization` and shared as `Arc<OperatorConfig>`.
#[derive(Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Cluster name written on every Jwker access policy rule
    pub cluster_name: String,
    /// Name (and `app` label) of the token-exchange broker
    pub tokenx_name: String,
    /// Namespace the token-exchange broker runs in
    pub tokenx_namespace: String,
    pub texas_image_name: String,
    pub texas_image_tag: String,
    pub texas_port: i32,
    /// Env var injected into the application container pointing at Texas
    pub texas_url_env_var_name: String,
    pub opa_image_name: String,
    pub opa_image_tag: String,
    pub opa_port: i32,
    /// Env var injected into the application container pointing at OPA
    pub opa_url_env_var_name: String,
}

impl fmt::Debug for OperatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorConfig")
            .field("cluster_name", &self.cluster_name)
            .field("tokenx", &format!("{}/{}", self.tokenx_namespace, self.tokenx_name))
            .field("texas_image", &self.texas_image())
            .field("opa_image", &self.opa_image())
            .finish_non_exhaustive()
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Keys are passed with the `ACCESSERATOR_` prefix. Every required key that
    /// is absent is reported at once, in declaration order.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();

        let mut required = |key: &str| -> String {
            let full = format!("{ENV_PREFIX}{key}");
            match lookup(&full).filter(|v| !v.is_empty()) {
                Some(value) => value,
                None => {
                    missing.push(full);
                    String::new()
                }
            }
        };
        let cluster_name = required("CLUSTER_NAME");
        let tokenx_namespace = required("TOKENX_NAMESPACE");
        let texas_image_tag = required("TEXAS_IMAGE_TAG");

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let optional = |key: &str, default: &str| -> String {
            lookup(&format!("{ENV_PREFIX}{key}"))
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let port = |key: &str, default: i32| -> Result<i32, ConfigError> {
            let full = format!("{ENV_PREFIX}{key}");
            match lookup(&full).filter(|v| !v.is_empty()) {
                None => Ok(default),
                Some(raw) => match raw.parse::<i32>() {
                    Ok(p) if (1..=65535).contains(&p) => Ok(p),
                    Ok(_) => Err(ConfigError::Invalid {
                        key: full,
                        value: raw,
                        reason: "port must be between 1 and 65535".to_string(),
                    }),
                    Err(e) => Err(ConfigError::Invalid {
                        key: full,
                        value: raw,
                        reason: e.to_string(),
                    }),
                },
            }
        };

        Ok(Self {
            cluster_name,
            tokenx_name: optional("TOKENX_NAME", "tokendings"),
            tokenx_namespace,
            texas_image_name: optional("TEXAS_IMAGE_NAME", "ghcr.io/nais/texas"),
            texas_image_tag,
            texas_port: port("TEXAS_PORT", 3000)?,
            texas_url_env_var_name: optional("TEXAS_URL_ENV_VAR_NAME", "TEXAS_URL"),
            opa_image_name: optional("OPA_IMAGE_NAME", "openpolicyagent/opa"),
            opa_image_tag: optional("OPA_IMAGE_TAG", "1.9.0-istio-5-static"),
            opa_port: port("OPA_PORT", 8181)?,
            opa_url_env_var_name: optional("OPA_URL_ENV_VAR_NAME", "OPA_URL"),
        })
    }

    #[must_use]
    pub fn texas_image(&self) -> String {
        format!("{}:{}", self.texas_image_name, self.texas_image_tag)
    }

    #[must_use]
    pub fn opa_image(&self) -> String {
        format!("{}:{}", self.opa_image_name, self.opa_image_tag)
    }

    /// Loopback URL the application uses to reach Texas
    #[must_use]
    pub fn texas_url(&self) -> String {
        format!("http://localhost:{}", self.texas_port)
    }

    /// Loopback URL the application uses to reach OPA
    #[must_use]
    pub fn opa_url(&self) -> String {
        format!("http://localhost:{}", self.opa_port)
    }
}
