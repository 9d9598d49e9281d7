//! # Scope Resolver
//!
//! Turns a SecurityConfig plus live cluster state into a [`Scope`]. The only
//! cluster read is the referenced Application, and only when token exchange
//! is enabled. Misconfiguration is recorded on the Scope rather than returned
//! as an error, so the pass can still report it in status.

use crate::controller::scope::{AuthzConfig, BundleSource, Scope, TokenExchangeConfig};
use crate::crd::{Application, BundleSpec, OpaSpec, SecurityConfig};
use crate::store::{ResourceStore, StoreError};
use thiserror::Error;
use tracing::debug;

pub const BUNDLE_SOURCE_ERROR: &str = "exactly one of spec.opa.ghcr or spec.opa.pv must be set";

#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("failed to fetch Application resource named {name}: {source}")]
    ApplicationLookup {
        name: String,
        #[source]
        source: StoreError,
    },
}

pub async fn resolve<S: ResourceStore>(
    store: &S,
    security_config: &SecurityConfig,
) -> Result<Scope, ResolutionError> {
    let spec = &security_config.spec;
    let namespace = security_config
        .metadata
        .namespace
        .clone()
        .unwrap_or_default();
    let mut scope = Scope::new(security_config.clone());

    scope.authz = AuthzConfig {
        enabled: spec.opa_enabled(),
        bundle: None,
    };
    if let Some(opa) = spec.opa.as_ref().filter(|o| o.enabled) {
        match bundle_source(opa) {
            Some(source) => scope.authz.bundle = Some(source),
            None => scope.mark_invalid(BUNDLE_SOURCE_ERROR),
        }
    }

    if !spec.tokenx_enabled() {
        scope.token_exchange = TokenExchangeConfig::default();
        return Ok(scope);
    }

    debug!(application = %spec.application_ref, namespace = %namespace, "Fetching Application");
    let application: Application = store
        .get(&namespace, &spec.application_ref)
        .await
        .map_err(|source| ResolutionError::ApplicationLookup {
            name: spec.application_ref.clone(),
            source,
        })?;

    scope.token_exchange = TokenExchangeConfig {
        enabled: true,
        access_policy: application.spec.access_policy.clone(),
    };
    Ok(scope)
}

/// Registry or local-volume source; `None` when neither or both are set
fn bundle_source(opa: &OpaSpec) -> Option<BundleSource> {
    match (&opa.ghcr, &opa.pv) {
        (Some(ghcr), None) => Some(BundleSource::Registry {
            reference: bundle_reference(ghcr),
        }),
        (None, Some(pv)) => Some(BundleSource::LocalVolume {
            reference: bundle_reference(pv),
        }),
        _ => None,
    }
}

fn bundle_reference(bundle: &BundleSpec) -> String {
    if bundle.bundle_resource.is_empty() {
        format!("{}:{}", bundle.bundle_path, bundle.bundle_version)
    } else {
        format!(
            "{}/{}:{}",
            bundle.bundle_path, bundle.bundle_resource, bundle.bundle_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{AccessPolicy, ApplicationSpec, InboundPolicy, InternalRule, SecurityConfigSpec, TokenXSpec};
    use crate::store::MemoryStore;

    fn security_config(spec: SecurityConfigSpec) -> SecurityConfig {
        let mut sc = SecurityConfig::new("sc", spec);
        sc.metadata.namespace = Some("team".to_string());
        sc
    }

    fn bundle(resource: &str) -> BundleSpec {
        BundleSpec {
            bundle_path: "ghcr.io/org/bundles".to_string(),
            bundle_resource: resource.to_string(),
            bundle_version: "v1".to_string(),
        }
    }

    fn opa(ghcr: Option<BundleSpec>, pv: Option<BundleSpec>) -> OpaSpec {
        OpaSpec {
            enabled: true,
            ghcr,
            pv,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_tokenx_disabled_skips_application_lookup() {
        let store = MemoryStore::new();
        let scope = resolve(
            &store,
            &security_config(SecurityConfigSpec {
                application_ref: "missing".to_string(),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert!(!scope.token_exchange.enabled);
        assert!(!scope.authz.enabled);
        assert_eq!(scope.authz.bundle_url(), None);
        assert!(!scope.invalid_config);
    }

    #[tokio::test]
    async fn test_missing_application_is_resolution_error() {
        let store = MemoryStore::new();
        let err = resolve(
            &store,
            &security_config(SecurityConfigSpec {
                application_ref: "app".to_string(),
                tokenx: Some(TokenXSpec { enabled: true }),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "failed to fetch Application resource named app: Application team/app not found"
        );
    }

    #[tokio::test]
    async fn test_access_policy_copied_from_application() {
        let store = MemoryStore::new();
        let policy = AccessPolicy {
            inbound: Some(InboundPolicy {
                rules: vec![InternalRule {
                    application: "caller".to_string(),
                    ..Default::default()
                }],
            }),
            outbound: None,
        };
        let mut app = Application::new(
            "app",
            ApplicationSpec {
                access_policy: Some(policy.clone()),
                ..Default::default()
            },
        );
        app.metadata.namespace = Some("team".to_string());
        store.insert(app).unwrap();

        let scope = resolve(
            &store,
            &security_config(SecurityConfigSpec {
                application_ref: "app".to_string(),
                tokenx: Some(TokenXSpec { enabled: true }),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

        assert!(scope.token_exchange.enabled);
        assert_eq!(scope.token_exchange.access_policy, Some(policy));
    }

    #[tokio::test]
    async fn test_bundle_reference_forms() {
        let store = MemoryStore::new();
        let resolve_opa = |opa: OpaSpec| {
            security_config(SecurityConfigSpec {
                application_ref: "app".to_string(),
                opa: Some(opa),
                ..Default::default()
            })
        };

        let scope = resolve(&store, &resolve_opa(opa(Some(bundle("app")), None)))
            .await
            .unwrap();
        assert_eq!(
            scope.authz.bundle,
            Some(BundleSource::Registry {
                reference: "ghcr.io/org/bundles/app:v1".to_string()
            })
        );

        let scope = resolve(&store, &resolve_opa(opa(None, Some(bundle("")))))
            .await
            .unwrap();
        assert_eq!(
            scope.authz.bundle,
            Some(BundleSource::LocalVolume {
                reference: "ghcr.io/org/bundles:v1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_both_or_neither_bundle_source_is_invalid() {
        let store = MemoryStore::new();
        for opa_spec in [opa(None, None), opa(Some(bundle("a")), Some(bundle("b")))] {
            let scope = resolve(
                &store,
                &security_config(SecurityConfigSpec {
                    application_ref: "app".to_string(),
                    opa: Some(opa_spec),
                    ..Default::default()
                }),
            )
            .await
            .unwrap();
            assert!(scope.invalid_config);
            assert_eq!(scope.validation_error.as_deref(), Some(BUNDLE_SOURCE_ERROR));
            assert_eq!(scope.authz.bundle, None);
        }
    }

    #[tokio::test]
    async fn test_disabled_opa_ignores_bundle_fields() {
        let store = MemoryStore::new();
        let scope = resolve(
            &store,
            &security_config(SecurityConfigSpec {
                application_ref: "app".to_string(),
                opa: Some(OpaSpec {
                    enabled: false,
                    ..Default::default()
                }),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert!(!scope.invalid_config);
        assert_eq!(scope.authz.bundle, None);
    }
}
