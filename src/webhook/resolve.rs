use super::{AdmissionError, PodSecurityConfiguration};
use crate::config::OperatorConfig;
use crate::constants::{POD_APP_NAME_LABEL, SECURITY_LABEL_ENABLED, SECURITY_LABEL_KEY};
use crate::crd::{Application, SecurityConfig};
use crate::sidecar::{opa_container, opa_url_env, opa_volumes, texas_container, texas_url_env};
use crate::store::ResourceStore;
use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, info};

/// Find the SecurityConfig governing `pod` and derive its expected sidecars
///
/// The Pod's namespace must be set; admission fills it from the request when
/// the object itself carries none.
pub async fn resolve_pod_security_configuration<S: ResourceStore>(
    store: &S,
    pod: &Pod,
    config: &OperatorConfig,
) -> Result<PodSecurityConfiguration, AdmissionError> {
    let Some(app_name) = pod
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(POD_APP_NAME_LABEL))
        .cloned()
    else {
        return Ok(PodSecurityConfiguration::disabled(""));
    };
    let namespace = pod.metadata.namespace.clone().unwrap_or_default();

    debug!(application = %app_name, namespace = %namespace, "Fetching Application resource");
    let application: Application = store
        .get(&namespace, &app_name)
        .await
        .map_err(|source| AdmissionError::ApplicationLookup {
            app: app_name.clone(),
            source,
        })?;

    let security_label = application
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(SECURITY_LABEL_KEY));
    if security_label.map(String::as_str) != Some(SECURITY_LABEL_ENABLED) {
        return Ok(PodSecurityConfiguration::disabled(app_name));
    }

    let mut matching: Vec<SecurityConfig> = store
        .list::<SecurityConfig>(&namespace)
        .await
        .map_err(AdmissionError::SecurityConfigLookup)?
        .into_iter()
        .filter(|sc| sc.spec.application_ref == app_name)
        .collect();

    let security_config = match matching.len() {
        0 => {
            info!(application = %app_name, "No SecurityConfig found for Application");
            return Err(AdmissionError::NoSecurityConfig { app: app_name });
        }
        1 => matching.remove(0),
        _ => {
            info!(application = %app_name, "Multiple SecurityConfigs found for Application");
            return Err(AdmissionError::MultipleSecurityConfigs { app: app_name });
        }
    };

    let spec = &security_config.spec;
    let mut resolved = PodSecurityConfiguration {
        app_name,
        namespace,
        security_enabled: true,
        ..Default::default()
    };
    if spec.tokenx_enabled() {
        resolved.texas_container = Some(texas_container(config, &spec.application_ref));
        resolved.texas_url_env = Some(texas_url_env(config));
    }
    if let Some(opa) = spec.opa.as_ref().filter(|o| o.enabled) {
        resolved.opa_container = Some(opa_container(config, opa));
        resolved.opa_url_env = Some(opa_url_env(config));
        resolved.opa_volumes = opa_volumes(&spec.application_ref);
    }
    resolved.security_config = Some(security_config);
    Ok(resolved)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::controller::generators::test_support::config;
    use crate::store::{MemoryStore, StoreOp};

    #[tokio::test]
    async fn test_unlabelled_pod_is_not_secured() {
        let store = MemoryStore::new();
        let resolved = resolve_pod_security_configuration(&store, &pod(None), &config())
            .await
            .unwrap();
        assert!(!resolved.security_enabled);
    }

    #[tokio::test]
    async fn test_missing_application_fails_closed() {
        let store = MemoryStore::new();
        let err = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to fetch Application resource named app: "));
    }

    #[tokio::test]
    async fn test_application_without_security_label_is_not_secured() {
        let store = MemoryStore::new();
        store.insert(application("app", false)).unwrap();
        let resolved = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap();
        assert!(!resolved.security_enabled);
        assert_eq!(resolved.app_name, "app");
    }

    #[tokio::test]
    async fn test_secured_application_needs_exactly_one_security_config() {
        let store = MemoryStore::new();
        store.insert(application("app", true)).unwrap();
        store
            .insert(security_config("other", "another-app", true, false))
            .unwrap();

        let err = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::NoSecurityConfig { .. }));

        store.insert(security_config("a", "app", true, false)).unwrap();
        store.insert(security_config("b", "app", true, false)).unwrap();
        let err = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "multiple SecurityConfig resources found for Application"
        );
    }

    #[tokio::test]
    async fn test_listing_failure_is_reported() {
        let store = MemoryStore::new();
        store.insert(application("app", true)).unwrap();
        store.fail_on(StoreOp::List, "SecurityConfig", "", "etcd unavailable");
        let err = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("failed to fetch SecurityConfig resources: "));
    }

    #[tokio::test]
    async fn test_expected_sidecars_follow_enabled_features() {
        let store = MemoryStore::new();
        store.insert(application("app", true)).unwrap();
        store.insert(security_config("sc", "app", true, false)).unwrap();

        let resolved = resolve_pod_security_configuration(&store, &pod(Some("app")), &config())
            .await
            .unwrap();
        assert!(resolved.security_enabled);
        assert_eq!(resolved.texas_container.unwrap().name, "texas");
        assert!(resolved.opa_container.is_none());
        assert!(resolved.opa_volumes.is_empty());
    }
}
