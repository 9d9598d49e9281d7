use super::PodSecurityConfiguration;
use k8s_openapi::api::core::v1::{Container, EnvVar, Pod};
use tracing::info;

/// Add the expected sidecars, env and volumes to `pod`
///
/// Applying it twice yields the same Pod: sidecars and env entries are
/// replaced by name, volumes are only added when no volume of that name
/// exists.
pub fn default_pod(pod: &mut Pod, expected: &PodSecurityConfiguration) {
    if !expected.security_enabled {
        return;
    }
    let Some(spec) = pod.spec.as_mut() else {
        return;
    };

    if let (Some(texas), Some(env)) = (&expected.texas_container, &expected.texas_url_env) {
        info!(application = %expected.app_name, "Injecting texas init container");
        upsert_container(spec.init_containers.get_or_insert_with(Vec::new), texas);
        inject_env(&mut spec.containers, &expected.app_name, env);
    }

    if let (Some(opa), Some(env)) = (&expected.opa_container, &expected.opa_url_env) {
        info!(application = %expected.app_name, "Injecting opa init container");
        upsert_container(spec.init_containers.get_or_insert_with(Vec::new), opa);
        let volumes = spec.volumes.get_or_insert_with(Vec::new);
        for volume in &expected.opa_volumes {
            if !volumes.iter().any(|v| v.name == volume.name) {
                volumes.push(volume.clone());
            }
        }
        inject_env(&mut spec.containers, &expected.app_name, env);
    }
}

fn upsert_container(containers: &mut Vec<Container>, container: &Container) {
    match containers.iter_mut().find(|c| c.name == container.name) {
        Some(existing) => *existing = container.clone(),
        None => containers.push(container.clone()),
    }
}

fn inject_env(containers: &mut [Container], app_name: &str, env: &EnvVar) {
    for container in containers.iter_mut().filter(|c| c.name == app_name) {
        let vars = container.env.get_or_insert_with(Vec::new);
        match vars.iter_mut().find(|v| v.name == env.name) {
            Some(existing) => *existing = env.clone(),
            None => vars.push(env.clone()),
        }
    }
}
