//! # Watch Loop
//!
//! Controller watch loop over SecurityConfig resources. Reconciliation is
//! also triggered by changes to anything a SecurityConfig owns, and by
//! Application changes, which map to every SecurityConfig in the namespace.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::crd::{Application, Jwker, SecurityConfig};
use crate::runtime::error_policy::{handle_controller_error, handle_reconciliation_error};
use crate::server::ServerState;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::api::Api;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::{Client, ResourceExt};
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop until shutdown is requested
///
/// The watch is restarted whenever its stream ends or fails; the server's
/// readiness flag doubles as the shutdown signal.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let controller_config = reconciler.controller_config.clone();
    let backoff_duration_ms = Arc::new(AtomicU64::new(controller_config.watch_backoff_start_ms));

    // Kubernetes sends SIGTERM; the controller drains in-flight reconciles on
    // its own via shutdown_on_signal
    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_server_state.set_ready(false);
        }
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let config = controller_config.clone();
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!("Starting controller watch loop...");
        let controller = Controller::new(
            Api::<SecurityConfig>::all(client.clone()),
            watcher::Config::default().any_semantic(),
        );
        let security_configs = controller.store();

        controller
            .owns(Api::<Jwker>::all(client.clone()), watcher::Config::default())
            .owns(Api::<ConfigMap>::all(client.clone()), watcher::Config::default())
            .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
            .owns(Api::<Deployment>::all(client.clone()), watcher::Config::default())
            .owns(Api::<NetworkPolicy>::all(client.clone()), watcher::Config::default())
            .watches(
                Api::<Application>::all(client.clone()),
                watcher::Config::default(),
                move |application: Application| {
                    security_configs_in_namespace(&security_configs, &application)
                },
            )
            .shutdown_on_signal()
            .run(
                |obj, ctx| {
                    let span = tracing::span!(
                        tracing::Level::INFO,
                        "controller.watch.reconcile",
                        resource.name = obj.name_any().as_str(),
                        resource.namespace = obj.namespace().unwrap_or_default().as_str(),
                        resource.version = obj.resource_version().unwrap_or_default().as_str(),
                        resource.generation = obj.metadata.generation.unwrap_or(0),
                        event.r#type = "watch_triggered"
                    );
                    reconcile(obj, ctx).instrument(span)
                },
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .filter_map(move |x| {
                let backoff = Arc::clone(&backoff);
                let config = config.clone();
                async move {
                    match &x {
                        Ok(_) => {
                            backoff.store(config.watch_backoff_start_ms, Ordering::Relaxed);
                            debug!("watch.event.success");
                            Some(x)
                        }
                        Err(e) => {
                            let keep = handle_controller_error(
                                e,
                                &backoff,
                                config.watch_backoff_max_ms,
                                std::time::Duration::from_secs(config.watch_restart_delay_secs),
                            )
                            .await;
                            keep.map(|()| x)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Every cached SecurityConfig in the Application's namespace
fn security_configs_in_namespace(
    store: &Store<SecurityConfig>,
    application: &Application,
) -> Vec<ObjectRef<SecurityConfig>> {
    let namespace = application.namespace();
    store
        .state()
        .into_iter()
        .filter(|sc| sc.namespace() == namespace)
        .map(|sc| ObjectRef::from_obj(sc.as_ref()))
        .collect()
}
