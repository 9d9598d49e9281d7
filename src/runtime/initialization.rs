//! # Initialization
//!
//! Operator initialization: tracing, rustls setup, configuration, metrics,
//! server startup and Kubernetes client setup.

use crate::config::{ControllerConfig, OperatorConfig, ServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::Reconciler;
use crate::crd::SecurityConfig;
use crate::events::KubeEventPublisher;
use crate::observability;
use crate::server::{start_server, ServerState};
use crate::store::KubeStore;
use crate::webhook::{start_webhook_server, WebhookState};
use anyhow::{Context, Result};
use kube::{
    api::{Api, ListParams},
    Client,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop needs once startup is complete
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// This function handles:
/// - Tracing subscriber setup
/// - rustls crypto provider setup
/// - Configuration loading (fails on missing `ACCESSERATOR_*` variables)
/// - Metrics registration
/// - Metrics/probe server and admission server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize(server_config: ServerConfig) -> Result<InitializationResult> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "accesserator=info".into()),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    // Required for rustls 0.23+ before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed, keeping it");
    }

    info!("Starting accesserator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let operator_config = Arc::new(
        OperatorConfig::from_env().context("Failed to load operator configuration")?,
    );
    let controller_config = ControllerConfig::from_env();
    info!(
        cluster = %operator_config.cluster_name,
        tokenx = %format!("{}/{}", operator_config.tokenx_namespace, operator_config.tokenx_name),
        texas_image = %operator_config.texas_image(),
        opa_image = %operator_config.opa_image(),
        "Loaded operator configuration"
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let metrics_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(metrics_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default().await?;
    let store = KubeStore::new(client.clone());

    let webhook_state = Arc::new(WebhookState {
        store: store.clone(),
        config: Arc::clone(&operator_config),
    });
    let webhook_port = server_config.webhook_port;
    tokio::spawn(async move {
        if let Err(e) = start_webhook_server(webhook_port, webhook_state).await {
            error!("Admission server error: {}", e);
        }
    });

    let events = Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME));
    let reconciler = Arc::new(Reconciler::new(
        operator_config,
        controller_config,
        store,
        events,
    ));

    check_crd_queryable(&Api::<SecurityConfig>::all(client.clone())).await?;

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state
            .is_ready
            .load(std::sync::atomic::Ordering::Relaxed)
        {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}

/// Fail startup when the SecurityConfig CRD is not installed
///
/// Existing resources are reconciled by the controller's initial list; this
/// only reports what it is about to pick up.
async fn check_crd_queryable(configs: &Api<SecurityConfig>) -> Result<()> {
    let span = tracing::span!(
        tracing::Level::INFO,
        "controller.startup.check_crd",
        operation = "check_crd_queryable"
    );
    let _guard = span.enter();

    let list = configs
        .list(&ListParams::default())
        .await
        .context("SecurityConfig CRD is not queryable; is it installed?")?;

    let mut by_namespace: BTreeMap<String, usize> = BTreeMap::new();
    for item in &list.items {
        let namespace = item.metadata.namespace.clone().unwrap_or_default();
        *by_namespace.entry(namespace).or_default() += 1;
    }
    info!(
        "CRD is queryable, found {} existing SecurityConfig resources",
        list.items.len()
    );
    for (namespace, count) in &by_namespace {
        info!("  {namespace}: {count}");
    }
    Ok(())
}
