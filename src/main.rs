//! # Accesserator
//!
//! A Kubernetes operator that gives Skiperator applications token exchange
//! and authorization sidecars.
//!
//! ## Overview
//!
//! For every `SecurityConfig` the operator:
//!
//! 1. **Registers the application with TokenX** - creates a nais `Jwker` and
//!    an egress NetworkPolicy to the token broker
//! 2. **Configures OPA** - renders the OPA config and serves a discovery bundle
//!    from a small nginx Deployment
//! 3. **Reports status** - aggregates the outcome of every owned resource into
//!    `status.phase` and conditions
//!
//! Pods of applications labelled `skiperator/security=enabled` get the Texas
//! and OPA sidecars injected on admission and are rejected when they differ.

use accesserator::config::ServerConfig;
use accesserator::runtime::{initialize, run_watch_loop};
use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "accesserator", version, about = "SecurityConfig operator and Pod admission webhook")]
struct Args {
    /// Port serving /metrics, /healthz and /readyz
    #[arg(long, env = "METRICS_PORT")]
    metrics_port: Option<u16>,
    /// Port serving the Pod admission endpoints
    #[arg(long, env = "WEBHOOK_PORT")]
    webhook_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut server_config = ServerConfig::from_env();
    if let Some(port) = args.metrics_port {
        server_config.metrics_port = port;
    }
    if let Some(port) = args.webhook_port {
        server_config.webhook_port = port;
    }

    let init = initialize(server_config).await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
