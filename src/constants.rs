//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Default HTTP server port for the Pod admission endpoints
pub const DEFAULT_WEBHOOK_PORT: u16 = 9443;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default periodic resync interval for a healthy SecurityConfig (seconds)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Requeue interval while a SecurityConfig is Pending (seconds)
/// Short so the phase flips to Ready soon after the Jwker finishes synchronizing
pub const DEFAULT_PENDING_REQUEUE_SECS: u64 = 10;

/// Error backoff bounds (seconds) used by the error policy
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 60;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 600;

/// Attempts made when a status write hits an optimistic-concurrency conflict
pub const DEFAULT_STATUS_UPDATE_ATTEMPTS: u32 = 5;

/// First delay between conflicting status writes; doubled on every attempt
pub const DEFAULT_STATUS_UPDATE_BACKOFF_MS: u64 = 100;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default delay before restarting the watch stream after an error (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Backoff bounds when the API server throttles the watch (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 2000;
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30000;

/// Field manager / event reporter name
pub const CONTROLLER_NAME: &str = "accesserator";

/// Pod label carrying the Skiperator application name
pub const POD_APP_NAME_LABEL: &str = "application.skiperator.no/app-name";

/// Application label that opts an application into security sidecars
pub const SECURITY_LABEL_KEY: &str = "skiperator/security";
pub const SECURITY_LABEL_ENABLED: &str = "enabled";

/// Jwker synchronization state that means the client registration is live
pub const JWKER_ROLLOUT_COMPLETE: &str = "RolloutComplete";

/// Name suffixes for generated resources
pub const JWKER_SECRET_NAME_SUFFIX: &str = "jwker-secret";
pub const OPA_CONFIG_NAME_SUFFIX: &str = "opa-config";
pub const OPA_DISCOVERY_CONFIG_NAME_SUFFIX: &str = "opa-discovery-config";
pub const OPA_DISCOVERY_NAME_SUFFIX: &str = "opa-discovery";
pub const OPA_DISCOVERY_EGRESS_NAME_SUFFIX: &str = "opa-discovery-egress";
pub const OPA_DISCOVERY_INGRESS_NAME_SUFFIX: &str = "opa-discovery-ingress";
pub const EGRESS_NAME_SUFFIX: &str = "egress";

/// Deferred placeholders resolved inside the OPA container
pub const OPA_GITHUB_TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";
pub const OPA_PUBLIC_KEY_ENV_VAR: &str = "OPA_PUBLIC_KEY";

/// ConfigMap keys
pub const OPA_CONFIG_FILE_NAME: &str = "config.yaml";
pub const OPA_DISCOVERY_BUNDLE_FILE_NAME: &str = "discovery.tar.gz";
pub const OPA_DISCOVERY_NGINX_CONFIG_FILE_NAME: &str = "default.conf";

/// Discovery server
pub const OPA_DISCOVERY_CONTAINER_NAME: &str = "opa-discovery";
pub const OPA_DISCOVERY_COMPONENT: &str = "opa-discovery";
pub const OPA_DISCOVERY_IMAGE: &str = "nginxinc/nginx-unprivileged:latest";
pub const OPA_DISCOVERY_CONTAINER_PORT: i32 = 8080;
pub const OPA_DISCOVERY_SERVICE_PORT: i32 = 80;
pub const OPA_DISCOVERY_RESOURCE_PATH: &str = "/discovery.json";
pub const OPA_DISCOVERY_MOUNT_PATH: &str = "/etc/nginx/conf.d";
pub const OPA_DISCOVERY_VOLUME_NAME: &str = "discovery";

/// OPA service and key names used in generated documents
pub const OPA_REGISTRY_SERVICE_NAME: &str = "ghcr-registry";
pub const OPA_REGISTRY_URL: &str = "https://ghcr.io";
pub const OPA_DISCOVERY_SERVICE_NAME: &str = "discovery-server";
pub const OPA_BUNDLE_NAME: &str = "authz";
pub const OPA_SIGNING_KEY_ID: &str = "bundle-verification-key";
pub const OPA_BUNDLE_MIN_DELAY_SECONDS: u32 = 10;
pub const OPA_BUNDLE_MAX_DELAY_SECONDS: u32 = 30;
