//! # CRD Generator
//!
//! Prints the `SecurityConfig` CustomResourceDefinition as YAML.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/securityconfig.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use accesserator::crd::SecurityConfig;
use kube::core::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&SecurityConfig::crd())?);
    Ok(())
}
