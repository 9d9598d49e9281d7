//! # Custom Resource Definitions
//!
//! CRD types used by the operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - SecurityConfig specification (owned by this operator)
//! - `status.rs` - Status types for tracking reconciliation state
//! - `application.rs` - Skiperator `Application`, read for labels and access policy
//! - `jwker.rs` - nais `Jwker` client registration, created and watched for synchronization

mod application;
mod jwker;
mod spec;
mod status;

pub use application::{
    AccessPolicy, Application, ApplicationSpec, InboundPolicy, InternalRule, OutboundPolicy,
};
pub use jwker::{
    Jwker, JwkerAccessPolicy, JwkerAccessPolicyRule, JwkerInbound, JwkerOutbound, JwkerSpec,
    JwkerStatus,
};
pub use spec::{
    BundleSpec, ConfigMapKeyRef, OpaSpec, SecretKeyRef, SecurityConfig, SecurityConfigSpec,
    TokenXSpec,
};
pub use status::{Condition, ConditionStatus, Phase, SecurityConfigStatus};
