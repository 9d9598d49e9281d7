//! # Resource Store
//!
//! The narrow accessor the reconcile pass, the resolvers and the admission
//! engine use to read and write cluster objects.
//!
//! - `kube.rs` - [`KubeStore`], backed by a `kube::Client`
//! - `memory.rs` - [`MemoryStore`], an in-process store with failure injection
//! - `patch.rs` - RFC 7386 merge patch helpers
//!
//! Every method is generic over the object kind, so one store serves
//! SecurityConfigs, Applications, Jwkers and the core kinds alike. NotFound and
//! Conflict are distinguishable so callers can branch on them.

mod kube;
mod memory;
mod patch;

pub use self::kube::KubeStore;
pub use memory::{MemoryStore, StoreOp};
pub use patch::{apply_merge_patch, json_is_subset, merge_patch_diff};

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// Any namespaced object the store can carry
pub trait StoreObject:
    ::kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<T> StoreObject for T where
    T: ::kube::Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("conflict writing {kind} {namespace}/{name}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },
    #[error("kubernetes api error: {0}")]
    Api(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError>;

    async fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>, StoreError>;

    /// Create `object`; fails with Conflict when it already exists
    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError>;

    /// Apply an RFC 7386 merge patch to the main resource
    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Apply an RFC 7386 merge patch to the status subresource
    ///
    /// A `metadata.resourceVersion` in the patch acts as a precondition.
    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError>;
}

pub(crate) fn kind_of<K: StoreObject>() -> String {
    K::kind(&()).into_owned()
}
