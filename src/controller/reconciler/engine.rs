//! # Convergence Engine
//!
//! Drives one owned resource toward its desired state and records the outcome
//! as a Descendant on the Scope. Every branch records exactly one Descendant.
//!
//! ## Flow
//!
//! - desired `None`: delete the live object if there is one
//! - desired set, live missing: set the controller owner reference and create
//! - desired set, live present: merge-patch the managed fields when they drift

use super::desired::{Desired, DesiredResource};
use super::kinds::OwnedKind;
use crate::controller::scope::{Outcome, Scope};
use crate::crd::SecurityConfig;
use crate::store::{merge_patch_diff, ResourceStore, StoreError};
use kube::Resource;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

/// Failure to converge one resource; displays the recorded message
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConvergenceError {
    pub kind: String,
    pub name: String,
    pub message: String,
    #[source]
    pub source: Option<StoreError>,
}

impl ConvergenceError {
    fn new(kind: &str, name: &str, message: String, source: Option<StoreError>) -> Self {
        Self {
            kind: kind.to_string(),
            name: name.to_string(),
            message,
            source,
        }
    }
}

/// Every convergence failure of one pass, in attempt order
#[derive(Debug, Default)]
pub struct AggregateError(pub Vec<ConvergenceError>);

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for AggregateError {}

impl AggregateError {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub async fn converge<S: ResourceStore>(
    store: &S,
    scope: &mut Scope,
    owner: &SecurityConfig,
    resource: DesiredResource,
) -> Result<(), ConvergenceError> {
    match resource {
        DesiredResource::Jwker(desired) => converge_resource(store, scope, owner, desired).await,
        DesiredResource::ConfigMap(desired) => converge_resource(store, scope, owner, desired).await,
        DesiredResource::Service(desired) => converge_resource(store, scope, owner, desired).await,
        DesiredResource::Deployment(desired) => {
            converge_resource(store, scope, owner, desired).await
        }
        DesiredResource::NetworkPolicy(desired) => {
            converge_resource(store, scope, owner, desired).await
        }
    }
}

async fn converge_resource<S: ResourceStore, K: OwnedKind>(
    store: &S,
    scope: &mut Scope,
    owner: &SecurityConfig,
    desired: Desired<K>,
) -> Result<(), ConvergenceError> {
    let namespace = scope.namespace().to_string();
    let Desired { name, object } = desired;
    let present = object.is_some();

    let result = match object {
        None => delete_if_exists::<S, K>(store, &namespace, &name).await,
        Some(object) => apply::<S, K>(store, owner, &namespace, &name, object).await,
    };

    match result {
        Ok(message) => {
            scope.replace_descendant(K::KIND, &name, present, Outcome::Success(message));
            Ok(())
        }
        Err(error) => {
            scope.replace_descendant(
                K::KIND,
                &name,
                present,
                Outcome::Error(error.message.clone()),
            );
            Err(error)
        }
    }
}

async fn delete_if_exists<S: ResourceStore, K: OwnedKind>(
    store: &S,
    namespace: &str,
    name: &str,
) -> Result<String, ConvergenceError> {
    let ident = format!("{} {namespace}/{name}", K::KIND);
    let absent = || format!("{ident} does not exist, nothing to delete.");

    match store.get::<K>(namespace, name).await {
        Err(e) if e.is_not_found() => {
            debug!("{ident} does not exist");
            Ok(absent())
        }
        Err(e) => Err(ConvergenceError::new(
            K::KIND,
            name,
            format!("Failed to get {ident} when trying to delete it."),
            Some(e),
        )),
        Ok(_) => match store.delete::<K>(namespace, name).await {
            Ok(()) => {
                info!("Deleted {ident}");
                Ok(format!("Deleted {ident} as it is no longer desired."))
            }
            Err(e) if e.is_not_found() => Ok(absent()),
            Err(e) => Err(ConvergenceError::new(
                K::KIND,
                name,
                format!("Failed to delete {ident}"),
                Some(e),
            )),
        },
    }
}

async fn apply<S: ResourceStore, K: OwnedKind>(
    store: &S,
    owner: &SecurityConfig,
    namespace: &str,
    name: &str,
    mut desired: K,
) -> Result<String, ConvergenceError> {
    let ident = format!("{} {namespace}/{name}", K::KIND);

    let current = match store.get::<K>(namespace, name).await {
        Ok(current) => current,
        Err(e) if e.is_not_found() => {
            let mut owner_ref = owner.controller_owner_ref(&()).ok_or_else(|| {
                ConvergenceError::new(
                    K::KIND,
                    name,
                    format!("Unable to set ownerReference on {ident}"),
                    None,
                )
            })?;
            // Foreground deletion of the SecurityConfig waits for its descendants
            owner_ref.block_owner_deletion = Some(true);
            desired.meta_mut().owner_references = Some(vec![owner_ref]);

            info!("Creating {ident}");
            store.create(namespace, &desired).await.map_err(|e| {
                ConvergenceError::new(K::KIND, name, format!("Unable to create {ident}"), Some(e))
            })?;
            return Ok(format!("Successfully created {ident}."));
        }
        Err(e) => {
            return Err(ConvergenceError::new(
                K::KIND,
                name,
                format!("Unable to get {ident}"),
                Some(e),
            ))
        }
    };

    if K::is_equal(&current, &desired) {
        debug!("{ident} is up to date");
    } else {
        let mut updated = current.clone();
        K::copy_fields(&mut updated, &desired);
        let patch_error = |e: StoreError| {
            ConvergenceError::new(K::KIND, name, format!("Unable to patch {ident}"), Some(e))
        };
        let before = serde_json::to_value(&current).map_err(|e| patch_error(e.into()))?;
        let after = serde_json::to_value(&updated).map_err(|e| patch_error(e.into()))?;

        info!("Patching {ident}");
        store
            .patch::<K>(namespace, name, &merge_patch_diff(&before, &after))
            .await
            .map_err(patch_error)?;
    }
    Ok(format!("Successfully generated {ident}"))
}
