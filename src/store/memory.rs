//! # In-memory store
//!
//! Holds objects as JSON keyed by `(kind, namespace, name)`. Writes bump
//! `metadata.resourceVersion`; creates assign a `uid`. Failures can be injected
//! per operation and object, and status writes can be made to conflict a fixed
//! number of times.

use super::{apply_merge_patch, kind_of, ResourceStore, StoreError, StoreObject};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    List,
    Create,
    Patch,
    Delete,
    PatchStatus,
}

type Key = (String, String, String);

#[derive(Debug, Default)]
struct Inner {
    objects: BTreeMap<Key, Value>,
    next_version: u64,
    /// (op, kind, name) -> message; name is empty for list
    failures: HashMap<(StoreOp, String, String), String>,
    status_conflicts: u32,
    mutations: Vec<(StoreOp, String, String)>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed an object, assigning uid and resourceVersion when missing
    pub fn insert<K: StoreObject>(&self, object: K) -> Result<K, StoreError> {
        let namespace = object.meta().namespace.clone().unwrap_or_default();
        let name = object.meta().name.clone().unwrap_or_default();
        let mut inner = self.lock();
        let mut value = serde_json::to_value(&object)?;
        inner.stamp_new(&mut value);
        inner
            .objects
            .insert((kind_of::<K>(), namespace, name), value.clone());
        Ok(serde_json::from_value(value)?)
    }

    /// Make every `op` on `kind`/`name` fail with `message` until cleared
    pub fn fail_on(&self, op: StoreOp, kind: &str, name: &str, message: &str) {
        self.lock()
            .failures
            .insert((op, kind.to_string(), name.to_string()), message.to_string());
    }

    pub fn clear_failure(&self, op: StoreOp, kind: &str, name: &str) {
        self.lock()
            .failures
            .remove(&(op, kind.to_string(), name.to_string()));
    }

    /// Make the next `count` status writes fail with Conflict
    pub fn conflict_next_status_writes(&self, count: u32) {
        self.lock().status_conflicts = count;
    }

    /// Successful writes in the order they happened, as `(op, kind, name)`
    #[must_use]
    pub fn mutations(&self) -> Vec<(StoreOp, String, String)> {
        self.lock().mutations.clone()
    }

    pub fn clear_mutations(&self) {
        self.lock().mutations.clear();
    }

    #[must_use]
    pub fn contains<K: StoreObject>(&self, namespace: &str, name: &str) -> bool {
        self.lock().objects.contains_key(&key::<K>(namespace, name))
    }

    /// Number of objects of kind `K` in `namespace`
    #[must_use]
    pub fn count<K: StoreObject>(&self, namespace: &str) -> usize {
        let kind = kind_of::<K>();
        self.lock()
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .count()
    }
}

fn key<K: StoreObject>(namespace: &str, name: &str) -> Key {
    (kind_of::<K>(), namespace.to_string(), name.to_string())
}

fn not_found<K: StoreObject>(namespace: &str, name: &str) -> StoreError {
    StoreError::NotFound {
        kind: kind_of::<K>(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn conflict<K: StoreObject>(namespace: &str, name: &str) -> StoreError {
    StoreError::Conflict {
        kind: kind_of::<K>(),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn resource_version(value: &Value) -> Option<&str> {
    value.pointer("/metadata/resourceVersion").and_then(Value::as_str)
}

impl Inner {
    fn injected<K: StoreObject>(&self, op: StoreOp, name: &str) -> Result<(), StoreError> {
        match self.failures.get(&(op, kind_of::<K>(), name.to_string())) {
            Some(message) => Err(StoreError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn bump(&mut self, value: &mut Value) {
        self.next_version += 1;
        if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert(
                "resourceVersion".to_string(),
                Value::String(self.next_version.to_string()),
            );
        }
    }

    fn stamp_new(&mut self, value: &mut Value) {
        if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            if !meta.contains_key("uid") {
                meta.insert(
                    "uid".to_string(),
                    Value::String(format!("uid-{}", self.next_version + 1)),
                );
            }
            meta.entry("generation").or_insert(Value::from(1));
        }
        self.bump(value);
    }

    fn record(&mut self, op: StoreOp, kind: String, name: &str) {
        self.mutations.push((op, kind, name.to_string()));
    }

    /// Check and strip a resourceVersion precondition carried in a patch
    fn precondition<K: StoreObject>(
        current: &Value,
        patch: &Value,
        namespace: &str,
        name: &str,
    ) -> Result<Value, StoreError> {
        let mut patch = patch.clone();
        if let Some(expected) = resource_version(&patch) {
            if Some(expected) != resource_version(current) {
                return Err(conflict::<K>(namespace, name));
            }
            if let Some(meta) = patch.get_mut("metadata").and_then(Value::as_object_mut) {
                meta.remove("resourceVersion");
            }
        }
        Ok(patch)
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        let inner = self.lock();
        inner.injected::<K>(StoreOp::Get, name)?;
        let value = inner
            .objects
            .get(&key::<K>(namespace, name))
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        let inner = self.lock();
        inner.injected::<K>(StoreOp::List, "")?;
        let kind = kind_of::<K>();
        inner
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.meta().name.clone().unwrap_or_default();
        let mut inner = self.lock();
        inner.injected::<K>(StoreOp::Create, &name)?;
        let key = key::<K>(namespace, &name);
        if inner.objects.contains_key(&key) {
            return Err(conflict::<K>(namespace, &name));
        }
        let mut value = serde_json::to_value(object)?;
        if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("namespace".to_string(), Value::String(namespace.to_string()));
        }
        inner.stamp_new(&mut value);
        inner.objects.insert(key, value.clone());
        inner.record(StoreOp::Create, kind_of::<K>(), &name);
        Ok(serde_json::from_value(value)?)
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let mut inner = self.lock();
        inner.injected::<K>(StoreOp::Patch, name)?;
        let key = key::<K>(namespace, name);
        let current = inner
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        let mut patch = Inner::precondition::<K>(&current, patch, namespace, name)?;
        // the main resource endpoint never writes status
        if let Some(map) = patch.as_object_mut() {
            map.remove("status");
        }

        let mut updated = current.clone();
        apply_merge_patch(&mut updated, &patch);
        if updated.get("spec") != current.get("spec") {
            let generation = current
                .pointer("/metadata/generation")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            if let Some(meta) = updated.get_mut("metadata").and_then(Value::as_object_mut) {
                meta.insert("generation".to_string(), Value::from(generation + 1));
            }
        }
        inner.bump(&mut updated);
        inner.objects.insert(key, updated.clone());
        inner.record(StoreOp::Patch, kind_of::<K>(), name);
        Ok(serde_json::from_value(updated)?)
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.injected::<K>(StoreOp::Delete, name)?;
        if inner.objects.remove(&key::<K>(namespace, name)).is_none() {
            return Err(not_found::<K>(namespace, name));
        }
        inner.record(StoreOp::Delete, kind_of::<K>(), name);
        Ok(())
    }

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<K, StoreError> {
        let mut inner = self.lock();
        inner.injected::<K>(StoreOp::PatchStatus, name)?;
        if inner.status_conflicts > 0 {
            inner.status_conflicts -= 1;
            return Err(conflict::<K>(namespace, name));
        }
        let key = key::<K>(namespace, name);
        let current = inner
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found::<K>(namespace, name))?;
        let patch = Inner::precondition::<K>(&current, patch, namespace, name)?;

        let mut updated = current;
        if let Some(status_patch) = patch.get("status") {
            let mut wrapper = serde_json::json!({});
            if let Some(map) = wrapper.as_object_mut() {
                map.insert("status".to_string(), status_patch.clone());
            }
            apply_merge_patch(&mut updated, &wrapper);
        }
        inner.bump(&mut updated);
        inner.objects.insert(key, updated.clone());
        inner.record(StoreOp::PatchStatus, kind_of::<K>(), name);
        Ok(serde_json::from_value(updated)?)
    }
}
