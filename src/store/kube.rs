//! # Kubernetes-backed store

use super::{kind_of, ResourceStore, StoreError, StoreObject};
use crate::constants::CONTROLLER_NAME;
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K: StoreObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn map_error<K: StoreObject>(err: kube::Error, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
            kind: kind_of::<K>(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
            kind: kind_of::<K>(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        other => StoreError::Api(other.to_string()),
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(CONTROLLER_NAME.to_string()),
        ..PatchParams::default()
    }
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<K, StoreError> {
        self.api::<K>(namespace)
            .get(name)
            .await
            .map_err(|e| map_error::<K>(e, namespace, name))
    }

    async fn list<K: StoreObject>(&self, namespace: &str) -> Result<Vec<K>, StoreError> {
        self.api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| map_error::<K>(e, namespace, ""))
    }

    async fn create<K: StoreObject>(&self, namespace: &str, object: &K) -> Result<K, StoreError> {
        let name = object.meta().name.clone().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..PostParams::default()
        };
        self.api::<K>(namespace)
            .create(&params, object)
            .await
            .map_err(|e| map_error::<K>(e, namespace, &name))
    }

    async fn patch<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        self.api::<K>(namespace)
            .patch(name, &patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_error::<K>(e, namespace, name))
    }

    async fn delete<K: StoreObject>(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map(|_| ())
            .map_err(|e| map_error::<K>(e, namespace, name))
    }

    async fn patch_status<K: StoreObject>(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<K, StoreError> {
        self.api::<K>(namespace)
            .patch_status(name, &patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_error::<K>(e, namespace, name))
    }
}
