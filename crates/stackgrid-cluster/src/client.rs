//! `kube`-backed cluster collaborator.

use async_trait::async_trait;
use kube::Api;
use kube::api::{DeleteParams, ListParams, PostParams};
use tracing::debug;

use crate::api::{ClusterResource, ResourceApi, kind_of};
use crate::error::ClusterResult;

/// Talks to a real API server through a shared `kube::Client`.
#[derive(Clone)]
pub struct KubeCluster {
    client: kube::Client,
}

impl KubeCluster {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Infer configuration from the environment (kubeconfig or in-cluster).
    pub async fn try_default() -> ClusterResult<Self> {
        let client = kube::Client::try_default().await?;
        Ok(Self::new(client))
    }

    fn api<K: ClusterResource>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K: ClusterResource> ResourceApi<K> for KubeCluster {
    async fn list(&self, namespace: &str) -> ClusterResult<Vec<K>> {
        let items = self.api::<K>(namespace).list(&ListParams::default()).await?.items;
        debug!(kind = %kind_of::<K>(), namespace, count = items.len(), "listed");
        Ok(items)
    }

    async fn create(&self, namespace: &str, resource: &K) -> ClusterResult<K> {
        Ok(self
            .api::<K>(namespace)
            .create(&PostParams::default(), resource)
            .await?)
    }

    async fn replace(&self, namespace: &str, name: &str, resource: &K) -> ClusterResult<K> {
        Ok(self
            .api::<K>(namespace)
            .replace(name, &PostParams::default(), resource)
            .await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        // Either the deleted object or a pending-deletion status; both are success.
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn read(&self, namespace: &str, name: &str) -> ClusterResult<K> {
        Ok(self.api::<K>(namespace).get(name).await?)
    }
}
