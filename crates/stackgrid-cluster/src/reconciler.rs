//! Idempotent upsert and delete over any resource kind.
//!
//! Existence is decided by listing the namespace and matching on name. No
//! retries: API failures propagate to the caller unchanged.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::{ClusterResource, ResourceApi, kind_of, name_of};
use crate::error::{ClusterError, ClusterResult};

/// What `ensure` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Updated,
}

/// What `ensure_deleted` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent,
}

/// Binds a cluster backend to the namespace all stacks live in.
pub struct Reconciler<C: ?Sized> {
    cluster: Arc<C>,
    namespace: String,
}

impl<C: ?Sized> Clone for Reconciler<C> {
    fn clone(&self) -> Self {
        Self {
            cluster: Arc::clone(&self.cluster),
            namespace: self.namespace.clone(),
        }
    }
}

impl<C: ?Sized> Reconciler<C> {
    pub fn new(cluster: Arc<C>, namespace: impl Into<String>) -> Self {
        Self {
            cluster,
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cluster(&self) -> &Arc<C> {
        &self.cluster
    }

    /// Create `desired` if nothing of its kind carries its name, otherwise
    /// replace the existing object wholesale.
    pub async fn ensure<K>(&self, desired: &K) -> ClusterResult<EnsureOutcome>
    where
        K: ClusterResource,
        C: ResourceApi<K>,
    {
        let kind = kind_of::<K>();
        let name = name_of(desired)
            .ok_or_else(|| ClusterError::MissingName { kind: kind.clone() })?
            .to_string();
        let ns = self.namespace.as_str();

        if self.exists::<K>(&name).await? {
            ResourceApi::<K>::replace(self.cluster.as_ref(), ns, &name, desired).await?;
            info!(kind = %kind, name = %name, namespace = %ns, "updated");
            Ok(EnsureOutcome::Updated)
        } else {
            ResourceApi::<K>::create(self.cluster.as_ref(), ns, desired).await?;
            info!(kind = %kind, name = %name, namespace = %ns, "created");
            Ok(EnsureOutcome::Created)
        }
    }

    /// Delete the object called `name` if present. Absence is not an error.
    pub async fn ensure_deleted<K>(&self, name: &str) -> ClusterResult<DeleteOutcome>
    where
        K: ClusterResource,
        C: ResourceApi<K>,
    {
        let kind = kind_of::<K>();
        let ns = self.namespace.as_str();

        if self.exists::<K>(name).await? {
            ResourceApi::<K>::delete(self.cluster.as_ref(), ns, name).await?;
            info!(kind = %kind, name = %name, namespace = %ns, "deleted");
            Ok(DeleteOutcome::Deleted)
        } else {
            warn!(kind = %kind, name = %name, namespace = %ns, "does not exist");
            Ok(DeleteOutcome::Absent)
        }
    }

    /// Whether an object of kind `K` called `name` is listed.
    pub async fn exists<K>(&self, name: &str) -> ClusterResult<bool>
    where
        K: ClusterResource,
        C: ResourceApi<K>,
    {
        let items = ResourceApi::<K>::list(self.cluster.as_ref(), &self.namespace).await?;
        let found = items.iter().any(|item| name_of(item) == Some(name));
        debug!(kind = %kind_of::<K>(), name, found, "existence check");
        Ok(found)
    }

    /// List-then-read: `None` when the object is not listed.
    pub async fn fetch<K>(&self, name: &str) -> ClusterResult<Option<K>>
    where
        K: ClusterResource,
        C: ResourceApi<K>,
    {
        if !self.exists::<K>(name).await? {
            return Ok(None);
        }
        let resource = ResourceApi::<K>::read(self.cluster.as_ref(), &self.namespace, name).await?;
        Ok(Some(resource))
    }

    /// Overwrite an object known to exist.
    pub async fn replace<K>(&self, name: &str, resource: &K) -> ClusterResult<K>
    where
        K: ClusterResource,
        C: ResourceApi<K>,
    {
        let replaced =
            ResourceApi::<K>::replace(self.cluster.as_ref(), &self.namespace, name, resource).await?;
        info!(kind = %kind_of::<K>(), name = %name, namespace = %self.namespace, "updated");
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::{ConfigMap, Service};
    use kube::api::ObjectMeta;

    use super::*;
    use crate::api::Verb;
    use crate::memory::InMemoryCluster;

    fn cm(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("f".to_string(), value.to_string())])),
            ..ConfigMap::default()
        }
    }

    fn reconciler() -> (Arc<InMemoryCluster>, Reconciler<InMemoryCluster>) {
        let cluster = Arc::new(InMemoryCluster::new());
        (cluster.clone(), Reconciler::new(cluster, "apps"))
    }

    #[tokio::test]
    async fn ensure_creates_then_updates() {
        let (cluster, rec) = reconciler();
        assert_eq!(rec.ensure(&cm("a", "1")).await.unwrap(), EnsureOutcome::Created);
        assert_eq!(rec.ensure(&cm("a", "2")).await.unwrap(), EnsureOutcome::Updated);

        let stored: ConfigMap = cluster.get("apps", "a").unwrap();
        assert_eq!(stored.data.unwrap()["f"], "2");
        assert_eq!(cluster.mutations(), vec!["create ConfigMap/a", "replace ConfigMap/a"]);
    }

    #[tokio::test]
    async fn ensure_matches_by_name_only_within_kind() {
        let (_, rec) = reconciler();
        rec.ensure(&cm("a", "1")).await.unwrap();
        assert_eq!(rec.ensure(&cm("b", "1")).await.unwrap(), EnsureOutcome::Created);
        assert!(!rec.exists::<Service>("a").await.unwrap());
    }

    #[tokio::test]
    async fn ensure_deleted_is_idempotent() {
        let (cluster, rec) = reconciler();
        rec.ensure(&cm("a", "1")).await.unwrap();
        assert_eq!(rec.ensure_deleted::<ConfigMap>("a").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(rec.ensure_deleted::<ConfigMap>("a").await.unwrap(), DeleteOutcome::Absent);
        assert_eq!(cluster.count::<ConfigMap>("apps"), 0);
    }

    #[tokio::test]
    async fn api_failure_propagates_without_retry() {
        let (cluster, rec) = reconciler();
        cluster.fail_on::<ConfigMap>(Verb::Create);
        let err = rec.ensure(&cm("a", "1")).await.unwrap_err();
        assert!(matches!(err, ClusterError::Injected { .. }));
        assert_eq!(cluster.mutations(), vec!["create ConfigMap/a"]);
    }

    #[tokio::test]
    async fn fetch_absent_skips_read() {
        let (cluster, rec) = reconciler();
        assert!(rec.fetch::<ConfigMap>("a").await.unwrap().is_none());
        assert!(cluster.mutations().is_empty());

        rec.ensure(&cm("a", "1")).await.unwrap();
        let found = rec.fetch::<ConfigMap>("a").await.unwrap().unwrap();
        assert_eq!(found.metadata.name.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn unnamed_definition_is_rejected() {
        let (_, rec) = reconciler();
        let err = rec.ensure(&ConfigMap::default()).await.unwrap_err();
        assert!(matches!(err, ClusterError::MissingName { .. }));
    }
}
