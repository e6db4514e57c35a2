//! The cluster collaborator interface.
//!
//! Every resource kind the orchestrator touches supports the same five
//! namespaced calls. `ResourceApi<K>` expresses them once; `ClusterApi`
//! bundles the kinds StackGrid needs so a single backend value can be
//! injected everywhere.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::ClusterResult;

/// A namespaced platform object that can travel through any backend.
pub trait ClusterResource:
    kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Serialize
    + DeserializeOwned
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
}

impl<K> ClusterResource for K where
    K: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Serialize
        + DeserializeOwned
        + fmt::Debug
        + Send
        + Sync
        + 'static
{
}

/// Kind name used in logs and errors, e.g. `ConfigMap`.
pub fn kind_of<K: ClusterResource>() -> String {
    K::kind(&()).into_owned()
}

/// `metadata.name` of a resource, if set.
pub fn name_of<K: ClusterResource>(resource: &K) -> Option<&str> {
    resource.meta().name.as_deref()
}

/// The call verbs a backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    List,
    Create,
    Replace,
    Delete,
    Read,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verb::List => "list",
            Verb::Create => "create",
            Verb::Replace => "replace",
            Verb::Delete => "delete",
            Verb::Read => "read",
        };
        f.write_str(s)
    }
}

/// Namespaced CRUD over one resource kind.
#[async_trait]
pub trait ResourceApi<K: ClusterResource>: Send + Sync {
    /// Every object of the kind in `namespace`. No server-side filtering.
    async fn list(&self, namespace: &str) -> ClusterResult<Vec<K>>;

    async fn create(&self, namespace: &str, resource: &K) -> ClusterResult<K>;

    /// Full overwrite of the object called `name`.
    async fn replace(&self, namespace: &str, name: &str, resource: &K) -> ClusterResult<K>;

    async fn delete(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    async fn read(&self, namespace: &str, name: &str) -> ClusterResult<K>;
}

/// Every kind a tenant stack is built from.
pub trait ClusterApi:
    ResourceApi<ConfigMap>
    + ResourceApi<Deployment>
    + ResourceApi<Service>
    + ResourceApi<Ingress>
    + ResourceApi<HorizontalPodAutoscaler>
{
}

impl<T> ClusterApi for T where
    T: ResourceApi<ConfigMap>
        + ResourceApi<Deployment>
        + ResourceApi<Service>
        + ResourceApi<Ingress>
        + ResourceApi<HorizontalPodAutoscaler>
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(kind_of::<ConfigMap>(), "ConfigMap");
        assert_eq!(kind_of::<Deployment>(), "Deployment");
        assert_eq!(kind_of::<Ingress>(), "Ingress");
        assert_eq!(kind_of::<HorizontalPodAutoscaler>(), "HorizontalPodAutoscaler");
    }

    #[test]
    fn verb_display() {
        assert_eq!(Verb::Replace.to_string(), "replace");
    }
}
