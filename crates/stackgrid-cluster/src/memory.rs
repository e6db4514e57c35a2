//! In-memory cluster backend.
//!
//! Stores objects as JSON keyed by `(kind, namespace, name)` and keeps a
//! log of every call it served. Used by `stackd --dry-run` and as the
//! platform fake in tests. Failures can be injected per verb and kind.
//!
//! Each call yields to the runtime once before touching state, so two
//! sequences joined on one task interleave at every cluster call the way
//! they would against a real API server.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::api::{ClusterResource, ResourceApi, Verb, kind_of};
use crate::error::{ClusterError, ClusterResult};

type ObjectKey = (String, String, String);

/// One call served by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterCall {
    pub verb: Verb,
    pub kind: String,
    pub namespace: String,
    /// `None` for list calls.
    pub name: Option<String>,
}

impl ClusterCall {
    /// `verb Kind/name`, or `verb Kind` for lists.
    pub fn summary(&self) -> String {
        match &self.name {
            Some(name) => format!("{} {}/{}", self.verb, self.kind, name),
            None => format!("{} {}", self.verb, self.kind),
        }
    }
}

#[derive(Default)]
struct State {
    objects: BTreeMap<ObjectKey, Value>,
    calls: Vec<ClusterCall>,
    failures: HashSet<(Verb, String)>,
    resource_version: u64,
}

#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep serving it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every subsequent `verb` on `K` fail until cleared.
    pub fn fail_on<K: ClusterResource>(&self, verb: Verb) {
        self.state().failures.insert((verb, kind_of::<K>()));
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Calls served so far, in order.
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Calls other than lists, as `verb Kind/name` strings.
    pub fn mutations(&self) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.verb != Verb::List)
            .map(ClusterCall::summary)
            .collect()
    }

    /// Current stored copy of an object, bypassing the call log.
    pub fn get<K: ClusterResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        let value = self.state().objects.get(&key).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Number of stored objects of kind `K` in `namespace`.
    pub fn count<K: ClusterResource>(&self, namespace: &str) -> usize {
        let kind = kind_of::<K>();
        self.state()
            .objects
            .keys()
            .filter(|(k, ns, _)| *k == kind && ns == namespace)
            .count()
    }

    /// Store an object directly, bypassing the call log.
    pub fn seed<K: ClusterResource>(&self, namespace: &str, resource: &K) -> ClusterResult<()> {
        let name = require_name(resource)?;
        let value = serde_json::to_value(resource)?;
        self.state()
            .objects
            .insert((kind_of::<K>(), namespace.to_string(), name), value);
        Ok(())
    }

    /// Record the call and apply any injected failure.
    fn enter<K: ClusterResource>(
        state: &mut State,
        verb: Verb,
        namespace: &str,
        name: Option<&str>,
    ) -> ClusterResult<()> {
        let kind = kind_of::<K>();
        state.calls.push(ClusterCall {
            verb,
            kind: kind.clone(),
            namespace: namespace.to_string(),
            name: name.map(str::to_string),
        });
        if state.failures.contains(&(verb, kind.clone())) {
            debug!(%verb, %kind, ?name, "injected failure");
            return Err(ClusterError::Injected { verb, kind });
        }
        Ok(())
    }

    fn stamp(state: &mut State, value: &mut Value, namespace: &str) {
        state.resource_version += 1;
        if let Some(meta) = value.get_mut("metadata").and_then(Value::as_object_mut) {
            meta.insert("namespace".into(), Value::String(namespace.to_string()));
            meta.insert(
                "resourceVersion".into(),
                Value::String(state.resource_version.to_string()),
            );
        }
    }
}

fn require_name<K: ClusterResource>(resource: &K) -> ClusterResult<String> {
    resource
        .meta()
        .name
        .clone()
        .ok_or_else(|| ClusterError::MissingName { kind: kind_of::<K>() })
}

fn not_found<K: ClusterResource>(name: &str) -> ClusterError {
    ClusterError::NotFound {
        kind: kind_of::<K>(),
        name: name.to_string(),
    }
}

#[async_trait]
impl<K: ClusterResource> ResourceApi<K> for InMemoryCluster {
    async fn list(&self, namespace: &str) -> ClusterResult<Vec<K>> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::enter::<K>(&mut state, Verb::List, namespace, None)?;
        let kind = kind_of::<K>();
        state
            .objects
            .iter()
            .filter(|((k, ns, _), _)| *k == kind && ns == namespace)
            .map(|(_, v)| serde_json::from_value(v.clone()).map_err(ClusterError::from))
            .collect()
    }

    async fn create(&self, namespace: &str, resource: &K) -> ClusterResult<K> {
        tokio::task::yield_now().await;
        let name = require_name(resource)?;
        let mut state = self.state();
        Self::enter::<K>(&mut state, Verb::Create, namespace, Some(&name))?;
        let key = (kind_of::<K>(), namespace.to_string(), name.clone());
        if state.objects.contains_key(&key) {
            return Err(ClusterError::AlreadyExists { kind: key.0, name });
        }
        let mut value = serde_json::to_value(resource)?;
        Self::stamp(&mut state, &mut value, namespace);
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn replace(&self, namespace: &str, name: &str, resource: &K) -> ClusterResult<K> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::enter::<K>(&mut state, Verb::Replace, namespace, Some(name))?;
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        if !state.objects.contains_key(&key) {
            return Err(not_found::<K>(name));
        }
        let mut value = serde_json::to_value(resource)?;
        Self::stamp(&mut state, &mut value, namespace);
        state.objects.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::enter::<K>(&mut state, Verb::Delete, namespace, Some(name))?;
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        state
            .objects
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| not_found::<K>(name))
    }

    async fn read(&self, namespace: &str, name: &str) -> ClusterResult<K> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        Self::enter::<K>(&mut state, Verb::Read, namespace, Some(name))?;
        let key = (kind_of::<K>(), namespace.to_string(), name.to_string());
        let value = state.objects.get(&key).cloned().ok_or_else(|| not_found::<K>(name))?;
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    use super::*;

    const NS: &str = "apps";

    fn cm(name: &str, value: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), value.to_string())])),
            ..ConfigMap::default()
        }
    }

    #[tokio::test]
    async fn create_then_list_and_read() {
        let cluster = InMemoryCluster::new();
        ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "1")).await.unwrap();

        let listed = ResourceApi::<ConfigMap>::list(&cluster, NS).await.unwrap();
        assert_eq!(listed.len(), 1);
        let read = ResourceApi::<ConfigMap>::read(&cluster, NS, "a").await.unwrap();
        assert_eq!(read.metadata.namespace.as_deref(), Some(NS));
        assert_eq!(read.data.unwrap()["k"], "1");

        let other_ns = ResourceApi::<ConfigMap>::list(&cluster, "elsewhere").await.unwrap();
        assert!(other_ns.is_empty());
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let cluster = InMemoryCluster::new();
        ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "1")).await.unwrap();
        let err = ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "2"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn replace_and_delete_missing_are_not_found() {
        let cluster = InMemoryCluster::new();
        let err = ResourceApi::<ConfigMap>::replace(&cluster, NS, "a", &cm("a", "1"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = ResourceApi::<ConfigMap>::delete(&cluster, NS, "a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn replace_overwrites_and_bumps_version() {
        let cluster = InMemoryCluster::new();
        let created = ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "1")).await.unwrap();
        let replaced = ResourceApi::<ConfigMap>::replace(&cluster, NS, "a", &cm("a", "2"))
            .await
            .unwrap();
        assert_ne!(created.metadata.resource_version, replaced.metadata.resource_version);
        let stored: ConfigMap = cluster.get(NS, "a").unwrap();
        assert_eq!(stored.data.unwrap()["k"], "2");
    }

    #[tokio::test]
    async fn injected_failure_is_recorded() {
        let cluster = InMemoryCluster::new();
        cluster.fail_on::<ConfigMap>(Verb::Create);
        let err = ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Injected { verb: Verb::Create, .. }));
        assert_eq!(cluster.mutations(), vec!["create ConfigMap/a"]);
        assert_eq!(cluster.count::<ConfigMap>(NS), 0);

        cluster.clear_failures();
        ResourceApi::<ConfigMap>::create(&cluster, NS, &cm("a", "1")).await.unwrap();
        assert_eq!(cluster.count::<ConfigMap>(NS), 1);
    }

    #[tokio::test]
    async fn unnamed_resource_is_rejected() {
        let cluster = InMemoryCluster::new();
        let err = ResourceApi::<ConfigMap>::create(&cluster, NS, &ConfigMap::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::MissingName { .. }));
        assert!(cluster.calls().is_empty());
    }
}
