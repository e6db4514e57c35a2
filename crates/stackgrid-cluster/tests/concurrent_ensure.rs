//! Concurrent ensures for one name are not serialized: both can observe
//! "absent" and the second create loses with a conflict.

use std::sync::Arc;

use stackgrid_cluster::k8s_openapi::api::core::v1::ConfigMap;
use stackgrid_cluster::resources::config_map;
use stackgrid_cluster::{EnsureOutcome, InMemoryCluster, Reconciler};

#[tokio::test]
async fn racing_creates_yield_one_conflict() {
    let cluster = Arc::new(InMemoryCluster::new());
    let a = Reconciler::new(cluster.clone(), "apps");
    let b = a.clone();

    let first = config_map("appsettings-acme-webhook-1", Default::default(), "appsettings.json", "a");
    let second = config_map("appsettings-acme-webhook-1", Default::default(), "appsettings.json", "b");

    let (ra, rb) = tokio::join!(a.ensure(&first), b.ensure(&second));

    let outcomes = [&ra, &rb];
    let created = outcomes
        .iter()
        .filter(|r| matches!(r, Ok(EnsureOutcome::Created)))
        .count();
    let conflicts = outcomes
        .iter()
        .filter(|r| r.as_ref().is_err_and(|e| e.is_conflict()))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(cluster.count::<ConfigMap>("apps"), 1);
}

#[tokio::test]
async fn sequential_retry_after_conflict_converges() {
    let cluster = Arc::new(InMemoryCluster::new());
    let rec = Reconciler::new(cluster.clone(), "apps");
    let desired = config_map("sidecar-acme-webhook-1", Default::default(), "filebeat.yml", "x");

    let (ra, rb) = tokio::join!(rec.ensure(&desired), rec.ensure(&desired));
    assert!(ra.is_err() || rb.is_err());

    assert_eq!(rec.ensure(&desired).await.unwrap(), EnsureOutcome::Updated);
}
