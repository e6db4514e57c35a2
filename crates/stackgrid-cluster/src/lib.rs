//! stackgrid-cluster: the platform side of StackGrid.
//!
//! Defines the namespaced CRUD interface every resource kind satisfies,
//! a `kube`-backed implementation, an in-memory implementation with a call
//! log, pure builders for each resource definition, and the reconciler
//! that turns "make it so" into list / create / replace / delete calls.

pub mod api;
pub mod client;
pub mod error;
pub mod memory;
pub mod reconciler;
pub mod resources;

pub use api::{ClusterApi, ClusterResource, ResourceApi, Verb};
pub use client::KubeCluster;
pub use error::{ClusterError, ClusterResult};
pub use memory::{ClusterCall, InMemoryCluster};
pub use reconciler::{DeleteOutcome, EnsureOutcome, Reconciler};

pub use k8s_openapi;
