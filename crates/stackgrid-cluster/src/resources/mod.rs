//! Desired-state definitions for every resource kind in a stack.
//!
//! Builders are pure: the same inputs always produce the same object, so a
//! replace with a freshly built definition is a full overwrite.

pub mod autoscaler;
pub mod configmap;
pub mod deployment;
pub mod ingress;
pub mod service;

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use stackgrid_core::{LogicalStackId, ResourceDescriptor, naming};

pub use autoscaler::autoscaler;
pub use configmap::config_map;
pub use deployment::deployment;
pub use ingress::ingress;
pub use service::service;

pub const APP_LABEL: &str = "app";
pub const TENANT_LABEL: &str = "stackgrid.io/tenant";
pub const VERSION_LABEL: &str = "stackgrid.io/version";
pub const ROLE_LABEL: &str = "stackgrid.io/role";

/// Pod labels; `app` alone is the selector.
pub fn pod_labels(id: &LogicalStackId, names: &ResourceDescriptor) -> BTreeMap<String, String> {
    BTreeMap::from([
        (APP_LABEL.to_string(), names.deployment_label_name.clone()),
        (TENANT_LABEL.to_string(), naming::normalize(&id.tenant_id)),
        (VERSION_LABEL.to_string(), naming::normalize(&id.version)),
        (ROLE_LABEL.to_string(), id.role.slug().to_string()),
    ])
}

pub fn selector_labels(names: &ResourceDescriptor) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_string(), names.deployment_label_name.clone())])
}

fn named(name: &str, labels: BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        labels: Some(labels),
        ..ObjectMeta::default()
    }
}
