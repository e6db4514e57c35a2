//! Deterministic resource naming.
//!
//! Every cluster resource belonging to a stack is named from its
//! `LogicalStackId` alone, so existence can always be re-derived by listing
//! the namespace. Names have the shape `{prefix}-{tenant}-{role}-{version}`.
//! Role slugs and supported versions never contain `-`, so a name parses
//! uniquely from the right and distinct ids never share a name.
//!
//! This layer does not validate characters; callers keep tenant ids within
//! `[a-z0-9-]` and versions within `[a-z0-9.]`.

use serde::{Deserialize, Serialize};

use crate::types::{LogicalStackId, Role};

/// Kubernetes caps port names at 15 characters.
const PORT_NAME_MAX: usize = 15;

/// Every name and label derived from one `LogicalStackId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub deployment_name: String,
    pub deployment_label_name: String,
    pub container_name: String,
    pub service_name: String,
    pub service_label_name: String,
    /// Scoped to its service, not to the namespace.
    pub service_port_name: String,
    pub ingress_name: String,
    pub app_setting_config_map_name: String,
    pub side_car_config_map_name: String,
    pub autoscaler_name: String,
}

impl ResourceDescriptor {
    pub fn for_stack(id: &LogicalStackId) -> Self {
        let stem = stem(id);
        let version = normalize(&id.version);
        let mut port_name = format!("http-{version}");
        port_name.truncate(PORT_NAME_MAX);

        Self {
            deployment_name: format!("deployment-{stem}"),
            deployment_label_name: stem.clone(),
            container_name: format!("container-{stem}"),
            service_name: format!("service-{stem}"),
            service_label_name: format!("service-{stem}"),
            service_port_name: port_name,
            ingress_name: format!("ingress-{stem}"),
            app_setting_config_map_name: format!("appsettings-{stem}"),
            side_car_config_map_name: format!("sidecar-{stem}"),
            autoscaler_name: format!("hpa-{stem}"),
        }
    }

    /// All namespace-scoped resource names, for bulk checks.
    pub fn resource_names(&self) -> [&str; 6] {
        [
            &self.deployment_name,
            &self.service_name,
            &self.ingress_name,
            &self.app_setting_config_map_name,
            &self.side_car_config_map_name,
            &self.autoscaler_name,
        ]
    }
}

/// Lower-case a tenant id or version and map `_` to `-`.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace('_', "-")
}

fn stem(id: &LogicalStackId) -> String {
    format!(
        "{}-{}-{}",
        normalize(&id.tenant_id),
        id.role.slug(),
        normalize(&id.version)
    )
}

/// Path routed to a stack by its ingress rule.
///
/// Daipp stacks are routed per version; every other role owns the bare
/// tenant path on its host. Paths are only lower-cased: unlike resource
/// names they keep `_`.
pub fn ingress_rule_path(id: &LogicalStackId) -> String {
    let tenant = id.tenant_id.to_lowercase();
    match id.role {
        Role::Daipp => format!("/{tenant}/{}", id.version.to_lowercase()),
        _ => format!("/{tenant}"),
    }
}

/// Compose the externally reachable URL for an ingress rule.
pub fn external_url(host_name: &str, rule_path: &str) -> String {
    format!("{}{}", host_name.trim_end_matches('/'), rule_path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn webhook_names_follow_convention() {
        let id = LogicalStackId::new("acme", "1", Role::Webhook);
        let d = ResourceDescriptor::for_stack(&id);
        assert_eq!(d.deployment_name, "deployment-acme-webhook-1");
        assert_eq!(d.deployment_label_name, "acme-webhook-1");
        assert_eq!(d.container_name, "container-acme-webhook-1");
        assert_eq!(d.service_name, "service-acme-webhook-1");
        assert_eq!(d.ingress_name, "ingress-acme-webhook-1");
        assert_eq!(d.app_setting_config_map_name, "appsettings-acme-webhook-1");
        assert_eq!(d.side_car_config_map_name, "sidecar-acme-webhook-1");
        assert_eq!(d.service_port_name, "http-1");
    }

    #[test]
    fn tenant_is_lowercased() {
        let upper = ResourceDescriptor::for_stack(&LogicalStackId::new("AcMe_Co", "V2", Role::HostSilo));
        assert_eq!(upper.deployment_name, "deployment-acme-co-silo-v2");
    }

    #[test]
    fn names_are_stable() {
        let id = LogicalStackId::new("acme", "3", Role::HostClient);
        assert_eq!(ResourceDescriptor::for_stack(&id), ResourceDescriptor::for_stack(&id));
    }

    #[test]
    fn port_name_is_capped() {
        let id = LogicalStackId::new("acme", "20240101.1234", Role::Webhook);
        let d = ResourceDescriptor::for_stack(&id);
        assert!(d.service_port_name.len() <= PORT_NAME_MAX);
    }

    #[test]
    fn distinct_ids_never_share_a_name() {
        let tenants = [
            "a", "b", "ab", "a-b", "a-b-c", "silo", "a-silo", "a-silo-1", "webhook-1", "a-1", "1",
        ];
        let versions = ["1", "2", "10", "1.0", "v1"];

        let mut seen: HashSet<String> = HashSet::new();
        let mut count = 0;
        for tenant in tenants {
            for version in versions {
                for role in Role::ALL {
                    let d = ResourceDescriptor::for_stack(&LogicalStackId::new(tenant, version, role));
                    for name in d.resource_names() {
                        assert!(seen.insert(name.to_string()), "collision on {name}");
                        count += 1;
                    }
                    // Labels select pods, so they must be unique too.
                    assert!(seen.insert(format!("label:{}", d.deployment_label_name)));
                }
            }
        }
        assert_eq!(count, tenants.len() * versions.len() * Role::ALL.len() * 6);
    }

    #[test]
    fn ingress_paths() {
        let webhook = LogicalStackId::new("Acme", "1", Role::Webhook);
        assert_eq!(ingress_rule_path(&webhook), "/acme");
        let daipp = LogicalStackId::new("acme", "2", Role::Daipp);
        assert_eq!(ingress_rule_path(&daipp), "/acme/2");

        let underscored = LogicalStackId::new("Acme_Co", "1", Role::Webhook);
        assert_eq!(ingress_rule_path(&underscored), "/acme_co");
        assert_eq!(
            ResourceDescriptor::for_stack(&underscored).ingress_name,
            "ingress-acme-co-webhook-1"
        );
    }

    #[test]
    fn external_url_trims_trailing_slash() {
        assert_eq!(external_url("https://hooks.example.com/", "/acme"), "https://hooks.example.com/acme");
        assert_eq!(external_url("https://hooks.example.com", "/acme"), "https://hooks.example.com/acme");
    }
}
