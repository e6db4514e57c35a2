//! stackgrid.toml configuration parser.
//!
//! Everything the orchestrator treats as static: target namespace, external
//! host names, rollout bounds, resource requests, and per-role ports,
//! commands and template paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Namespace shared by every tenant stack.
    pub namespace: String,
    /// Directory relative template paths are resolved against.
    pub template_dir: Option<PathBuf>,
    pub hosts: HostsConfig,
    #[serde(default)]
    pub rollout: RolloutConfig,
    #[serde(default)]
    pub app: AppMountConfig,
    #[serde(default)]
    pub sidecar: SidecarConfig,
    pub roles: RolesConfig,
    pub scheduling: Option<SchedulingConfig>,
    pub autoscaling: Option<AutoscalingConfig>,
}

/// External host names, one per ingress-bearing stack family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostsConfig {
    pub webhook: String,
    pub developer: String,
    pub daipp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutConfig {
    pub replicas: i32,
    /// Absolute count or percentage, e.g. `"1"` or `"50%"`.
    pub max_surge: String,
    pub max_unavailable: String,
    pub request_cpu: String,
    pub request_memory: String,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            replicas: 1,
            max_surge: "50%".to_string(),
            max_unavailable: "0".to_string(),
            request_cpu: "250m".to_string(),
            request_memory: "512Mi".to_string(),
        }
    }
}

/// Where the rendered app settings land inside the main container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppMountConfig {
    pub settings_file_name: String,
    pub settings_mount_path: String,
    pub log_mount_path: String,
}

impl Default for AppMountConfig {
    fn default() -> Self {
        Self {
            settings_file_name: "appsettings.json".to_string(),
            settings_mount_path: "/app/appsettings.json".to_string(),
            log_mount_path: "/app/Logs".to_string(),
        }
    }
}

/// Log-shipping side-car container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub container_name: String,
    pub image: String,
    pub config_file_name: String,
    pub config_mount_path: String,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            container_name: "filebeat-sidecar".to_string(),
            image: "docker.elastic.co/beats/filebeat:8.12.2".to_string(),
            config_file_name: "filebeat.yml".to_string(),
            config_mount_path: "/etc/filebeat.yml".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolesConfig {
    pub webhook: RoleConfig,
    pub host_silo: RoleConfig,
    pub host_client: RoleConfig,
    pub daipp: RoleConfig,
}

impl RolesConfig {
    pub fn get(&self, role: Role) -> &RoleConfig {
        match role {
            Role::Webhook => &self.webhook,
            Role::HostSilo => &self.host_silo,
            Role::HostClient => &self.host_client,
            Role::Daipp => &self.daipp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleConfig {
    pub port: i32,
    #[serde(default)]
    pub command: Vec<String>,
    /// Fixed image for roles whose image is not supplied per call.
    pub image: Option<String>,
    pub settings_template: PathBuf,
    pub sidecar_template: PathBuf,
    /// Readiness probe path. Empty or absent disables the probe.
    pub health_path: Option<String>,
}

/// Pin tenant pods to a dedicated node pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingConfig {
    pub node_affinity_value: String,
    pub toleration_key: String,
    pub toleration_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscalingConfig {
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub target_cpu_utilization: i32,
}

impl StackConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: StackConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn role(&self, role: Role) -> &RoleConfig {
        self.roles.get(role)
    }

    /// External host name the role's ingress answers on.
    pub fn host_name(&self, role: Role) -> &str {
        match role {
            Role::Webhook => &self.hosts.webhook,
            Role::HostSilo | Role::HostClient => &self.hosts.developer,
            Role::Daipp => &self.hosts.daipp,
        }
    }

    /// Scaffold a starter stackgrid.toml pointing at `templates/`.
    pub fn scaffold(namespace: &str) -> Self {
        let role = |dir: &str, port: i32, command: &[&str], image: Option<&str>| RoleConfig {
            port,
            command: command.iter().map(|s| s.to_string()).collect(),
            image: image.map(str::to_string),
            settings_template: PathBuf::from(format!("{dir}/appsettings.json")),
            sidecar_template: PathBuf::from(format!("{dir}/filebeat.yml")),
            health_path: None,
        };

        StackConfig {
            namespace: namespace.to_string(),
            template_dir: Some(PathBuf::from("templates")),
            hosts: HostsConfig {
                webhook: "https://webhook.example.com".to_string(),
                developer: "https://host.example.com".to_string(),
                daipp: "https://apps.example.com".to_string(),
            },
            rollout: RolloutConfig::default(),
            app: AppMountConfig::default(),
            sidecar: SidecarConfig::default(),
            roles: RolesConfig {
                webhook: role("webhook", 8308, &["dotnet", "Webhook.dll"], None),
                host_silo: role(
                    "host-silo",
                    11111,
                    &["dotnet", "Silo.dll"],
                    Some("registry.example.com/host-silo:latest"),
                ),
                host_client: role(
                    "host-client",
                    8308,
                    &["dotnet", "HttpApi.Host.dll"],
                    Some("registry.example.com/host-client:latest"),
                ),
                daipp: role("daipp", 8080, &[], None),
            },
            scheduling: None,
            autoscaling: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaffold_roundtrips_through_toml() {
        let config = StackConfig::scaffold("tenant-apps");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("tenant-apps"));
        let back = StackConfig::parse(&toml_str).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn parse_minimal_uses_defaults() {
        let toml_str = r#"
namespace = "apps"

[hosts]
webhook = "https://w.example.com"
developer = "https://d.example.com"
daipp = "https://a.example.com"

[roles.webhook]
port = 8308
settings_template = "w/appsettings.json"
sidecar_template = "w/filebeat.yml"

[roles.host_silo]
port = 11111
image = "silo:1"
settings_template = "s/appsettings.json"
sidecar_template = "s/filebeat.yml"

[roles.host_client]
port = 8308
image = "client:1"
settings_template = "c/appsettings.json"
sidecar_template = "c/filebeat.yml"

[roles.daipp]
port = 8080
settings_template = "d/appsettings.json"
sidecar_template = "d/filebeat.yml"
health_path = "/healthz"
"#;
        let config = StackConfig::parse(toml_str).unwrap();
        assert_eq!(config.namespace, "apps");
        assert_eq!(config.rollout.replicas, 1);
        assert_eq!(config.sidecar.config_file_name, "filebeat.yml");
        assert_eq!(config.role(Role::HostSilo).image.as_deref(), Some("silo:1"));
        assert!(config.role(Role::Webhook).command.is_empty());
        assert!(config.scheduling.is_none());
    }

    #[test]
    fn host_name_per_role() {
        let config = StackConfig::scaffold("apps");
        assert_eq!(config.host_name(Role::Webhook), "https://webhook.example.com");
        assert_eq!(config.host_name(Role::HostClient), "https://host.example.com");
        assert_eq!(config.host_name(Role::Daipp), "https://apps.example.com");
    }
}
