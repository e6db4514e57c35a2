//! Stack identity types shared across StackGrid crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A process kind within a tenant stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Single-process webhook stack.
    Webhook,
    /// Backend silo of a host stack. Never exposed through an ingress.
    HostSilo,
    /// Client process of a host stack, fronted by an ingress.
    HostClient,
    /// Single-process app stack routed by tenant and version.
    Daipp,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Webhook, Role::HostSilo, Role::HostClient, Role::Daipp];

    /// Short slug embedded in resource names. Never contains `-`.
    pub fn slug(&self) -> &'static str {
        match self {
            Role::Webhook => "webhook",
            Role::HostSilo => "silo",
            Role::HostClient => "client",
            Role::Daipp => "daipp",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webhook" => Ok(Role::Webhook),
            "silo" | "host_silo" | "host-silo" => Ok(Role::HostSilo),
            "client" | "host_client" | "host-client" => Ok(Role::HostClient),
            "daipp" => Ok(Role::Daipp),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Identifies one deployable unit: a tenant's process of a given role at a
/// given version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalStackId {
    pub tenant_id: String,
    pub version: String,
    pub role: Role,
}

impl LogicalStackId {
    pub fn new(tenant_id: &str, version: &str, role: Role) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            version: version.to_string(),
            role,
        }
    }

    /// Same tenant and version, different role.
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }
}

impl fmt::Display for LogicalStackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.tenant_id, self.role, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_slugs_and_snake_case() {
        assert_eq!("silo".parse::<Role>().unwrap(), Role::HostSilo);
        assert_eq!("host_client".parse::<Role>().unwrap(), Role::HostClient);
        assert_eq!("Webhook".parse::<Role>().unwrap(), Role::Webhook);
        assert!("frontend".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::HostSilo).unwrap();
        assert_eq!(json, "\"host_silo\"");
    }

    #[test]
    fn slugs_have_no_hyphen() {
        for role in Role::ALL {
            assert!(!role.slug().contains('-'));
        }
    }

    #[test]
    fn with_role_keeps_tenant_and_version() {
        let silo = LogicalStackId::new("acme", "2", Role::HostSilo);
        let client = silo.with_role(Role::HostClient);
        assert_eq!(client.tenant_id, "acme");
        assert_eq!(client.version, "2");
        assert_eq!(client.role, Role::HostClient);
        assert_eq!(client.to_string(), "acme/client@2");
    }
}
