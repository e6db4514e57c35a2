//! Stack topologies.
//!
//! A topology is plain data: which roles make up a stack, in creation
//! order, and which of them get a service, an ingress and which probe path.
//! One orchestrator walks any topology, so single-process and two-process
//! stacks share every sequence.

use serde::{Deserialize, Serialize};
use stackgrid_core::{LogicalStackId, Role};
use stackgrid_state::IntentVerb;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackKind {
    Webhook,
    Daipp,
    Host,
}

/// Where the readiness probe points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePath {
    /// The role's `health_path` from configuration, if any.
    Configured,
    /// `/{tenant}/{version}/index.html`.
    VersionIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePlan {
    pub role: Role,
    pub service: bool,
    pub ingress: bool,
    pub probe: ProbePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackTopology {
    pub kind: StackKind,
    /// Creation order. Destroy walks the same order.
    pub roles: &'static [RolePlan],
    /// Whether the image is supplied per call rather than from configuration.
    pub image_per_call: bool,
}

pub const WEBHOOK: StackTopology = StackTopology {
    kind: StackKind::Webhook,
    roles: &[RolePlan {
        role: Role::Webhook,
        service: true,
        ingress: true,
        probe: ProbePath::Configured,
    }],
    image_per_call: true,
};

pub const DAIPP: StackTopology = StackTopology {
    kind: StackKind::Daipp,
    roles: &[RolePlan {
        role: Role::Daipp,
        service: true,
        ingress: true,
        probe: ProbePath::VersionIndex,
    }],
    image_per_call: true,
};

/// The silo comes up first and is never exposed.
pub const HOST: StackTopology = StackTopology {
    kind: StackKind::Host,
    roles: &[
        RolePlan {
            role: Role::HostSilo,
            service: true,
            ingress: false,
            probe: ProbePath::Configured,
        },
        RolePlan {
            role: Role::HostClient,
            service: true,
            ingress: true,
            probe: ProbePath::Configured,
        },
    ],
    image_per_call: false,
};

impl StackTopology {
    pub fn of(kind: StackKind) -> &'static StackTopology {
        match kind {
            StackKind::Webhook => &WEBHOOK,
            StackKind::Daipp => &DAIPP,
            StackKind::Host => &HOST,
        }
    }

    pub fn create_verb(&self) -> IntentVerb {
        match self.kind {
            StackKind::Webhook => IntentVerb::CreateWebhook,
            StackKind::Daipp => IntentVerb::CreateDaipp,
            StackKind::Host => IntentVerb::CreateHost,
        }
    }

    pub fn destroy_verb(&self) -> IntentVerb {
        match self.kind {
            StackKind::Webhook => IntentVerb::DestroyWebhook,
            StackKind::Daipp => IntentVerb::DestroyDaipp,
            StackKind::Host => IntentVerb::DestroyHost,
        }
    }
}

impl ProbePath {
    pub fn resolve(&self, id: &LogicalStackId, configured: Option<&str>) -> Option<String> {
        match self {
            ProbePath::Configured => configured.filter(|p| !p.is_empty()).map(str::to_string),
            ProbePath::VersionIndex => Some(format!(
                "/{}/{}/index.html",
                id.tenant_id.to_lowercase(),
                id.version.to_lowercase()
            )),
        }
    }
}
