//! Error types for orchestrator sequences.

use stackgrid_cluster::ClusterError;
use stackgrid_core::{Role, TemplateError};
use stackgrid_state::StateError;
use thiserror::Error;

/// Result type alias for orchestrator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("intent log: {0}")]
    State(#[from] StateError),

    #[error("no image configured for role {0}")]
    MissingImage(Role),

    #[error("autoscaling is not configured")]
    AutoscalingDisabled,

    #[error("topology has no externally routed role")]
    NoExternalRoute,
}

impl OrchestratorError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, OrchestratorError::Cluster(e) if e.is_conflict())
    }
}
