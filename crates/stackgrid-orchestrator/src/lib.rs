//! stackgrid-orchestrator: lifecycle sequences for tenant stacks.
//!
//! Composes reconciler calls into ordered create / destroy / update /
//! restart sequences, parameterised by a [`StackTopology`] so webhook,
//! daipp and two-process host stacks share one implementation.

pub mod error;
pub mod orchestrator;
pub mod restart;
pub mod topology;

pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::{HostInputs, MutationOutcome, StackOrchestrator};
pub use restart::{RESTARTED_AT_ANNOTATION, restarted_at, stamp_restart};
pub use topology::{RolePlan, StackKind, StackTopology};
