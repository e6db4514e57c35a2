//! stackgrid-core: shared types for the StackGrid orchestrator.
//!
//! - **`types`**: stack identity (`LogicalStackId`, `Role`)
//! - **`naming`**: deterministic resource names derived from a stack id
//! - **`template`**: placeholder substitution for config map content
//! - **`config`**: `stackgrid.toml` parsing

pub mod config;
pub mod naming;
pub mod template;
pub mod types;

pub use config::StackConfig;
pub use naming::ResourceDescriptor;
pub use template::{Placeholder, PlaceholderMap, TemplateError, TemplateRenderer, TemplateResult};
pub use types::*;
