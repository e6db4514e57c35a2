//! stackgrid-state: the intent log for StackGrid.
//!
//! Backed by [redb](https://docs.rs/redb). Every multi-call lifecycle
//! sequence the orchestrator runs is recorded as `Pending` before its first
//! cluster call and closed as `Completed` or `Failed` afterwards. Entries
//! still `Pending` after a crash tell an operator which sequences to
//! re-invoke; re-invocation converges because every step is idempotent.
//!
//! The `IntentStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::IntentStore;
pub use types::*;
