//! Submission lifecycle.
//!
//! The [`LifecycleManager`] drives one submission through the chain:
//! - **Create**: persist in `PROCESSING_IDENTIFICATION` before the id is returned
//! - **Identify**: one call to the identifier, bounded by a timeout
//! - **Value**: one call to the valuer with the recorded identity
//!
//! Every outcome, including collaborator failures, ends up persisted so a
//! polling client always reaches a terminal status. Nothing is retried.

mod config;
mod manager;
mod retention;
mod types;

pub use config::LifecycleConfig;
pub use manager::{LifecycleManager, INTERRUPTED_MESSAGE};
pub use retention::{RetentionPolicy, RetentionSweeper};
pub use types::{LifecycleError, SubmissionUpdateCallback};
