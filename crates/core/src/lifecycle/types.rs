//! Types for the lifecycle manager.

use std::sync::Arc;
use thiserror::Error;

use crate::image::ImageError;
use crate::submission::{SubmissionError, SubmissionStatus};

/// Called after every persisted status change with the submission id and
/// its new status.
pub type SubmissionUpdateCallback = Arc<dyn Fn(&str, SubmissionStatus) + Send + Sync>;

/// Errors returned to the caller of the lifecycle manager.
///
/// Collaborator failures are not here: they become persisted error states.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The image was rejected before any submission was created.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// The store failed to create or update the submission.
    #[error("submission store error: {0}")]
    Store(#[from] SubmissionError),

    /// The submission already reached a terminal status.
    #[error("submission {submission_id} is already {status}")]
    AlreadyTerminal {
        submission_id: String,
        status: SubmissionStatus,
    },
}
