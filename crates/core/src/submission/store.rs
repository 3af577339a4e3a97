//! Submission storage trait and types.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{CardIdentity, MarketplaceEstimate, Submission, SubmissionStatus};

/// Message recorded when an error write carries no description.
const UNKNOWN_ERROR_MESSAGE: &str = "Unknown processing error";

/// Error type for submission store operations.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Submission not found.
    #[error("Submission not found: {0}")]
    NotFound(String),

    /// A submission with this id already exists.
    #[error("Submission already exists: {0}")]
    AlreadyExists(String),

    /// The requested status change is not an edge of the state machine.
    #[error("Cannot {operation} submission {submission_id}: {from} -> {to} is not allowed")]
    InvalidTransition {
        submission_id: String,
        from: SubmissionStatus,
        to: SubmissionStatus,
        operation: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new submission.
#[derive(Debug, Clone)]
pub struct CreateSubmissionRequest {
    /// Identifier assigned by the caller (UUID).
    pub id: String,
    /// Validated image data URI.
    pub image_data_uri: String,
    /// Hex SHA-256 of the data URI.
    pub image_digest: String,
}

/// A write against an existing submission.
#[derive(Debug, Clone)]
pub enum SubmissionUpdate {
    /// Identification succeeded.
    Identification(CardIdentity),
    /// Valuation succeeded (the list may be empty).
    Valuation(Vec<MarketplaceEstimate>),
    /// A phase failed.
    Error(String),
}

impl SubmissionUpdate {
    fn operation(&self) -> &'static str {
        match self {
            SubmissionUpdate::Identification(_) => "record identification for",
            SubmissionUpdate::Valuation(_) => "record valuation for",
            SubmissionUpdate::Error(_) => "record error for",
        }
    }

    fn accepts(&self, status: SubmissionStatus) -> bool {
        match self {
            SubmissionUpdate::Identification(_) => status == SubmissionStatus::ProcessingValuation,
            SubmissionUpdate::Valuation(_) => status == SubmissionStatus::Completed,
            SubmissionUpdate::Error(_) => status.is_error(),
        }
    }

    /// Apply this update to `current`, moving it to `new_status`.
    ///
    /// Fails if the edge is not part of the state machine or if the update
    /// kind does not match the target status. Error writes keep any identity
    /// or valuation already recorded.
    pub fn apply(
        self,
        mut current: Submission,
        new_status: SubmissionStatus,
        now: DateTime<Utc>,
    ) -> Result<Submission, SubmissionError> {
        if !current.status.can_transition_to(new_status) || !self.accepts(new_status) {
            return Err(SubmissionError::InvalidTransition {
                submission_id: current.id,
                from: current.status,
                to: new_status,
                operation: self.operation().to_string(),
            });
        }

        match self {
            SubmissionUpdate::Identification(identity) => {
                current.card_identity = Some(identity);
                current.error_message = None;
            }
            SubmissionUpdate::Valuation(estimates) => {
                current.valuation = Some(estimates);
                current.error_message = None;
            }
            SubmissionUpdate::Error(message) => {
                let message = message.trim();
                current.error_message = Some(if message.is_empty() {
                    UNKNOWN_ERROR_MESSAGE.to_string()
                } else {
                    message.to_string()
                });
            }
        }

        current.status = new_status;
        current.updated_at = now;
        Ok(current)
    }
}

/// Filter for listing submissions.
#[derive(Debug, Clone)]
pub struct SubmissionFilter {
    /// Filter by status.
    pub status: Option<SubmissionStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for SubmissionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub(crate) fn matches(&self, submission: &Submission) -> bool {
        self.status.is_none_or(|status| submission.status == status)
    }
}

/// Trait for submission storage backends.
///
/// Every write refreshes `updated_at` and fails with
/// [`SubmissionError::NotFound`] when the id does not exist.
pub trait SubmissionStore: Send + Sync {
    /// Persist a new submission in `PROCESSING_IDENTIFICATION`.
    fn create(&self, request: CreateSubmissionRequest) -> Result<Submission, SubmissionError>;

    /// Get a submission by id.
    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError>;

    /// Apply `update` and move the submission to `new_status` atomically.
    fn update(
        &self,
        id: &str,
        new_status: SubmissionStatus,
        update: SubmissionUpdate,
    ) -> Result<Submission, SubmissionError>;

    /// List submissions matching the filter, newest first.
    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError>;

    /// Count submissions matching the filter (ignores limit/offset).
    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError>;

    /// Submissions still in a processing status, last touched before `updated_before`.
    fn list_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, SubmissionError>;

    /// Delete terminal submissions last touched before `cutoff`.
    /// Returns the number of deleted submissions.
    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, SubmissionError>;

    /// Record a successful identification.
    fn record_identification(
        &self,
        id: &str,
        identity: CardIdentity,
        new_status: SubmissionStatus,
    ) -> Result<Submission, SubmissionError> {
        self.update(id, new_status, SubmissionUpdate::Identification(identity))
    }

    /// Record a successful valuation.
    fn record_valuation(
        &self,
        id: &str,
        valuation: Vec<MarketplaceEstimate>,
        new_status: SubmissionStatus,
    ) -> Result<Submission, SubmissionError> {
        self.update(id, new_status, SubmissionUpdate::Valuation(valuation))
    }

    /// Record a failure. Previously written identity/valuation are kept.
    fn record_error(
        &self,
        id: &str,
        new_status: SubmissionStatus,
        error_message: &str,
    ) -> Result<Submission, SubmissionError> {
        self.update(
            id,
            new_status,
            SubmissionUpdate::Error(error_message.to_string()),
        )
    }
}
