//! Submission store: durable record of each card-scan request.

mod memory_store;
mod sqlite_store;
mod store;
mod types;

use chrono::{DateTime, SubsecRound, Utc};

pub use memory_store::InMemorySubmissionStore;
pub use sqlite_store::SqliteSubmissionStore;
pub use store::{
    CreateSubmissionRequest, SubmissionError, SubmissionFilter, SubmissionStore,
    SubmissionUpdate,
};
pub use types::{
    CardIdentity, MarketplaceEstimate, Submission, SubmissionStatus, NOT_FOUND_VALUE,
};

/// Current time at the precision both stores persist (microseconds).
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
