//! Read-only access to submissions for polling clients.
//!
//! Every call reads through to the store; there is no cache.

use std::sync::Arc;
use thiserror::Error;

use crate::submission::{Submission, SubmissionError, SubmissionFilter, SubmissionStore};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Submission not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] SubmissionError),
}

/// One page of submissions plus the total matching the filter.
#[derive(Debug, Clone)]
pub struct SubmissionPage {
    pub submissions: Vec<Submission>,
    pub total: i64,
}

#[derive(Clone)]
pub struct SubmissionQuery {
    store: Arc<dyn SubmissionStore>,
}

impl SubmissionQuery {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    /// Current state of a submission. Unknown ids are an error, never a
    /// default submission.
    pub fn get(&self, id: &str) -> Result<Submission, QueryError> {
        self.store
            .get(id)?
            .ok_or_else(|| QueryError::NotFound(id.to_string()))
    }

    pub fn list(&self, filter: &SubmissionFilter) -> Result<SubmissionPage, QueryError> {
        Ok(SubmissionPage {
            submissions: self.store.list(filter)?,
            total: self.store.count(filter)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::{
        CardIdentity, CreateSubmissionRequest, InMemorySubmissionStore, SubmissionStatus,
    };

    fn setup() -> (Arc<InMemorySubmissionStore>, SubmissionQuery) {
        let store = Arc::new(InMemorySubmissionStore::new());
        let query = SubmissionQuery::new(store.clone());
        (store, query)
    }

    fn create(store: &InMemorySubmissionStore, id: &str) {
        store
            .create(CreateSubmissionRequest {
                id: id.to_string(),
                image_data_uri: "data:image/png;base64,AAAA".to_string(),
                image_digest: "digest".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let (_, query) = setup();
        assert!(matches!(
            query.get("never-created"),
            Err(QueryError::NotFound(id)) if id == "never-created"
        ));
    }

    #[test]
    fn test_get_is_idempotent() {
        let (store, query) = setup();
        create(&store, "a");

        let first = query.get("a").unwrap();
        let second = query.get("a").unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_get_reflects_latest_write() {
        let (store, query) = setup();
        create(&store, "a");
        assert_eq!(
            query.get("a").unwrap().status,
            SubmissionStatus::ProcessingIdentification
        );

        store
            .record_identification(
                "a",
                CardIdentity::new("Pikachu", "025"),
                SubmissionStatus::ProcessingValuation,
            )
            .unwrap();
        assert_eq!(
            query.get("a").unwrap().status,
            SubmissionStatus::ProcessingValuation
        );
    }

    #[test]
    fn test_list_page() {
        let (store, query) = setup();
        for id in ["a", "b", "c"] {
            create(&store, id);
        }

        let page = query
            .list(&SubmissionFilter::new().with_limit(2))
            .unwrap();
        assert_eq!(page.submissions.len(), 2);
        assert_eq!(page.total, 3);
    }
}
