//! In-memory submission store.
//!
//! Backs tests and ephemeral deployments. Contents are lost on restart;
//! expiry is handled by the same retention sweeper as the SQLite store.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{
    now, CreateSubmissionRequest, Submission, SubmissionError, SubmissionFilter,
    SubmissionStatus, SubmissionStore, SubmissionUpdate,
};

/// Process-local submission store keyed by id.
#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    submissions: RwLock<HashMap<String, Submission>>,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> SubmissionError {
        SubmissionError::Database("submission map lock poisoned".to_string())
    }

    fn sorted(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError> {
        let map = self.submissions.read().map_err(|_| Self::poisoned())?;
        let mut matching: Vec<Submission> = map
            .values()
            .filter(|submission| filter.matches(submission))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }
}

impl SubmissionStore for InMemorySubmissionStore {
    fn create(&self, request: CreateSubmissionRequest) -> Result<Submission, SubmissionError> {
        let mut map = self.submissions.write().map_err(|_| Self::poisoned())?;

        if map.contains_key(&request.id) {
            return Err(SubmissionError::AlreadyExists(request.id));
        }

        let submission = Submission::new(
            request.id,
            request.image_data_uri,
            request.image_digest,
            now(),
        );
        map.insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    fn get(&self, id: &str) -> Result<Option<Submission>, SubmissionError> {
        let map = self.submissions.read().map_err(|_| Self::poisoned())?;
        Ok(map.get(id).cloned())
    }

    fn update(
        &self,
        id: &str,
        new_status: SubmissionStatus,
        update: SubmissionUpdate,
    ) -> Result<Submission, SubmissionError> {
        let mut map = self.submissions.write().map_err(|_| Self::poisoned())?;

        let current = map
            .get(id)
            .cloned()
            .ok_or_else(|| SubmissionError::NotFound(id.to_string()))?;

        let updated = update.apply(current, new_status, now())?;
        map.insert(id.to_string(), updated.clone());
        Ok(updated)
    }

    fn list(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>, SubmissionError> {
        let offset = filter.offset.max(0) as usize;
        let limit = filter.limit.max(0) as usize;
        Ok(self
            .sorted(filter)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    fn count(&self, filter: &SubmissionFilter) -> Result<i64, SubmissionError> {
        let map = self.submissions.read().map_err(|_| Self::poisoned())?;
        Ok(map.values().filter(|s| filter.matches(s)).count() as i64)
    }

    fn list_unfinished(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<Submission>, SubmissionError> {
        let map = self.submissions.read().map_err(|_| Self::poisoned())?;
        let mut unfinished: Vec<Submission> = map
            .values()
            .filter(|s| !s.status.is_terminal() && s.updated_at < updated_before)
            .cloned()
            .collect();
        unfinished.sort_by_key(|s| s.created_at);
        Ok(unfinished)
    }

    fn purge_finished_before(&self, cutoff: DateTime<Utc>) -> Result<usize, SubmissionError> {
        let mut map = self.submissions.write().map_err(|_| Self::poisoned())?;
        let before = map.len();
        map.retain(|_, s| !(s.status.is_terminal() && s.updated_at < cutoff));
        Ok(before - map.len())
    }
}
