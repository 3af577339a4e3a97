//! Lifecycle manager implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::capability::{CapabilityError, CardCapabilities, IdentificationOutcome};
use crate::image::{ImageError, ImageReference, ImageValidator};
use crate::metrics;
use crate::submission::{
    CreateSubmissionRequest, Submission, SubmissionError, SubmissionStatus, SubmissionStore,
    SubmissionUpdate,
};

use super::config::LifecycleConfig;
use super::types::{LifecycleError, SubmissionUpdateCallback};

/// Recorded when a submission is closed by startup reconciliation.
pub const INTERRUPTED_MESSAGE: &str = "Processing was interrupted before completion";

const INCOMPLETE_IDENTIFICATION_MESSAGE: &str =
    "Could not identify key card details (name or number).";
const EMPTY_VALUATION_MESSAGE: &str = "Valuation returned no data.";

/// Drives submissions from creation to a terminal status.
///
/// Cheap to clone; clones share the store and capabilities.
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn SubmissionStore>,
    capabilities: CardCapabilities,
    validator: ImageValidator,
    identification_timeout: Duration,
    valuation_timeout: Duration,
    on_update: Option<SubmissionUpdateCallback>,
}

impl LifecycleManager {
    pub fn new(
        store: Arc<dyn SubmissionStore>,
        capabilities: CardCapabilities,
        validator: ImageValidator,
        config: &LifecycleConfig,
    ) -> Self {
        Self {
            store,
            capabilities,
            validator,
            identification_timeout: config.identification_timeout(),
            valuation_timeout: config.valuation_timeout(),
            on_update: None,
        }
    }

    /// Register a callback invoked after every persisted transition.
    pub fn with_update_callback(mut self, callback: SubmissionUpdateCallback) -> Self {
        self.on_update = Some(callback);
        self
    }

    /// Override the collaborator timeouts.
    pub fn with_timeouts(mut self, identification: Duration, valuation: Duration) -> Self {
        self.identification_timeout = identification;
        self.valuation_timeout = valuation;
        self
    }

    pub fn store(&self) -> &Arc<dyn SubmissionStore> {
        &self.store
    }

    /// Validate a raw image data URI.
    pub fn validate_image(&self, raw: &str) -> Result<ImageReference, LifecycleError> {
        self.validator.validate(raw).map_err(|e| {
            metrics::IMAGES_REJECTED
                .with_label_values(&[rejection_reason(&e)])
                .inc();
            debug!(error = %e, "Rejected image");
            LifecycleError::Image(e)
        })
    }

    /// Persist a new submission for an already validated image.
    pub fn create(&self, image: &ImageReference) -> Result<Submission, LifecycleError> {
        let submission = self.store.create(CreateSubmissionRequest {
            id: uuid::Uuid::new_v4().to_string(),
            image_data_uri: image.data_uri().to_string(),
            image_digest: image.digest().to_string(),
        })?;

        metrics::SUBMISSIONS_CREATED.inc();
        info!(
            submission_id = %submission.id,
            image_digest = %submission.image_digest,
            mime_type = image.mime_type(),
            "Submission created"
        );
        self.notify(&submission);

        Ok(submission)
    }

    /// Accept an image and process it in the background.
    ///
    /// Returns the new submission id as soon as the row exists. Must be
    /// called from within a Tokio runtime.
    pub fn submit(&self, raw_image: &str) -> Result<String, LifecycleError> {
        let image = self.validate_image(raw_image)?;
        let submission = self.create(&image)?;
        let id = submission.id.clone();

        let manager = self.clone();
        tokio::spawn(async move {
            let id = submission.id.clone();
            if let Err(e) = manager.drive(submission, &image).await {
                error!(submission_id = %id, error = %e, "Submission chain aborted");
            }
        });

        Ok(id)
    }

    /// Accept an image and process it inline, returning the resolved submission.
    pub async fn submit_and_wait(&self, raw_image: &str) -> Result<Submission, LifecycleError> {
        let image = self.validate_image(raw_image)?;
        let submission = self.create(&image)?;
        self.drive(submission, &image).await
    }

    /// Run the remaining phases of an existing submission.
    ///
    /// Refuses submissions that are already terminal.
    pub async fn process(&self, id: &str) -> Result<Submission, LifecycleError> {
        let submission = self
            .store
            .get(id)?
            .ok_or_else(|| SubmissionError::NotFound(id.to_string()))?;

        if submission.status.is_terminal() {
            return Err(LifecycleError::AlreadyTerminal {
                submission_id: submission.id,
                status: submission.status,
            });
        }

        let image = self.validator.validate(&submission.image_data_uri)?;
        self.drive(submission, &image).await
    }

    /// Move submissions stuck in a processing status to their phase's error
    /// status. Only rows untouched for `older_than` are considered.
    ///
    /// Returns the number of submissions closed.
    pub fn reconcile_interrupted(&self, older_than: Duration) -> Result<usize, LifecycleError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let stuck = self.store.list_unfinished(cutoff)?;

        let mut reconciled = 0;
        for submission in stuck {
            let Some(failed) = submission.status.failure_status() else {
                continue;
            };
            match self.store.record_error(&submission.id, failed, INTERRUPTED_MESSAGE) {
                Ok(updated) => {
                    reconciled += 1;
                    metrics::SUBMISSIONS_RECONCILED.inc();
                    warn!(
                        submission_id = %updated.id,
                        from = %submission.status,
                        status = %updated.status,
                        "Closed interrupted submission"
                    );
                    self.notify(&updated);
                }
                Err(e) => {
                    // Typically a chain that finished between list and write.
                    warn!(
                        submission_id = %submission.id,
                        error = %e,
                        "Could not reconcile submission"
                    );
                }
            }
        }

        if reconciled > 0 {
            info!("Reconciled {} interrupted submissions", reconciled);
        }
        Ok(reconciled)
    }

    /// Run whichever phases remain for a non-terminal submission.
    async fn drive(
        &self,
        mut submission: Submission,
        image: &ImageReference,
    ) -> Result<Submission, LifecycleError> {
        if submission.status == SubmissionStatus::ProcessingIdentification {
            submission = self.identify(&submission, image).await?;
        }
        if submission.status == SubmissionStatus::ProcessingValuation {
            submission = self.value(&submission).await?;
        }
        Ok(submission)
    }

    async fn identify(
        &self,
        submission: &Submission,
        image: &ImageReference,
    ) -> Result<Submission, LifecycleError> {
        let identifier = &self.capabilities.identifier;
        debug!(
            submission_id = %submission.id,
            identifier = identifier.name(),
            schema_version = identifier.schema_version(),
            "Identifying card"
        );

        let result = call_with_timeout(
            "identification",
            self.identification_timeout,
            identifier.identify(image),
        )
        .await;

        let (status, update) = match result {
            Ok(IdentificationOutcome::Identified(identity)) => {
                info!(
                    submission_id = %submission.id,
                    card_name = %identity.name,
                    card_number = %identity.number,
                    "Card identified"
                );
                (
                    SubmissionStatus::ProcessingValuation,
                    SubmissionUpdate::Identification(identity),
                )
            }
            Ok(IdentificationOutcome::Incomplete {
                card_name,
                card_number,
            }) => {
                warn!(
                    submission_id = %submission.id,
                    card_name = ?card_name,
                    card_number = ?card_number,
                    "Identification incomplete"
                );
                (
                    SubmissionStatus::ErrorIdentification,
                    SubmissionUpdate::Error(INCOMPLETE_IDENTIFICATION_MESSAGE.to_string()),
                )
            }
            Err(e) => {
                warn!(submission_id = %submission.id, error = %e, "Identification failed");
                (
                    SubmissionStatus::ErrorIdentification,
                    SubmissionUpdate::Error(format!("Identification failed: {}", e)),
                )
            }
        };

        self.record(&submission.id, status, update)
    }

    async fn value(&self, submission: &Submission) -> Result<Submission, LifecycleError> {
        let Some(identity) = submission.card_identity.clone() else {
            // Unreachable while the store enforces its invariants.
            return self.record(
                &submission.id,
                SubmissionStatus::ErrorValuation,
                SubmissionUpdate::Error("No card identity recorded".to_string()),
            );
        };

        let valuer = &self.capabilities.valuer;
        debug!(
            submission_id = %submission.id,
            valuer = valuer.name(),
            schema_version = valuer.schema_version(),
            card = %identity.search_terms(),
            "Estimating card value"
        );

        let result =
            call_with_timeout("valuation", self.valuation_timeout, valuer.estimate(&identity))
                .await;

        let (status, update) = match result {
            Ok(Some(estimates)) => {
                info!(
                    submission_id = %submission.id,
                    estimates = estimates.len(),
                    "Card valued"
                );
                (
                    SubmissionStatus::Completed,
                    SubmissionUpdate::Valuation(estimates),
                )
            }
            Ok(None) => {
                warn!(submission_id = %submission.id, "Valuation returned no data");
                (
                    SubmissionStatus::ErrorValuation,
                    SubmissionUpdate::Error(EMPTY_VALUATION_MESSAGE.to_string()),
                )
            }
            Err(e) => {
                warn!(submission_id = %submission.id, error = %e, "Valuation failed");
                (
                    SubmissionStatus::ErrorValuation,
                    SubmissionUpdate::Error(format!("Valuation failed: {}", e)),
                )
            }
        };

        self.record(&submission.id, status, update)
    }

    /// Persist an outcome. A store failure stops the chain.
    fn record(
        &self,
        id: &str,
        status: SubmissionStatus,
        update: SubmissionUpdate,
    ) -> Result<Submission, LifecycleError> {
        match self.store.update(id, status, update) {
            Ok(submission) => {
                self.notify(&submission);
                Ok(submission)
            }
            Err(e) => {
                metrics::STORE_FAILURES.inc();
                error!(
                    submission_id = id,
                    status = %status,
                    error = %e,
                    "Failed to record submission outcome"
                );
                Err(e.into())
            }
        }
    }

    fn notify(&self, submission: &Submission) {
        if submission.status.is_terminal() {
            let status = submission.status.as_str();
            metrics::SUBMISSIONS_FINISHED
                .with_label_values(&[status])
                .inc();
            let elapsed = (submission.updated_at - submission.created_at)
                .to_std()
                .unwrap_or_default();
            metrics::CHAIN_DURATION
                .with_label_values(&[status])
                .observe(elapsed.as_secs_f64());
        }

        if let Some(callback) = &self.on_update {
            callback(&submission.id, submission.status);
        }
    }
}

/// Await a capability call, turning an elapsed timeout into a failure.
async fn call_with_timeout<T>(
    phase: &str,
    timeout: Duration,
    call: impl Future<Output = Result<T, CapabilityError>>,
) -> Result<T, CapabilityError> {
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(CapabilityError::Timeout(timeout)));

    let outcome = match &result {
        Ok(_) => "success",
        Err(CapabilityError::Timeout(_)) => "timeout",
        Err(_) => "failed",
    };
    metrics::CAPABILITY_CALLS
        .with_label_values(&[phase, outcome])
        .inc();
    metrics::CAPABILITY_DURATION
        .with_label_values(&[phase])
        .observe(started.elapsed().as_secs_f64());

    result
}

fn rejection_reason(error: &ImageError) -> &'static str {
    match error {
        ImageError::Empty => "empty",
        ImageError::NotDataUri => "not_data_uri",
        ImageError::UnsupportedMimeType(_) => "mime_type",
        ImageError::TooLarge { .. } => "too_large",
        ImageError::InvalidBase64(_) => "base64",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubmissionsConfig;
    use crate::submission::{CardIdentity, InMemorySubmissionStore, SubmissionFilter};
    use crate::testing::{fixtures, MockCardIdentifier, MockCardValuer};
    use std::sync::Mutex;

    struct Harness {
        manager: LifecycleManager,
        store: Arc<InMemorySubmissionStore>,
        identifier: Arc<MockCardIdentifier>,
        valuer: Arc<MockCardValuer>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemorySubmissionStore::new());
        let identifier = Arc::new(MockCardIdentifier::new());
        let valuer = Arc::new(MockCardValuer::new());
        let manager = LifecycleManager::new(
            store.clone(),
            CardCapabilities::new(identifier.clone(), valuer.clone()),
            ImageValidator::from_config(&SubmissionsConfig::default()),
            &LifecycleConfig::default(),
        );
        Harness {
            manager,
            store,
            identifier,
            valuer,
        }
    }

    #[tokio::test]
    async fn test_submit_and_wait_completes() {
        let h = harness();
        h.valuer.set_result(Some(fixtures::pikachu_estimates())).await;

        let submission = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::Completed);
        assert_eq!(
            submission.card_identity,
            Some(CardIdentity::new("Pikachu", "025"))
        );
        assert_eq!(submission.valuation.as_ref().map(Vec::len), Some(2));
        assert!(submission.error_message.is_none());
        assert_eq!(h.store.get(&submission.id).unwrap(), Some(submission));
    }

    #[tokio::test]
    async fn test_incomplete_identification_skips_valuation() {
        let h = harness();
        h.identifier
            .set_outcome(IdentificationOutcome::Incomplete {
                card_name: Some("Pikachu".to_string()),
                card_number: None,
            })
            .await;

        let submission = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::ErrorIdentification);
        assert_eq!(
            submission.error_message.as_deref(),
            Some(INCOMPLETE_IDENTIFICATION_MESSAGE)
        );
        assert!(h.valuer.recorded_identities().await.is_empty());
    }

    #[tokio::test]
    async fn test_null_valuation_is_error() {
        let h = harness();
        h.valuer.set_result(None).await;

        let submission = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::ErrorValuation);
        assert!(submission.card_identity.is_some());
        assert!(submission.valuation.is_none());
        assert_eq!(
            submission.error_message.as_deref(),
            Some(EMPTY_VALUATION_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_identification_timeout_is_error() {
        let h = harness();
        h.identifier.set_delay(Duration::from_secs(5)).await;
        let manager = h
            .manager
            .clone()
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

        let submission = manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::ErrorIdentification);
        assert!(submission
            .error_message
            .as_deref()
            .is_some_and(|m| m.contains("Timed out")));
    }

    #[tokio::test]
    async fn test_valuation_error_keeps_identity() {
        let h = harness();
        h.valuer
            .set_next_error(CapabilityError::Failed("quota exceeded".to_string()))
            .await;

        let submission = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(submission.status, SubmissionStatus::ErrorValuation);
        assert_eq!(
            submission.error_message.as_deref(),
            Some("Valuation failed: quota exceeded")
        );
        assert!(submission.card_identity.is_some());
    }

    #[tokio::test]
    async fn test_invalid_image_creates_nothing() {
        let h = harness();
        let result = h.manager.submit("data:text/plain;base64,aGVsbG8=");
        assert!(matches!(
            result,
            Err(LifecycleError::Image(ImageError::NotDataUri))
        ));
        assert_eq!(
            h.store.count(&SubmissionFilter::new()).unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_process_refuses_terminal() {
        let h = harness();
        let submission = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        let result = h.manager.process(&submission.id).await;
        assert!(matches!(
            result,
            Err(LifecycleError::AlreadyTerminal {
                status: SubmissionStatus::Completed,
                ..
            })
        ));
        assert_eq!(h.identifier.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_process_unknown_id() {
        let h = harness();
        let result = h.manager.process("missing").await;
        assert!(matches!(
            result,
            Err(LifecycleError::Store(SubmissionError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_process_resumes_created_submission() {
        let h = harness();
        let image = h.manager.validate_image(fixtures::PNG_DATA_URI).unwrap();
        let created = h.manager.create(&image).unwrap();

        let processed = h.manager.process(&created.id).await.unwrap();
        assert_eq!(processed.status, SubmissionStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_callback_sees_every_transition() {
        let h = harness();
        let seen: Arc<Mutex<Vec<SubmissionStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let manager = h
            .manager
            .clone()
            .with_update_callback(Arc::new(move |_id: &str, status: SubmissionStatus| {
                sink.lock().unwrap().push(status);
            }));

        manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                SubmissionStatus::ProcessingIdentification,
                SubmissionStatus::ProcessingValuation,
                SubmissionStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_reconcile_interrupted() {
        let h = harness();
        let image = h.manager.validate_image(fixtures::PNG_DATA_URI).unwrap();
        let stuck_identifying = h.manager.create(&image).unwrap();
        let stuck_valuing = h.manager.create(&image).unwrap();
        h.store
            .record_identification(
                &stuck_valuing.id,
                CardIdentity::new("Mew", "151"),
                SubmissionStatus::ProcessingValuation,
            )
            .unwrap();
        let finished = h
            .manager
            .submit_and_wait(fixtures::PNG_DATA_URI)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let closed = h.manager.reconcile_interrupted(Duration::ZERO).unwrap();
        assert_eq!(closed, 2);

        let a = h.store.get(&stuck_identifying.id).unwrap().unwrap();
        assert_eq!(a.status, SubmissionStatus::ErrorIdentification);
        assert_eq!(a.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));

        let b = h.store.get(&stuck_valuing.id).unwrap().unwrap();
        assert_eq!(b.status, SubmissionStatus::ErrorValuation);
        assert!(b.card_identity.is_some());

        let c = h.store.get(&finished.id).unwrap().unwrap();
        assert_eq!(c, finished);
    }

    #[tokio::test]
    async fn test_reconcile_respects_age() {
        let h = harness();
        let image = h.manager.validate_image(fixtures::PNG_DATA_URI).unwrap();
        h.manager.create(&image).unwrap();

        let closed = h
            .manager
            .reconcile_interrupted(Duration::from_secs(3600))
            .unwrap();
        assert_eq!(closed, 0);
    }
}
