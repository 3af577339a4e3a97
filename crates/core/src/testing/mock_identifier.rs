//! Mock card identifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::capability::{CapabilityError, CardIdentifier, IdentificationOutcome};
use crate::image::ImageReference;

use super::fixtures;

/// A recorded identification call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedIdentification {
    /// Digest of the image that was identified.
    pub image_digest: String,
    /// When the call was made.
    pub timestamp: Instant,
}

/// Produces an outcome per image.
type IdentifyHandler =
    Box<dyn Fn(&ImageReference) -> Result<IdentificationOutcome, CapabilityError> + Send + Sync>;

/// Mock implementation of the CardIdentifier trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable outcome (Pikachu 025 by default)
/// - Fail the next call, or every call through a handler
/// - Delay responses to exercise timeouts
/// - Track calls for assertions
pub struct MockCardIdentifier {
    outcome: Arc<RwLock<IdentificationOutcome>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<CapabilityError>>>,
    handler: Arc<RwLock<Option<IdentifyHandler>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<RecordedIdentification>>>,
}

impl std::fmt::Debug for MockCardIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCardIdentifier")
            .field("outcome", &"<outcome>")
            .field("next_error", &"<next_error>")
            .field("handler", &"<handler>")
            .field("delay", &"<delay>")
            .field("calls", &"<calls>")
            .finish()
    }
}

impl Default for MockCardIdentifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCardIdentifier {
    /// Create a mock that identifies every image as Pikachu 025.
    pub fn new() -> Self {
        Self::returning(IdentificationOutcome::Identified(fixtures::pikachu()))
    }

    /// Create a mock with a fixed outcome.
    pub fn returning(outcome: IdentificationOutcome) -> Self {
        Self {
            outcome: Arc::new(RwLock::new(outcome)),
            next_error: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_outcome(&self, outcome: IdentificationOutcome) {
        *self.outcome.write().await = outcome;
    }

    /// Make the next call fail.
    pub async fn set_next_error(&self, error: CapabilityError) {
        *self.next_error.write().await = Some(error);
    }

    /// Decide the result per image. Takes precedence over the fixed outcome.
    pub async fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&ImageReference) -> Result<IdentificationOutcome, CapabilityError>
            + Send
            + Sync
            + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    /// Sleep this long before answering.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedIdentification> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }
}

#[async_trait]
impl CardIdentifier for MockCardIdentifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn identify(
        &self,
        image: &ImageReference,
    ) -> Result<IdentificationOutcome, CapabilityError> {
        self.calls.write().await.push(RecordedIdentification {
            image_digest: image.digest().to_string(),
            timestamp: Instant::now(),
        });

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(handler) = self.handler.read().await.as_ref() {
            return handler(image);
        }

        Ok(self.outcome.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_outcome() {
        let mock = MockCardIdentifier::new();
        let outcome = mock.identify(&fixtures::png_image()).await.unwrap();
        assert_eq!(outcome.into_identity(), Some(fixtures::pikachu()));
        assert_eq!(mock.call_count().await, 1);
    }

    #[tokio::test]
    async fn test_next_error_applies_once() {
        let mock = MockCardIdentifier::new();
        mock.set_next_error(CapabilityError::Failed("blurry".to_string()))
            .await;

        assert!(mock.identify(&fixtures::png_image()).await.is_err());
        assert!(mock.identify(&fixtures::png_image()).await.is_ok());
    }

    #[tokio::test]
    async fn test_handler() {
        let mock = MockCardIdentifier::new();
        mock.set_handler(|_| Err(CapabilityError::Failed("always".to_string())))
            .await;
        assert!(mock.identify(&fixtures::png_image()).await.is_err());
        assert!(mock.identify(&fixtures::png_image()).await.is_err());

        let calls = mock.recorded_calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].image_digest, fixtures::png_image().digest());
    }
}
