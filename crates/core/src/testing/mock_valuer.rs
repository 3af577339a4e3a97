//! Mock card valuer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::capability::{CapabilityError, CardValuer};
use crate::submission::{CardIdentity, MarketplaceEstimate};

use super::fixtures;

type EstimateResult = Result<Option<Vec<MarketplaceEstimate>>, CapabilityError>;

/// Produces a result per identity.
type EstimateHandler = Box<dyn Fn(&CardIdentity) -> EstimateResult + Send + Sync>;

/// Mock implementation of the CardValuer trait.
///
/// Returns the Pikachu estimates by default. `set_result(None)` simulates
/// a collaborator that produced nothing.
pub struct MockCardValuer {
    result: Arc<RwLock<Option<Vec<MarketplaceEstimate>>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<CapabilityError>>>,
    handler: Arc<RwLock<Option<EstimateHandler>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    identities: Arc<RwLock<Vec<CardIdentity>>>,
}

impl std::fmt::Debug for MockCardValuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCardValuer")
            .field("result", &"<result>")
            .field("next_error", &"<next_error>")
            .field("handler", &"<handler>")
            .field("delay", &"<delay>")
            .field("identities", &"<identities>")
            .finish()
    }
}

impl Default for MockCardValuer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCardValuer {
    pub fn new() -> Self {
        Self::returning(Some(fixtures::pikachu_estimates()))
    }

    /// Create a mock with a fixed result.
    pub fn returning(result: Option<Vec<MarketplaceEstimate>>) -> Self {
        Self {
            result: Arc::new(RwLock::new(result)),
            next_error: Arc::new(RwLock::new(None)),
            handler: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(None)),
            identities: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_result(&self, result: Option<Vec<MarketplaceEstimate>>) {
        *self.result.write().await = result;
    }

    pub async fn set_next_error(&self, error: CapabilityError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&CardIdentity) -> EstimateResult + Send + Sync + 'static,
    {
        *self.handler.write().await = Some(Box::new(handler));
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Identities passed to `estimate`, in call order.
    pub async fn recorded_identities(&self) -> Vec<CardIdentity> {
        self.identities.read().await.clone()
    }
}

#[async_trait]
impl CardValuer for MockCardValuer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn estimate(&self, identity: &CardIdentity) -> EstimateResult {
        self.identities.write().await.push(identity.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(handler) = self.handler.read().await.as_ref() {
            return handler(identity);
        }

        Ok(self.result.read().await.clone())
    }
}
