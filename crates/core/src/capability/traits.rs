//! Capability traits and errors.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::image::ImageReference;
use crate::llm::LlmError;
use crate::submission::{CardIdentity, MarketplaceEstimate};

/// Identification replies carry name, number, deck letter and illustrator.
pub const IDENTIFICATION_SCHEMA_VERSION: u32 = 2;

/// Valuation replies are an array of per-marketplace estimates.
pub const VALUATION_SCHEMA_VERSION: u32 = 2;

/// Errors raised by a capability call.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// The reply did not have the expected shape.
    #[error("Response did not match the expected schema: {0}")]
    SchemaMismatch(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM error: {0}")]
    Llm(LlmError),

    #[error("{0}")]
    Failed(String),
}

impl From<LlmError> for CapabilityError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Json(message) => CapabilityError::SchemaMismatch(message),
            LlmError::EmptyResponse => {
                CapabilityError::SchemaMismatch("model returned no content".to_string())
            }
            other => CapabilityError::Llm(other),
        }
    }
}

/// Result of a completed identification call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentificationOutcome {
    /// Name and number were both read.
    Identified(CardIdentity),
    /// The collaborator answered but the name or number is missing.
    Incomplete {
        card_name: Option<String>,
        card_number: Option<String>,
    },
}

impl IdentificationOutcome {
    pub fn into_identity(self) -> Option<CardIdentity> {
        match self {
            IdentificationOutcome::Identified(identity) => Some(identity),
            IdentificationOutcome::Incomplete { .. } => None,
        }
    }
}

/// Maps a card image to a structured identity.
#[async_trait]
pub trait CardIdentifier: Send + Sync {
    /// Name of this identifier for logging.
    fn name(&self) -> &str;

    /// Version of the reply schema this identifier produces.
    fn schema_version(&self) -> u32 {
        IDENTIFICATION_SCHEMA_VERSION
    }

    async fn identify(&self, image: &ImageReference)
        -> Result<IdentificationOutcome, CapabilityError>;
}

/// Maps a card identity to marketplace estimates.
#[async_trait]
pub trait CardValuer: Send + Sync {
    /// Name of this valuer for logging.
    fn name(&self) -> &str;

    /// Version of the reply schema this valuer produces.
    fn schema_version(&self) -> u32 {
        VALUATION_SCHEMA_VERSION
    }

    /// Estimate the card's value.
    ///
    /// `Ok(None)` means the collaborator produced no result at all, which is
    /// a failure. `Ok(Some(vec![]))` means nothing was found, which is not.
    async fn estimate(
        &self,
        identity: &CardIdentity,
    ) -> Result<Option<Vec<MarketplaceEstimate>>, CapabilityError>;
}
