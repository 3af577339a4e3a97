//! Identification and valuation capabilities.
//!
//! The lifecycle manager only sees the [`CardIdentifier`] and [`CardValuer`]
//! traits. LLM-backed implementations build the prompts, request JSON and
//! validate the untyped reply in [`boundary`] before anything reaches a
//! submission.

pub mod boundary;
mod factory;
mod identifier;
mod traits;
mod valuer;

pub use factory::{build_capabilities, CardCapabilities};
pub use identifier::LlmCardIdentifier;
pub use traits::{
    CapabilityError, CardIdentifier, CardValuer, IdentificationOutcome,
    IDENTIFICATION_SCHEMA_VERSION, VALUATION_SCHEMA_VERSION,
};
pub use valuer::LlmCardValuer;

/// Generation settings shared by the LLM-backed capabilities.
#[derive(Debug, Clone)]
pub struct LlmCapabilityConfig {
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for LlmCapabilityConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}
