//! Testing utilities and mock implementations.
//!
//! Mocks for the capability traits and the LLM client, so the lifecycle
//! and the HTTP API can be exercised without a model behind them.
//!
//! # Example
//!
//! ```rust,ignore
//! use pokevalue_core::testing::{fixtures, MockCardIdentifier, MockCardValuer};
//!
//! let identifier = MockCardIdentifier::new();
//! let valuer = MockCardValuer::new();
//!
//! // Configure responses
//! valuer.set_result(Some(vec![])).await;
//! identifier.set_next_error(CapabilityError::Failed("blurry".into())).await;
//!
//! // Use in CardCapabilities...
//! ```

mod mock_identifier;
mod mock_llm_client;
mod mock_valuer;

pub use mock_identifier::{MockCardIdentifier, RecordedIdentification};
pub use mock_llm_client::MockLlmClient;
pub use mock_valuer::MockCardValuer;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::SubmissionsConfig;
    use crate::image::{ImageReference, ImageValidator};
    use crate::submission::{CardIdentity, MarketplaceEstimate, NOT_FOUND_VALUE};

    /// A 1x1 transparent PNG as a data URI.
    pub const PNG_DATA_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

    /// [`PNG_DATA_URI`] validated with the default limits.
    pub fn png_image() -> ImageReference {
        ImageValidator::from_config(&SubmissionsConfig::default())
            .validate(PNG_DATA_URI)
            .expect("fixture PNG is a valid data URI")
    }

    /// A well-formed JPEG data URI longer than `max_bytes`.
    pub fn oversized_data_uri(max_bytes: usize) -> String {
        let prefix = "data:image/jpeg;base64,";
        // Multiple of 4 so the payload stays valid base64.
        let payload_len = (max_bytes.saturating_sub(prefix.len()) / 4 + 1) * 4;
        format!("{}{}", prefix, "A".repeat(payload_len))
    }

    /// The identity used across lifecycle scenarios.
    pub fn pikachu() -> CardIdentity {
        CardIdentity::new("Pikachu", "025")
    }

    /// One priced eBay result and one PriceCharting miss.
    pub fn pikachu_estimates() -> Vec<MarketplaceEstimate> {
        vec![
            MarketplaceEstimate::new(
                "eBay",
                "$15.50",
                "https://www.ebay.com/sch/i.html?_nkw=Pikachu+025&_sacat=0&LH_Complete=1&LH_Sold=1",
            ),
            MarketplaceEstimate::new(
                "PriceCharting",
                NOT_FOUND_VALUE,
                "https://www.pricecharting.com/search-products?q=Pikachu+025&type=prices",
            ),
        ]
    }
}
