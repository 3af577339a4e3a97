//! LLM-backed marketplace valuation.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::boundary::{canonical_search_url, parse_valuation, EBAY, PRICE_CHARTING};
use super::traits::{CapabilityError, CardValuer};
use super::LlmCapabilityConfig;
use crate::llm::{CompletionRequest, LlmClient, LlmUsage};
use crate::submission::{CardIdentity, MarketplaceEstimate, NOT_FOUND_VALUE};

/// Estimates resale value on eBay and PriceCharting.
pub struct LlmCardValuer<C: LlmClient> {
    client: Arc<C>,
    config: LlmCapabilityConfig,
}

impl<C: LlmClient> LlmCardValuer<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            config: LlmCapabilityConfig::default(),
        }
    }

    pub fn with_config(client: Arc<C>, config: LlmCapabilityConfig) -> Self {
        Self { client, config }
    }

    fn build_system_prompt(&self) -> String {
        format!(
            r#"You appraise Pokémon trading cards. For the card described by the user, estimate its current market value on two sources: {ebay} and {pc}.

RULES:
1. Search with the card name and collector number (e.g., "Charizard 4"). Append the deck letter when present (e.g., "Pikachu 025D"). Use the illustrator only to disambiguate promo or special cards.
2. For {ebay}, base the value on recently SOLD listings, not active ones.
3. For {pc}, use the primary (ungraded) price unless the search clearly targets a graded copy.
4. estimatedValue must include the currency and be specific, e.g. "$15.50 (average sold, ungraded)". If no credible price exists, use exactly "{not_found}".
5. searchUrl must be the exact, URL-encoded search results page you used. Use a product page for {pc} when one exists.

Search URL formats:
- {ebay}: {ebay_url}
- {pc}: {pc_url}

Respond with JSON only, no other text: an array with one object per marketplace:
[
  {{"marketplace": "{ebay}", "estimatedValue": "$15.50 (average sold, ungraded)", "searchUrl": "..."}},
  {{"marketplace": "{pc}", "estimatedValue": "{not_found}", "searchUrl": "..."}}
]"#,
            ebay = EBAY,
            pc = PRICE_CHARTING,
            not_found = NOT_FOUND_VALUE,
            ebay_url = example_url(EBAY),
            pc_url = example_url(PRICE_CHARTING),
        )
    }

    fn build_user_prompt(&self, identity: &CardIdentity) -> String {
        let mut prompt = format!(
            "Card details:\n- Card name: {}\n- Card number: {}",
            identity.name, identity.number
        );
        prompt.push_str(&format!(
            "\n- Deck ID letter: {}",
            identity.deck_id_letter.as_deref().unwrap_or("N/A")
        ));
        prompt.push_str(&format!(
            "\n- Illustrator: {}",
            identity.illustrator_name.as_deref().unwrap_or("N/A")
        ));
        prompt
    }
}

fn example_url(marketplace: &str) -> String {
    canonical_search_url(marketplace, &CardIdentity::new("Pikachu", "151")).unwrap_or_default()
}

#[async_trait]
impl<C: LlmClient + 'static> CardValuer for LlmCardValuer<C> {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn estimate(
        &self,
        identity: &CardIdentity,
    ) -> Result<Option<Vec<MarketplaceEstimate>>, CapabilityError> {
        let request = CompletionRequest::new(self.build_user_prompt(identity))
            .with_system(self.build_system_prompt())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output();

        let (value, usage): (Value, LlmUsage) = self.client.complete_json(request).await?;

        debug!(
            provider = self.client.provider(),
            card = %identity.search_terms(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Valuation reply received"
        );

        parse_valuation(&value, identity)
    }
}
