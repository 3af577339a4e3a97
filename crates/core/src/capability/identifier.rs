//! LLM-backed card identification.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::boundary::parse_identification;
use super::traits::{CapabilityError, CardIdentifier, IdentificationOutcome};
use super::LlmCapabilityConfig;
use crate::image::ImageReference;
use crate::llm::{CompletionRequest, ImageAttachment, LlmClient, LlmUsage};

/// Reads name, number, deck letter and illustrator from a card photo.
///
/// Generic over the LLM client type to support different backends.
pub struct LlmCardIdentifier<C: LlmClient> {
    client: Arc<C>,
    config: LlmCapabilityConfig,
}

impl<C: LlmClient> LlmCardIdentifier<C> {
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
        r#"You are an expert Pokémon trading card identifier. You will be shown a photo of a single card. Extract:

1. cardName: the primary name printed on the card (e.g., "Pikachu", "Charizard ex").
2. cardNumber: the collector number of the card within its set, the part before the slash (e.g., "025" from "025/165", "RC25" from "RC25/RC32").
3. deckIdLetter (optional): a letter printed right after or very close to the collector number that marks a deck version (commonly "D", as in "56D" or "056 D"). Omit it when no such letter is clearly attached to the number.
4. illustratorName (optional): the artist credited along the bottom edge (e.g., "Illus. Ken Sugimori" gives "Ken Sugimori"). Omit it when not legible.

If you cannot read the name or the number, return an empty string for that field. Do not guess.

Respond with JSON only, no other text:
{
  "cardName": "Pikachu",
  "cardNumber": "025",
  "deckIdLetter": "D",
  "illustratorName": "Atsuko Nishida"
}"#
        .to_string()
    }

    fn build_request(&self, image: &ImageReference) -> CompletionRequest {
        CompletionRequest::new("Identify the Pokémon card in this photo.")
            .with_system(self.build_system_prompt())
            .with_image(ImageAttachment::new(
                image.mime_type(),
                image.base64_payload(),
            ))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
            .with_json_output()
    }
}

#[async_trait]
impl<C: LlmClient + 'static> CardIdentifier for LlmCardIdentifier<C> {
    fn name(&self) -> &str {
        self.client.provider()
    }

    async fn identify(
        &self,
        image: &ImageReference,
    ) -> Result<IdentificationOutcome, CapabilityError> {
        let request = self.build_request(image);
        let (value, usage): (Value, LlmUsage) = self.client.complete_json(request).await?;

        debug!(
            provider = self.client.provider(),
            model = self.client.model(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Identification reply received"
        );

        parse_identification(&value)
    }
}
