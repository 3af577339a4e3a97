//! Core submission data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel value reported when a marketplace has no usable price.
pub const NOT_FOUND_VALUE: &str = "Not found";

/// Structured identity of a trading card, as read from its image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CardIdentity {
    /// Card name (e.g., "Pikachu", "Charizard ex").
    #[serde(rename = "cardName")]
    pub name: String,
    /// Collector number within the set (e.g., "025" from "025/165").
    #[serde(rename = "cardNumber")]
    pub number: String,
    /// Deck version letter printed next to the number (commonly "D").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck_id_letter: Option<String>,
    /// Illustrator credited at the bottom of the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustrator_name: Option<String>,
}

impl CardIdentity {
    /// Create an identity with only the required fields.
    pub fn new(name: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number: number.into(),
            deck_id_letter: None,
            illustrator_name: None,
        }
    }

    pub fn with_deck_id_letter(mut self, letter: impl Into<String>) -> Self {
        self.deck_id_letter = Some(letter.into());
        self
    }

    pub fn with_illustrator(mut self, illustrator: impl Into<String>) -> Self {
        self.illustrator_name = Some(illustrator.into());
        self
    }

    /// Search terms for marketplace queries: "<name> <number><letter>".
    pub fn search_terms(&self) -> String {
        match &self.deck_id_letter {
            Some(letter) => format!("{} {}{}", self.name, self.number, letter),
            None => format!("{} {}", self.name, self.number),
        }
    }
}

/// A single marketplace price estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceEstimate {
    /// Marketplace name (e.g., "eBay", "PriceCharting").
    pub marketplace: String,
    /// Free-form value text including currency, or the "Not found" sentinel.
    pub estimated_value: String,
    /// URL of the search results backing the estimate.
    pub search_url: String,
}

impl MarketplaceEstimate {
    pub fn new(
        marketplace: impl Into<String>,
        estimated_value: impl Into<String>,
        search_url: impl Into<String>,
    ) -> Self {
        Self {
            marketplace: marketplace.into(),
            estimated_value: estimated_value.into(),
            search_url: search_url.into(),
        }
    }

    /// Returns true if the marketplace had no usable price.
    pub fn is_not_found(&self) -> bool {
        let value = self.estimated_value.trim();
        value.eq_ignore_ascii_case(NOT_FOUND_VALUE) || value.eq_ignore_ascii_case("n/a")
    }
}

/// Processing status of a submission.
///
/// ```text
/// ProcessingIdentification -> ProcessingValuation -> Completed
///          |                          |
///          v                          v
/// ErrorIdentification          ErrorValuation
/// ```
///
/// Terminal states never transition again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    ProcessingIdentification,
    ProcessingValuation,
    Completed,
    ErrorIdentification,
    ErrorValuation,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        SubmissionStatus::ProcessingIdentification,
        SubmissionStatus::ProcessingValuation,
        SubmissionStatus::Completed,
        SubmissionStatus::ErrorIdentification,
        SubmissionStatus::ErrorValuation,
    ];

    /// Returns true if no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Completed
                | SubmissionStatus::ErrorIdentification
                | SubmissionStatus::ErrorValuation
        )
    }

    /// Returns true for the two error states.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::ErrorIdentification | SubmissionStatus::ErrorValuation
        )
    }

    /// Returns true once identification has produced a card identity.
    pub fn has_identity(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::ProcessingValuation
                | SubmissionStatus::Completed
                | SubmissionStatus::ErrorValuation
        )
    }

    /// Returns true if `next` is an allowed edge from this status.
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, next),
            (ProcessingIdentification, ProcessingValuation)
                | (ProcessingIdentification, ErrorIdentification)
                | (ProcessingValuation, Completed)
                | (ProcessingValuation, ErrorValuation)
        )
    }

    /// The error state a processing status falls into on failure.
    pub fn failure_status(&self) -> Option<SubmissionStatus> {
        match self {
            SubmissionStatus::ProcessingIdentification => {
                Some(SubmissionStatus::ErrorIdentification)
            }
            SubmissionStatus::ProcessingValuation => Some(SubmissionStatus::ErrorValuation),
            _ => None,
        }
    }

    /// Stable string form, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::ProcessingIdentification => "PROCESSING_IDENTIFICATION",
            SubmissionStatus::ProcessingValuation => "PROCESSING_VALUATION",
            SubmissionStatus::Completed => "COMPLETED",
            SubmissionStatus::ErrorIdentification => "ERROR_IDENTIFICATION",
            SubmissionStatus::ErrorValuation => "ERROR_VALUATION",
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown submission status: {}", s))
    }
}

/// One card-scan request and its accumulated processing state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    /// Unique identifier (UUID).
    pub id: String,

    /// Input image as a `data:image/...;base64,...` URI.
    pub image_data_uri: String,

    /// Hex SHA-256 of the image data URI.
    pub image_digest: String,

    /// Card identity, once identification has succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_identity: Option<CardIdentity>,

    /// Marketplace estimates, once valuation has succeeded (may be empty).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valuation: Option<Vec<MarketplaceEstimate>>,

    /// Current status.
    pub status: SubmissionStatus,

    /// Human-readable failure description for error states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Refreshed on every write.
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    /// Create a fresh submission in the initial state.
    pub fn new(
        id: impl Into<String>,
        image_data_uri: impl Into<String>,
        image_digest: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            image_data_uri: image_data_uri.into(),
            image_digest: image_digest.into(),
            card_identity: None,
            valuation: None,
            status: SubmissionStatus::ProcessingIdentification,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_is_not_terminal() {
        let status = SubmissionStatus::ProcessingIdentification;
        assert!(!status.is_terminal());
        assert!(!status.is_error());
        assert!(!status.has_identity());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SubmissionStatus::Completed.is_terminal());
        assert!(SubmissionStatus::ErrorIdentification.is_terminal());
        assert!(SubmissionStatus::ErrorValuation.is_terminal());
        assert!(!SubmissionStatus::ProcessingValuation.is_terminal());
    }

    #[test]
    fn test_allowed_transitions() {
        use SubmissionStatus::*;
        assert!(ProcessingIdentification.can_transition_to(ProcessingValuation));
        assert!(ProcessingIdentification.can_transition_to(ErrorIdentification));
        assert!(ProcessingValuation.can_transition_to(Completed));
        assert!(ProcessingValuation.can_transition_to(ErrorValuation));
    }

    #[test]
    fn test_forbidden_transitions() {
        use SubmissionStatus::*;
        // Skipping identification
        assert!(!ProcessingIdentification.can_transition_to(Completed));
        assert!(!ProcessingIdentification.can_transition_to(ErrorValuation));
        // Going backwards
        assert!(!ProcessingValuation.can_transition_to(ProcessingIdentification));
        assert!(!ProcessingValuation.can_transition_to(ErrorIdentification));
        // No resurrection from terminal states
        for terminal in [Completed, ErrorIdentification, ErrorValuation] {
            for next in SubmissionStatus::ALL {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_failure_status() {
        assert_eq!(
            SubmissionStatus::ProcessingIdentification.failure_status(),
            Some(SubmissionStatus::ErrorIdentification)
        );
        assert_eq!(
            SubmissionStatus::ProcessingValuation.failure_status(),
            Some(SubmissionStatus::ErrorValuation)
        );
        assert_eq!(SubmissionStatus::Completed.failure_status(), None);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&SubmissionStatus::ProcessingValuation).unwrap();
        assert_eq!(json, "\"PROCESSING_VALUATION\"");

        let parsed: SubmissionStatus = serde_json::from_str("\"ERROR_IDENTIFICATION\"").unwrap();
        assert_eq!(parsed, SubmissionStatus::ErrorIdentification);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "completed".parse::<SubmissionStatus>().unwrap(),
            SubmissionStatus::Completed
        );
        assert!("finished".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_card_identity_json_shape() {
        let identity = CardIdentity::new("Pikachu", "025").with_deck_id_letter("D");
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["cardName"], "Pikachu");
        assert_eq!(json["cardNumber"], "025");
        assert_eq!(json["deckIdLetter"], "D");
        assert!(json.get("illustratorName").is_none());
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(CardIdentity::new("Charizard", "4").search_terms(), "Charizard 4");
        assert_eq!(
            CardIdentity::new("Pikachu", "025")
                .with_deck_id_letter("D")
                .search_terms(),
            "Pikachu 025D"
        );
    }

    #[test]
    fn test_estimate_not_found() {
        assert!(MarketplaceEstimate::new("eBay", "Not found", "https://x").is_not_found());
        assert!(MarketplaceEstimate::new("eBay", "N/A", "https://x").is_not_found());
        assert!(!MarketplaceEstimate::new("eBay", "$15.50", "https://x").is_not_found());
    }

    #[test]
    fn test_new_submission_defaults() {
        let now = Utc::now();
        let submission = Submission::new("id-1", "data:image/png;base64,AAAA", "abc", now);
        assert_eq!(submission.status, SubmissionStatus::ProcessingIdentification);
        assert!(submission.card_identity.is_none());
        assert!(submission.valuation.is_none());
        assert!(submission.error_message.is_none());
        assert_eq!(submission.created_at, submission.updated_at);
    }
}
