//! Validation of untyped collaborator replies.
//!
//! Model output is parsed as `serde_json::Value` and converted into
//! submission fields here. Anything that does not fit fails closed with
//! [`CapabilityError::SchemaMismatch`].

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::{Map, Value};

use super::traits::{CapabilityError, IdentificationOutcome};
use crate::submission::{CardIdentity, MarketplaceEstimate, NOT_FOUND_VALUE};

pub const EBAY: &str = "eBay";
pub const PRICE_CHARTING: &str = "PriceCharting";

/// Convert an identification reply into an outcome.
///
/// Blank optional fields are dropped. A missing or blank name or number
/// yields [`IdentificationOutcome::Incomplete`]; a field of the wrong type
/// is a schema mismatch.
pub fn parse_identification(value: &Value) -> Result<IdentificationOutcome, CapabilityError> {
    let object = value.as_object().ok_or_else(|| {
        CapabilityError::SchemaMismatch(format!(
            "identification must be a JSON object, got {}",
            kind(value)
        ))
    })?;

    let name = string_field(object, "cardName")?;
    let number = string_field(object, "cardNumber")?.map(|n| normalize_card_number(&n));
    let deck_id_letter = string_field(object, "deckIdLetter")?;
    let illustrator_name = string_field(object, "illustratorName")?.and_then(|i| {
        let i = strip_illustrator_prefix(&i);
        (!i.is_empty()).then(|| i.to_string())
    });

    Ok(match (name, number) {
        (Some(name), Some(number)) => IdentificationOutcome::Identified(CardIdentity {
            name,
            number,
            deck_id_letter,
            illustrator_name,
        }),
        (card_name, card_number) => IdentificationOutcome::Incomplete {
            card_name,
            card_number,
        },
    })
}

/// Convert a valuation reply into estimates.
///
/// `null` is passed through as `None`. An object wrapping a single array
/// (some models do this in JSON mode) is unwrapped.
pub fn parse_valuation(
    value: &Value,
    identity: &CardIdentity,
) -> Result<Option<Vec<MarketplaceEstimate>>, CapabilityError> {
    let items = match value {
        Value::Null => return Ok(None),
        Value::Array(items) => items,
        Value::Object(object) if object.len() == 1 => match object.values().next() {
            Some(Value::Array(items)) => items,
            _ => return Err(mismatch_top_level(value)),
        },
        _ => return Err(mismatch_top_level(value)),
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_estimate(index, item, identity))
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn mismatch_top_level(value: &Value) -> CapabilityError {
    CapabilityError::SchemaMismatch(format!(
        "valuation must be a JSON array, got {}",
        kind(value)
    ))
}

fn parse_estimate(
    index: usize,
    item: &Value,
    identity: &CardIdentity,
) -> Result<MarketplaceEstimate, CapabilityError> {
    let object = item.as_object().ok_or_else(|| {
        CapabilityError::SchemaMismatch(format!(
            "valuation entry {} must be an object, got {}",
            index,
            kind(item)
        ))
    })?;

    let marketplace = string_field(object, "marketplace")?.ok_or_else(|| {
        CapabilityError::SchemaMismatch(format!("valuation entry {} has no marketplace", index))
    })?;

    if !object.contains_key("estimatedValue") {
        return Err(CapabilityError::SchemaMismatch(format!(
            "valuation entry {} ({}) has no estimatedValue",
            index, marketplace
        )));
    }
    let estimated_value = match string_field(object, "estimatedValue")? {
        Some(v) if !v.eq_ignore_ascii_case("n/a") => v,
        _ => NOT_FOUND_VALUE.to_string(),
    };

    let search_url = match string_field(object, "searchUrl")? {
        Some(url) if is_http_url(&url) => url,
        _ => canonical_search_url(&marketplace, identity).ok_or_else(|| {
            CapabilityError::SchemaMismatch(format!(
                "valuation entry {} ({}) has no usable searchUrl",
                index, marketplace
            ))
        })?,
    };

    Ok(MarketplaceEstimate {
        marketplace,
        estimated_value,
        search_url,
    })
}

/// Read an optional string field, trimming it and dropping blanks.
fn string_field(object: &Map<String, Value>, key: &str) -> Result<Option<String>, CapabilityError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(other) => Err(CapabilityError::SchemaMismatch(format!(
            "field `{}` must be a string, got {}",
            key,
            kind(other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

static NUMBER_WITH_SET_TOTAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z]*\d+[A-Za-z]?)\s*/\s*[A-Za-z]*\d+$").unwrap());

/// Keep only the collector number before the slash: "025/165" -> "025",
/// "RC25/RC32" -> "RC25". Anything else is returned trimmed.
pub fn normalize_card_number(raw: &str) -> String {
    let trimmed = raw.trim();
    NUMBER_WITH_SET_TOTAL
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn strip_illustrator_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("illus.") => trimmed[6..].trim(),
        _ => trimmed,
    }
}

/// Search URL for a known marketplace, built from the card's search terms.
///
/// eBay links filter to completed, sold listings.
pub fn canonical_search_url(marketplace: &str, identity: &CardIdentity) -> Option<String> {
    let terms = urlencoding::encode(&identity.search_terms()).replace("%20", "+");
    let key: String = marketplace
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();

    match key.as_str() {
        "ebay" => Some(format!(
            "https://www.ebay.com/sch/i.html?_nkw={}&_sacat=0&LH_Complete=1&LH_Sold=1",
            terms
        )),
        "pricecharting" | "pricechartingcom" => Some(format!(
            "https://www.pricecharting.com/search-products?q={}&type=prices",
            terms
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pikachu() -> CardIdentity {
        CardIdentity::new("Pikachu", "025")
    }

    #[test]
    fn test_identification_full() {
        let outcome = parse_identification(&json!({
            "cardName": "Pikachu",
            "cardNumber": "025/165",
            "deckIdLetter": "D",
            "illustratorName": "Illus. Atsuko Nishida"
        }))
        .unwrap();

        assert_eq!(
            outcome,
            IdentificationOutcome::Identified(
                CardIdentity::new("Pikachu", "025")
                    .with_deck_id_letter("D")
                    .with_illustrator("Atsuko Nishida")
            )
        );
    }

    #[test]
    fn test_identification_blank_optionals_dropped() {
        let outcome = parse_identification(&json!({
            "cardName": " Charizard ex ",
            "cardNumber": "006",
            "deckIdLetter": "",
            "illustratorName": "   "
        }))
        .unwrap();

        let identity = outcome.into_identity().unwrap();
        assert_eq!(identity.name, "Charizard ex");
        assert!(identity.deck_id_letter.is_none());
        assert!(identity.illustrator_name.is_none());
    }

    #[test]
    fn test_identification_missing_number_is_incomplete() {
        let outcome = parse_identification(&json!({"cardName": "Pikachu", "cardNumber": ""})).unwrap();
        assert_eq!(
            outcome,
            IdentificationOutcome::Incomplete {
                card_name: Some("Pikachu".to_string()),
                card_number: None,
            }
        );
    }

    #[test]
    fn test_identification_wrong_types_fail_closed() {
        assert!(matches!(
            parse_identification(&json!({"cardName": "Pikachu", "cardNumber": 25})),
            Err(CapabilityError::SchemaMismatch(_))
        ));
        assert!(matches!(
            parse_identification(&json!(["Pikachu", "025"])),
            Err(CapabilityError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_valuation_scenario() {
        let estimates = parse_valuation(
            &json!([
                {"marketplace": "eBay", "estimatedValue": "$15.50", "searchUrl": "https://www.ebay.com/sch/i.html?_nkw=Pikachu+025"},
                {"marketplace": "PriceCharting", "estimatedValue": "Not found", "searchUrl": "https://www.pricecharting.com/search-products?q=Pikachu+025&type=prices"}
            ]),
            &pikachu(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(estimates.len(), 2);
        assert_eq!(estimates[0].estimated_value, "$15.50");
        assert!(estimates[1].is_not_found());
    }

    #[test]
    fn test_valuation_null_and_empty() {
        assert_eq!(parse_valuation(&Value::Null, &pikachu()).unwrap(), None);
        assert_eq!(parse_valuation(&json!([]), &pikachu()).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_valuation_wrapped_array() {
        let estimates = parse_valuation(
            &json!({"estimations": [{"marketplace": "eBay", "estimatedValue": "$3", "searchUrl": ""}]}),
            &pikachu(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(estimates.len(), 1);
    }

    #[test]
    fn test_valuation_blank_value_and_url_repaired() {
        let estimates = parse_valuation(
            &json!([
                {"marketplace": "eBay", "estimatedValue": "", "searchUrl": "ebay.com/search"},
                {"marketplace": "PriceCharting", "estimatedValue": "N/A"}
            ]),
            &pikachu(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(estimates[0].estimated_value, NOT_FOUND_VALUE);
        assert_eq!(
            estimates[0].search_url,
            "https://www.ebay.com/sch/i.html?_nkw=Pikachu+025&_sacat=0&LH_Complete=1&LH_Sold=1"
        );
        assert_eq!(estimates[1].estimated_value, NOT_FOUND_VALUE);
        assert_eq!(
            estimates[1].search_url,
            "https://www.pricecharting.com/search-products?q=Pikachu+025&type=prices"
        );
    }

    #[test]
    fn test_valuation_unknown_marketplace_without_url_fails() {
        let result = parse_valuation(
            &json!([{"marketplace": "TCGPlayer", "estimatedValue": "$4", "searchUrl": ""}]),
            &pikachu(),
        );
        assert!(matches!(result, Err(CapabilityError::SchemaMismatch(_))));
    }

    #[test]
    fn test_valuation_shape_errors() {
        let identity = pikachu();
        assert!(parse_valuation(&json!("cheap"), &identity).is_err());
        assert!(parse_valuation(&json!([42]), &identity).is_err());
        assert!(parse_valuation(&json!([{"estimatedValue": "$1"}]), &identity).is_err());
        assert!(parse_valuation(
            &json!([{"marketplace": "eBay", "searchUrl": "https://ebay.com"}]),
            &identity
        )
        .is_err());
        assert!(parse_valuation(
            &json!([{"marketplace": "eBay", "estimatedValue": 15.5}]),
            &identity
        )
        .is_err());
    }

    #[test]
    fn test_normalize_card_number() {
        assert_eq!(normalize_card_number("025/165"), "025");
        assert_eq!(normalize_card_number("RC25/RC32"), "RC25");
        assert_eq!(normalize_card_number(" 4 / 102 "), "4");
        assert_eq!(normalize_card_number("56D"), "56D");
        assert_eq!(normalize_card_number("SWSH050"), "SWSH050");
    }

    #[test]
    fn test_canonical_url_encodes_terms() {
        let identity = CardIdentity::new("Farfetch'd & Co", "083").with_deck_id_letter("D");
        let url = canonical_search_url("price charting", &identity).unwrap();
        assert_eq!(
            url,
            "https://www.pricecharting.com/search-products?q=Farfetch%27d+%26+Co+083D&type=prices"
        );
        assert!(canonical_search_url("Cardmarket", &identity).is_none());
    }
}
