//! Validation of incoming card images.
//!
//! Images arrive as `data:<mime>;base64,<payload>` URIs. Validation happens
//! before a submission exists, so a rejected image never produces a row.

use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::SubmissionsConfig;

/// Errors raised while validating an image payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("Image data is empty")]
    Empty,

    #[error("Invalid imageDataUri format: expected data:image/<type>;base64,<data>")]
    NotDataUri,

    #[error("Unsupported image type: {0}")]
    UnsupportedMimeType(String),

    #[error("Image data is too large ({size} bytes, max {max} bytes)")]
    TooLarge { size: usize, max: usize },

    #[error("Image payload is not valid base64: {0}")]
    InvalidBase64(String),
}

/// A validated image, ready to be handed to the identification capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    data_uri: String,
    mime_type: String,
    digest: String,
}

impl ImageReference {
    /// The full data URI as submitted.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    /// MIME type, lowercased (e.g. "image/jpeg").
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Hex SHA-256 of the data URI.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The base64 payload after the comma.
    pub fn base64_payload(&self) -> &str {
        self.data_uri
            .split_once(',')
            .map(|(_, payload)| payload)
            .unwrap_or_default()
    }
}

/// Validates raw image data URIs against size and type limits.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    max_bytes: usize,
    accepted_mime_types: Vec<String>,
}

impl ImageValidator {
    pub fn new(max_bytes: usize, accepted_mime_types: Vec<String>) -> Self {
        Self {
            max_bytes,
            accepted_mime_types: accepted_mime_types
                .into_iter()
                .map(|m| m.to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &SubmissionsConfig) -> Self {
        Self::new(config.max_image_bytes, config.accepted_mime_types.clone())
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate a data URI and produce an [`ImageReference`].
    pub fn validate(&self, raw: &str) -> Result<ImageReference, ImageError> {
        if raw.trim().is_empty() {
            return Err(ImageError::Empty);
        }

        let (mime_type, payload) = split_data_uri(raw)?;
        let mime_type = mime_type.to_ascii_lowercase();

        if !self.accepted_mime_types.iter().any(|m| *m == mime_type) {
            return Err(ImageError::UnsupportedMimeType(mime_type));
        }

        if raw.len() > self.max_bytes {
            return Err(ImageError::TooLarge {
                size: raw.len(),
                max: self.max_bytes,
            });
        }

        if payload.is_empty() {
            return Err(ImageError::Empty);
        }

        base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| ImageError::InvalidBase64(e.to_string()))?;

        Ok(ImageReference {
            data_uri: raw.to_string(),
            mime_type,
            digest: digest_hex(raw),
        })
    }
}

/// Split `data:<mime>;base64,<payload>` into its MIME type and payload.
fn split_data_uri(raw: &str) -> Result<(&str, &str), ImageError> {
    let rest = raw.strip_prefix("data:").ok_or(ImageError::NotDataUri)?;
    let (header, payload) = rest.split_once(',').ok_or(ImageError::NotDataUri)?;
    let mime_type = header
        .strip_suffix(";base64")
        .ok_or(ImageError::NotDataUri)?;

    if !mime_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ImageError::NotDataUri);
    }

    Ok((mime_type, payload))
}

fn digest_hex(data: &str) -> String {
    format!("{:x}", Sha256::digest(data.as_bytes()))
}
