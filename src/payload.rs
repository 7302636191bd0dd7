//! Opaque encoded-image payload passed between capture, queue, and backend

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// An encoded still image: MIME type plus base64 data (no data-URL prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    /// Build a payload from already-encoded base64 data, validating it.
    pub fn from_base64(mime_type: impl Into<String>, data: impl Into<String>) -> Result<Self> {
        let data = data.into();
        let trimmed = data.trim();
        STANDARD
            .decode(trimmed)
            .map_err(|e| AppError::InvalidPayload(format!("Invalid base64 data: {}", e)))?;
        Ok(Self {
            mime_type: mime_type.into(),
            data: trimmed.to_string(),
        })
    }

    /// Encode raw bytes into a payload.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    /// Parse a `data:image/...;base64,...` URL. Bare base64 input is accepted
    /// too and assumed to be JPEG, matching what camera capture produces.
    pub fn from_data_url(input: &str) -> Result<Self> {
        if let Some(rest) = input.strip_prefix("data:") {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| AppError::InvalidPayload("Data URL missing ',' separator".to_string()))?;
            let mime = header
                .strip_suffix(";base64")
                .ok_or_else(|| AppError::InvalidPayload("Only base64 data URLs are supported".to_string()))?;
            if mime.is_empty() {
                return Err(AppError::InvalidPayload("Data URL missing MIME type".to_string()));
            }
            Self::from_base64(mime, data)
        } else {
            Self::from_base64("image/jpeg", input)
        }
    }

    /// Render as a data URL for UI consumption.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Decode to raw bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.data.trim())
            .map_err(|e| AppError::InvalidPayload(format!("Invalid base64 data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let payload = ImagePayload::from_bytes("image/png", b"Hello, World!");
        assert_eq!(payload.to_bytes().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_data_url_parse() {
        let payload = ImagePayload::from_data_url("data:image/png;base64,SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.to_bytes().unwrap(), b"Hello, World!");
    }

    #[test]
    fn test_bare_base64_assumes_jpeg() {
        let payload = ImagePayload::from_data_url("SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(payload.mime_type, "image/jpeg");
    }

    #[test]
    fn test_data_url_round_trip() {
        let payload = ImagePayload::from_bytes("image/jpeg", &[0xFF, 0xD8, 0xFF]);
        let url = payload.to_data_url();
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(ImagePayload::from_data_url(&url).unwrap(), payload);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(ImagePayload::from_data_url("data:image/png;base64").is_err());
        assert!(ImagePayload::from_data_url("data:;base64,SGVsbG8=").is_err());
        assert!(ImagePayload::from_base64("image/png", "not base64!!!").is_err());
    }
}
