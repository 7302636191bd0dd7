//! Gemini REST backend for hairstyle generation

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::traits::GenerationBackend;
use crate::config::GenerationConfig;
use crate::credentials::CredentialState;
use crate::error::{AppError, Result};
use crate::payload::ImagePayload;

/// Image generation backend speaking the Gemini `generateContent` REST API.
pub struct GeminiBackend {
    config: GenerationConfig,
    credentials: Arc<CredentialState>,
}

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "generationConfig")]
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<RequestInlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
struct RequestInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct RequestGenerationConfig {
    #[serde(rename = "imageConfig")]
    image_config: RequestImageConfig,
}

#[derive(Debug, Serialize)]
struct RequestImageConfig {
    #[serde(rename = "aspectRatio")]
    aspect_ratio: &'static str,
}

/// Response body from `generateContent`
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default, rename = "inlineData", alias = "inline_data")]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
struct ResponseInlineData {
    #[serde(default, rename = "mimeType", alias = "mime_type")]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: GenerationConfig, credentials: Arc<CredentialState>) -> Self {
        Self { config, credentials }
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

/// Wrap a catalog style instruction in the fixed transformation template.
/// The template pins everything except the hair so the model cannot drift
/// on identity or skin tone.
fn transformation_prompt(instruction: &str) -> String {
    format!(
        "Professional high-end hair transformation. Hairstyle: {}. \
         Maintain the exact facial features, skin tone, and identity of the person. \
         Only modify the hair. Professional studio lighting.",
        instruction
    )
}

/// Map a non-2xx response to the error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> AppError {
    let envelope: Option<ErrorBody> = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);

    let api_status = envelope
        .as_ref()
        .and_then(|e| e.status.clone())
        .unwrap_or_default();
    let message = envelope
        .and_then(|e| e.message)
        .unwrap_or_else(|| format!("Backend returned {}", status));

    if status == StatusCode::TOO_MANY_REQUESTS
        || api_status == "RESOURCE_EXHAUSTED"
        || message.to_lowercase().contains("quota")
    {
        return AppError::QuotaExhausted(message);
    }

    if status == StatusCode::NOT_FOUND
        || api_status == "NOT_FOUND"
        || message.contains("Requested entity was not found")
    {
        return AppError::EntityNotFound(message);
    }

    AppError::Backend(message)
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, image: &ImagePayload, instruction: &str) -> Result<ImagePayload> {
        let api_key = self.credentials.api_key().ok_or(AppError::MissingCredential)?;

        // A fresh client per call so a credential installed between calls is
        // honored immediately; no connection or auth state is cached.
        let client = Client::builder()
            .timeout(Duration::from_millis(self.config.request_timeout_ms))
            .build()?;

        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![
                    RequestPart {
                        inline_data: Some(RequestInlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        }),
                        text: None,
                    },
                    RequestPart {
                        inline_data: None,
                        text: Some(transformation_prompt(instruction)),
                    },
                ],
            }],
            generation_config: RequestGenerationConfig {
                image_config: RequestImageConfig { aspect_ratio: "1:1" },
            },
        };

        debug!(model = %self.config.model, "Dispatching generation request");

        let response = client
            .post(self.endpoint_url())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: GenerateContentResponse = response.json().await?;

        // Scan every part of every candidate; the image is not necessarily
        // the first part (the model may lead with a text commentary part).
        for candidate in body.candidates {
            let Some(content) = candidate.content else {
                continue;
            };
            for part in content.parts {
                let Some(inline) = part.inline_data else {
                    continue;
                };
                if let Some(data) = inline.data.filter(|d| !d.is_empty()) {
                    let mime = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
                    return ImagePayload::from_base64(mime, data);
                }
            }
        }

        Err(AppError::EmptyResponse)
    }
}
