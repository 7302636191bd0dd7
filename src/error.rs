//! Common error types for the hairstyle studio service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("No generation credential configured")]
    MissingCredential,

    #[error("Quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Requested entity was not found: {0}")]
    EntityNotFound(String),

    #[error("Model response contained no image data")]
    EmptyResponse,

    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("Generation backend error: {0}")]
    Backend(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Unknown look: {0}")]
    LookNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this failure carries a quota-exhaustion signature.
    ///
    /// The remote endpoint reports quota pressure inconsistently (an explicit
    /// RESOURCE_EXHAUSTED status, a bare 429, or only a "quota" substring in
    /// the message), so all three spellings are treated as the same signal.
    pub fn is_quota_signature(&self) -> bool {
        match self {
            AppError::QuotaExhausted(_) => true,
            AppError::HttpClient(e) => e.status().map(|s| s.as_u16()) == Some(429),
            other => {
                let msg = other.to_string();
                msg.contains("429") || msg.to_lowercase().contains("quota")
            }
        }
    }

    /// Whether this failure indicates an invalid or missing credential.
    pub fn is_entity_not_found(&self) -> bool {
        match self {
            AppError::EntityNotFound(_) | AppError::MissingCredential => true,
            other => other.to_string().contains("Requested entity was not found"),
        }
    }
}

/// Error response format
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = match &self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_json")),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, "backend_error", None),
            AppError::MissingCredential => (StatusCode::UNAUTHORIZED, "authentication_error", Some("missing_credential")),
            AppError::QuotaExhausted(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limit_error", Some("quota_exhausted")),
            AppError::EntityNotFound(_) => (StatusCode::UNAUTHORIZED, "authentication_error", Some("entity_not_found")),
            AppError::EmptyResponse => (StatusCode::BAD_GATEWAY, "backend_error", Some("empty_response")),
            AppError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_payload")),
            AppError::Backend(_) => (StatusCode::BAD_GATEWAY, "backend_error", None),
            AppError::NoActiveSession => (StatusCode::NOT_FOUND, "not_found_error", Some("no_active_session")),
            AppError::LookNotFound(_) => (StatusCode::NOT_FOUND, "not_found_error", Some("look_not_found")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
