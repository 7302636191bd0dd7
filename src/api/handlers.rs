//! HTTP handlers for sessions, credentials, and the style catalog

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::payload::ImagePayload;
use crate::session::{LookStatus, Session};
use crate::AppState;

/// UI-facing view of one look.
#[derive(Debug, Serialize)]
pub struct LookView {
    pub id: String,
    pub name: String,
    pub status: LookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// UI-facing view of the active session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub looks: Vec<LookView>,
    pub terminal_count: usize,
    pub total: usize,
    pub done: bool,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            looks: session
                .looks
                .iter()
                .map(|look| LookView {
                    id: look.id.clone(),
                    name: look.display_name.clone(),
                    status: look.status,
                    image_url: look.result_image.as_ref().map(|i| i.to_data_url()),
                    error: look.failure_reason.clone(),
                })
                .collect(),
            terminal_count: session.terminal_count,
            total: session.looks.len(),
            done: session.is_done(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub image: CaptureImage,
}

/// Captured photo, either as a data URL (or bare base64) string or as an
/// explicit MIME type + base64 pair.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CaptureImage {
    Encoded(String),
    Parts { mime_type: String, data: String },
}

impl CaptureImage {
    fn into_payload(self) -> Result<ImagePayload> {
        match self {
            CaptureImage::Encoded(input) => ImagePayload::from_data_url(&input),
            CaptureImage::Parts { mime_type, data } => ImagePayload::from_base64(mime_type, data),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InstallCredentialRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialsView {
    pub elevated_quota: bool,
    pub selection_requested: bool,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_catalog(State(state): State<Arc<AppState>>) -> Json<Value> {
    let styles: Vec<Value> = state
        .controller
        .catalog()
        .iter()
        .map(|s| json!({ "key": s.key, "name": s.display_name }))
        .collect();
    Json(json!({ "styles": styles }))
}

/// Start a new capture session and spawn the generation drive for it.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionView>)> {
    let image = request.image.into_payload()?;

    let session = state.controller.start_session(image);
    info!(session_id = %session.id, looks = session.looks.len(), "Capture session started");

    let controller = state.controller.clone();
    let session_id = session.id;
    tokio::spawn(async move {
        controller.run_queue(session_id).await;
    });

    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

pub async fn get_session(State(state): State<Arc<AppState>>) -> Result<Json<SessionView>> {
    let session = state.store.snapshot().ok_or(AppError::NoActiveSession)?;
    Ok(Json(SessionView::from(&session)))
}

/// Discard the active session. A queue run still in flight detects the
/// swap at its next state write and stops.
pub async fn delete_session(State(state): State<Arc<AppState>>) -> StatusCode {
    state.store.clear();
    StatusCode::NO_CONTENT
}

/// Kick off an out-of-band retry for one look.
pub async fn retry_look(
    State(state): State<Arc<AppState>>,
    Path(look_id): Path<String>,
) -> Result<StatusCode> {
    let session = state.store.snapshot().ok_or(AppError::NoActiveSession)?;
    if session.look(&look_id).is_none() {
        return Err(AppError::LookNotFound(look_id));
    }

    let controller = state.controller.clone();
    let session_id = session.id;
    tokio::spawn(async move {
        controller.retry_look(session_id, &look_id).await;
    });

    Ok(StatusCode::ACCEPTED)
}

pub async fn get_credentials(State(state): State<Arc<AppState>>) -> Json<CredentialsView> {
    Json(CredentialsView {
        elevated_quota: state.credentials.has_elevated_quota(),
        selection_requested: state.credentials.selection_requested(),
    })
}

/// Install a user-supplied key, optimistically granting elevated quota.
pub async fn install_credential(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InstallCredentialRequest>,
) -> Result<Json<CredentialsView>> {
    if request.api_key.trim().is_empty() {
        return Err(AppError::InvalidRequest("API key cannot be empty".to_string()));
    }

    state.credentials.install_key(request.api_key);
    info!("User credential installed, elevated quota assumed");

    Ok(Json(CredentialsView {
        elevated_quota: state.credentials.has_elevated_quota(),
        selection_requested: state.credentials.selection_requested(),
    }))
}
