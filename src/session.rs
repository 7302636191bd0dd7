//! Capture session model
//!
//! A session owns one generation request per catalog style. The store holds
//! the single active session and keys every mutation by the session id the
//! queue run was started under, so a drive that outlives a restart cannot
//! write into the replacement session.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{look_id, StyleCatalogEntry};
use crate::payload::ImagePayload;

/// Lifecycle state of one generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
}

/// One styled look being generated for the captured photo.
///
/// Invariant: `result_image` is set iff Completed, `failure_reason` iff
/// Failed; the transition methods below are the only writers.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub id: String,
    pub display_name: String,
    pub status: LookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_image: Option<ImagePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl GenerationRequest {
    fn new(id: String, display_name: String) -> Self {
        Self {
            id,
            display_name,
            status: LookStatus::Pending,
            result_image: None,
            failure_reason: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, LookStatus::Completed | LookStatus::Failed)
    }

    pub(crate) fn mark_in_flight(&mut self) {
        self.status = LookStatus::InFlight;
        self.result_image = None;
        self.failure_reason = None;
    }

    pub(crate) fn complete(&mut self, image: ImagePayload) {
        self.status = LookStatus::Completed;
        self.result_image = Some(image);
        self.failure_reason = None;
    }

    pub(crate) fn fail(&mut self, reason: String) {
        self.status = LookStatus::Failed;
        self.result_image = None;
        self.failure_reason = Some(reason);
    }
}

/// One capture session: the base photo plus its ordered look set.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub base_image: ImagePayload,
    pub looks: Vec<GenerationRequest>,
    /// Looks that reached a terminal state through the main drive
    pub terminal_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(base_image: ImagePayload, catalog: &[StyleCatalogEntry]) -> Self {
        let looks = catalog
            .iter()
            .enumerate()
            .map(|(idx, style)| GenerationRequest::new(look_id(idx), style.display_name.to_string()))
            .collect();

        Self {
            id: Uuid::new_v4(),
            base_image,
            looks,
            terminal_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn look(&self, id: &str) -> Option<&GenerationRequest> {
        self.looks.iter().find(|l| l.id == id)
    }

    /// Whether the original batch has fully settled. Out-of-band retries do
    /// not move this.
    pub fn is_done(&self) -> bool {
        self.terminal_count >= self.looks.len()
    }
}

/// Store for the single active session.
pub struct SessionStore {
    inner: RwLock<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Start a new session, discarding any previous one. Returns a snapshot
    /// of the freshly created session (all looks Pending).
    pub fn start(&self, base_image: ImagePayload, catalog: &[StyleCatalogEntry]) -> Session {
        let session = Session::new(base_image, catalog);
        let snapshot = session.clone();
        *self.inner.write() = Some(session);
        snapshot
    }

    /// Discard the active session, if any.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.inner.read().clone()
    }

    /// Whether `session_id` still identifies the active session.
    pub fn is_current(&self, session_id: Uuid) -> bool {
        self.inner.read().as_ref().map(|s| s.id) == Some(session_id)
    }

    /// Base image of the active session, if `session_id` is still current.
    pub fn base_image(&self, session_id: Uuid) -> Option<ImagePayload> {
        let guard = self.inner.read();
        guard
            .as_ref()
            .filter(|s| s.id == session_id)
            .map(|s| s.base_image.clone())
    }

    /// The single designated update path for look state. The closure only
    /// runs when the session is still current and the look exists; a stale
    /// write is discarded and reported as `false`.
    fn with_look(
        &self,
        session_id: Uuid,
        look_id: &str,
        f: impl FnOnce(&mut GenerationRequest),
    ) -> bool {
        let mut guard = self.inner.write();
        let Some(session) = guard.as_mut().filter(|s| s.id == session_id) else {
            return false;
        };
        let Some(look) = session.looks.iter_mut().find(|l| l.id == look_id) else {
            return false;
        };
        f(look);
        true
    }

    pub fn mark_in_flight(&self, session_id: Uuid, look_id: &str) -> bool {
        self.with_look(session_id, look_id, |look| look.mark_in_flight())
    }

    pub fn complete_look(&self, session_id: Uuid, look_id: &str, image: ImagePayload) -> bool {
        self.with_look(session_id, look_id, |look| look.complete(image))
    }

    pub fn fail_look(&self, session_id: Uuid, look_id: &str, reason: String) -> bool {
        self.with_look(session_id, look_id, |look| look.fail(reason))
    }

    /// Count one main-drive look reaching a terminal state.
    pub fn bump_terminal(&self, session_id: Uuid) -> bool {
        let mut guard = self.inner.write();
        let Some(session) = guard.as_mut().filter(|s| s.id == session_id) else {
            return false;
        };
        session.terminal_count += 1;
        true
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
