//! Sequential generation queue controller
//!
//! Drives the style catalog through the generation backend one request at a
//! time. The serial loop with an adaptive inter-item delay IS the rate
//! limiter; nothing else throttles the batch.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::traits::GenerationBackend;
use crate::catalog::{look_id, StyleCatalogEntry};
use crate::config::QueueConfig;
use crate::credentials::CredentialState;
use crate::error::{AppError, Result};
use crate::payload::ImagePayload;
use crate::session::{Session, SessionStore};

/// Events the controller reports to its composition layer. The controller
/// never invokes a credential or UI flow itself; the caller wires these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    /// The active credential was rejected; the user must re-select a key.
    CredentialRequired,
}

pub struct QueueController {
    catalog: Vec<StyleCatalogEntry>,
    store: Arc<SessionStore>,
    backend: Arc<dyn GenerationBackend>,
    credentials: Arc<CredentialState>,
    config: QueueConfig,
    events: mpsc::UnboundedSender<QueueEvent>,
}

impl QueueController {
    pub fn new(
        catalog: Vec<StyleCatalogEntry>,
        store: Arc<SessionStore>,
        backend: Arc<dyn GenerationBackend>,
        credentials: Arc<CredentialState>,
        config: QueueConfig,
        events: mpsc::UnboundedSender<QueueEvent>,
    ) -> Self {
        Self {
            catalog,
            store,
            backend,
            credentials,
            config,
            events,
        }
    }

    pub fn catalog(&self) -> &[StyleCatalogEntry] {
        &self.catalog
    }

    /// Start a fresh session over the catalog, replacing any active one.
    /// The caller spawns [`run_queue`](Self::run_queue) with the returned id.
    pub fn start_session(&self, base_image: ImagePayload) -> Session {
        self.store.start(base_image, &self.catalog)
    }

    /// Drive every look of the session through the backend, strictly one at
    /// a time and in catalog order. A single look's failure never stops the
    /// batch. Returns early when the session has been replaced.
    pub async fn run_queue(&self, session_id: Uuid) {
        let Some(base_image) = self.store.base_image(session_id) else {
            return;
        };

        let total = self.catalog.len();
        for (idx, style) in self.catalog.iter().enumerate() {
            let id = look_id(idx);
            if !self.store.mark_in_flight(session_id, &id) {
                debug!(%session_id, "Queue run superseded, stopping");
                return;
            }

            debug!(look = %id, style = style.display_name, "Generating look");
            let outcome = self.backend.generate(&base_image, style.instruction).await;
            if !self.record_outcome(session_id, &id, outcome) {
                debug!(%session_id, "Queue run superseded, stopping");
                return;
            }
            self.store.bump_terminal(session_id);

            if idx + 1 < total {
                // Re-read the tier at every step so a mid-batch key upgrade
                // shortens the remaining waits.
                let delay = if self.credentials.has_elevated_quota() {
                    self.config.elevated_delay()
                } else {
                    self.config.standard_delay()
                };
                tokio::time::sleep(delay).await;
                if !self.store.is_current(session_id) {
                    return;
                }
            }
        }
    }

    /// Re-run one failed look outside the main drive. No controller-level
    /// pacing applies here; the backend's own quota cool-down is the only
    /// throttle. Sibling looks and the terminal count are untouched.
    ///
    /// Precondition: callers only retry looks the main drive has already
    /// settled, so the drive and a retry never target the same request.
    pub async fn retry_look(&self, session_id: Uuid, look: &str) {
        let Some(base_image) = self.store.base_image(session_id) else {
            return;
        };
        let Some(style) = self.style_for(look) else {
            return;
        };
        if !self.store.mark_in_flight(session_id, look) {
            return;
        }

        debug!(%look, style = style.display_name, "Retrying look");
        let outcome = self.backend.generate(&base_image, style.instruction).await;
        self.record_outcome(session_id, look, outcome);
    }

    /// Record a terminal outcome through the store's identity-guarded path.
    /// Shared by the main drive and the retry path so the auth side effect
    /// is identical in both. Returns false when the session was replaced and
    /// the write was discarded.
    fn record_outcome(&self, session_id: Uuid, look: &str, outcome: Result<ImagePayload>) -> bool {
        match outcome {
            Ok(image) => self.store.complete_look(session_id, look, image),
            Err(err) => {
                if err.is_entity_not_found() {
                    // The credential is gone; drop the tier optimism and
                    // hand the re-selection decision to the caller.
                    self.credentials.clear_elevated();
                    let _ = self.events.send(QueueEvent::CredentialRequired);
                }
                warn!(%look, error = %err, "Look generation failed");
                self.store.fail_look(session_id, look, failure_message(&err))
            }
        }
    }

    fn style_for(&self, look: &str) -> Option<&StyleCatalogEntry> {
        self.catalog
            .iter()
            .enumerate()
            .find(|(idx, _)| look_id(*idx) == look)
            .map(|(_, style)| style)
    }
}

/// One consistent user-facing message per taxonomy case.
fn failure_message(err: &AppError) -> String {
    if err.is_quota_signature() {
        "Quota limit exceeded.".to_string()
    } else if err.is_entity_not_found() {
        "Generation credential was not accepted.".to_string()
    } else if matches!(err, AppError::EmptyResponse) {
        "The model returned no image.".to_string()
    } else {
        "Generation failed.".to_string()
    }
}
