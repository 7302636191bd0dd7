//! Hairstyle Studio Service
//!
//! Takes one captured user photo and produces AI-generated hairstyle
//! variants by driving a generative image endpoint through a strictly
//! sequential, quota-aware generation queue, exposing incremental per-look
//! progress to a polling UI.

pub mod api;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod error;
pub mod payload;
pub mod queue;
pub mod session;

pub use error::{AppError, Result};

use std::sync::Arc;
use tokio::sync::mpsc;

use backend::traits::GenerationBackend;
use catalog::StyleCatalogEntry;
use credentials::CredentialState;
use queue::{QueueController, QueueEvent};
use session::SessionStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub credentials: Arc<CredentialState>,
    pub store: Arc<SessionStore>,
    pub controller: Arc<QueueController>,
}

impl AppState {
    /// Assemble the application: session store, queue controller, and the
    /// listener translating controller events into credential-flow state.
    /// Must run inside a tokio runtime.
    pub fn new(
        settings: config::Settings,
        credentials: Arc<CredentialState>,
        backend: Arc<dyn GenerationBackend>,
        catalog: Vec<StyleCatalogEntry>,
    ) -> Arc<Self> {
        let store = Arc::new(SessionStore::new());
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let controller = Arc::new(QueueController::new(
            catalog,
            store.clone(),
            backend,
            credentials.clone(),
            settings.queue.clone(),
            events_tx,
        ));

        // The controller only reports that a credential is needed; the
        // composition layer decides what that means for the user flow.
        let creds = credentials.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    QueueEvent::CredentialRequired => creds.request_selection(),
                }
            }
        });

        Arc::new(Self {
            settings: Arc::new(settings),
            credentials,
            store,
            controller,
        })
    }
}
