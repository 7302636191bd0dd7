//! Integration tests for the generation queue controller
//!
//! All tests run on a paused tokio clock: sleeps auto-advance, so the
//! 45 s / 5 s pacing and the 30 s quota cool-down are asserted exactly
//! without real waiting.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use hair_studio::backend::retry::{QuotaRetry, RetryPolicy};
use hair_studio::backend::traits::GenerationBackend;
use hair_studio::catalog::StyleCatalogEntry;
use hair_studio::config::QueueConfig;
use hair_studio::credentials::CredentialState;
use hair_studio::error::{AppError, Result};
use hair_studio::payload::ImagePayload;
use hair_studio::queue::{QueueController, QueueEvent};
use hair_studio::session::{LookStatus, SessionStore};

/// Scripted outcome for one backend call.
#[derive(Clone)]
enum Script {
    Ok,
    Quota,
    NotFound,
    Other,
    /// Signal `entered`, then hold the call until `release` fires.
    Hold(Arc<Notify>, Arc<Notify>),
}

struct ScriptedInner {
    script: parking_lot::Mutex<VecDeque<Script>>,
    /// (instruction, virtual call time) per call, in arrival order
    calls: parking_lot::Mutex<Vec<(String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Install a user key during call number N (0-based)
    elevate_on_call: parking_lot::Mutex<Option<(usize, Arc<CredentialState>)>>,
}

#[derive(Clone)]
struct ScriptedBackend(Arc<ScriptedInner>);

impl ScriptedBackend {
    fn new(script: Vec<Script>) -> Self {
        Self(Arc::new(ScriptedInner {
            script: parking_lot::Mutex::new(script.into()),
            calls: parking_lot::Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            elevate_on_call: parking_lot::Mutex::new(None),
        }))
    }

    fn elevate_on_call(&self, call: usize, credentials: Arc<CredentialState>) {
        *self.0.elevate_on_call.lock() = Some((call, credentials));
    }

    fn push(&self, script: Script) {
        self.0.script.lock().push_back(script);
    }

    fn call_count(&self) -> usize {
        self.0.calls.lock().len()
    }

    fn call_instructions(&self) -> Vec<String> {
        self.0.calls.lock().iter().map(|(i, _)| i.clone()).collect()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.0.calls.lock().iter().map(|(_, t)| *t).collect()
    }

    fn max_in_flight(&self) -> usize {
        self.0.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _image: &ImagePayload, instruction: &str) -> Result<ImagePayload> {
        let current = self.0.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let call_index = {
            let mut calls = self.0.calls.lock();
            calls.push((instruction.to_string(), Instant::now()));
            calls.len() - 1
        };

        if let Some((at, credentials)) = self.0.elevate_on_call.lock().clone() {
            if call_index == at {
                credentials.install_key("user-key".to_string());
            }
        }

        let script = self.0.script.lock().pop_front().unwrap_or(Script::Ok);
        let outcome = match script {
            Script::Ok => Ok(ImagePayload::from_bytes("image/png", instruction.as_bytes())),
            Script::Quota => Err(AppError::QuotaExhausted("rpm window".to_string())),
            Script::NotFound => Err(AppError::EntityNotFound(
                "Requested entity was not found.".to_string(),
            )),
            Script::Other => Err(AppError::Backend("connection reset".to_string())),
            Script::Hold(entered, release) => {
                entered.notify_one();
                release.notified().await;
                Ok(ImagePayload::from_bytes("image/png", instruction.as_bytes()))
            }
        };

        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

const STYLES: &[StyleCatalogEntry] = &[
    StyleCatalogEntry { key: "s0", display_name: "Style 0", instruction: "style-0" },
    StyleCatalogEntry { key: "s1", display_name: "Style 1", instruction: "style-1" },
    StyleCatalogEntry { key: "s2", display_name: "Style 2", instruction: "style-2" },
    StyleCatalogEntry { key: "s3", display_name: "Style 3", instruction: "style-3" },
    StyleCatalogEntry { key: "s4", display_name: "Style 4", instruction: "style-4" },
];

struct Harness {
    backend: ScriptedBackend,
    credentials: Arc<CredentialState>,
    store: Arc<SessionStore>,
    controller: Arc<QueueController>,
    events: mpsc::UnboundedReceiver<QueueEvent>,
}

/// Build a controller over the first `n` test styles. `retry` wraps the
/// scripted backend in the quota-retry layer with the stock 30 s cool-down.
fn harness(n: usize, elevated: bool, script: Vec<Script>, retry: bool) -> Harness {
    let backend = ScriptedBackend::new(script);
    let credentials = Arc::new(CredentialState::new(Some("env-key".to_string()), elevated));
    let store = Arc::new(SessionStore::new());
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let dyn_backend: Arc<dyn GenerationBackend> = if retry {
        Arc::new(QuotaRetry::new(backend.clone(), RetryPolicy::default()))
    } else {
        Arc::new(backend.clone())
    };

    let controller = Arc::new(QueueController::new(
        STYLES[..n].to_vec(),
        store.clone(),
        dyn_backend,
        credentials.clone(),
        QueueConfig::default(),
        events_tx,
    ));

    Harness {
        backend,
        credentials,
        store,
        controller,
        events: events_rx,
    }
}

fn base_image() -> ImagePayload {
    ImagePayload::from_bytes("image/jpeg", b"captured photo")
}

fn statuses(store: &SessionStore) -> Vec<LookStatus> {
    store
        .snapshot()
        .unwrap()
        .looks
        .iter()
        .map(|l| l.status)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn starting_a_session_creates_all_pending_requests() {
    let h = harness(5, false, vec![], false);
    let session = h.controller.start_session(base_image());

    assert_eq!(session.looks.len(), 5);
    assert!(session.looks.iter().all(|l| l.status == LookStatus::Pending));
    assert_eq!(session.terminal_count, 0);
}

#[tokio::test(start_paused = true)]
async fn all_success_batch_runs_in_order_with_standard_delays() {
    let h = harness(5, false, vec![], false);
    let session = h.controller.start_session(base_image());

    let started = Instant::now();
    h.controller.run_queue(session.id).await;

    // Strictly sequential, in catalog order
    assert_eq!(h.backend.max_in_flight(), 1);
    assert_eq!(
        h.backend.call_instructions(),
        vec!["style-0", "style-1", "style-2", "style-3", "style-4"]
    );

    // Four inter-item waits of 45 s, none after the last item
    let times = h.backend.call_times();
    for pair in times.windows(2) {
        assert_eq!(pair[1] - pair[0], Duration::from_secs(45));
    }
    assert_eq!(started.elapsed(), Duration::from_secs(4 * 45));

    let snapshot = h.store.snapshot().unwrap();
    assert!(snapshot.looks.iter().all(|l| l.status == LookStatus::Completed));
    assert_eq!(snapshot.terminal_count, 5);
    assert!(snapshot.is_done());
}

#[tokio::test(start_paused = true)]
async fn elevated_quota_uses_short_delays() {
    let h = harness(3, true, vec![], false);
    let session = h.controller.start_session(base_image());

    let started = Instant::now();
    h.controller.run_queue(session.id).await;

    assert_eq!(started.elapsed(), Duration::from_secs(2 * 5));
}

#[tokio::test(start_paused = true)]
async fn mid_batch_key_install_shortens_the_next_wait() {
    let h = harness(3, false, vec![], false);
    // The key lands while the second call is in flight
    h.backend.elevate_on_call(1, h.credentials.clone());
    let session = h.controller.start_session(base_image());

    h.controller.run_queue(session.id).await;

    let times = h.backend.call_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(45));
    assert_eq!(times[2] - times[1], Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn quota_failure_is_retried_then_marked_failed_without_stopping_the_batch() {
    // Item 3 hits the quota wall on all three attempts
    let script = vec![
        Script::Ok,
        Script::Ok,
        Script::Quota,
        Script::Quota,
        Script::Quota,
        Script::Ok,
        Script::Ok,
    ];
    let h = harness(5, false, script, true);
    let session = h.controller.start_session(base_image());

    let started = Instant::now();
    h.controller.run_queue(session.id).await;

    // 5 items + 2 internal retries for item 3
    assert_eq!(h.backend.call_count(), 7);

    let times = h.backend.call_times();
    // The two quota cool-downs sit between the three attempts for item 3
    assert_eq!(times[3] - times[2], Duration::from_secs(30));
    assert_eq!(times[4] - times[3], Duration::from_secs(30));
    // Total: four 45 s inter-item waits plus two 30 s cool-downs
    assert_eq!(started.elapsed(), Duration::from_secs(4 * 45 + 2 * 30));

    let snapshot = h.store.snapshot().unwrap();
    assert_eq!(
        statuses(&h.store),
        vec![
            LookStatus::Completed,
            LookStatus::Completed,
            LookStatus::Failed,
            LookStatus::Completed,
            LookStatus::Completed,
        ]
    );
    assert_eq!(
        snapshot.look("look-2").unwrap().failure_reason.as_deref(),
        Some("Quota limit exceeded.")
    );
    assert_eq!(snapshot.terminal_count, 5);
}

#[tokio::test(start_paused = true)]
async fn entity_not_found_clears_elevation_and_requests_credentials_once() {
    let script = vec![Script::Ok, Script::NotFound, Script::Ok, Script::Ok, Script::Ok];
    let mut h = harness(5, true, script, true);
    let session = h.controller.start_session(base_image());

    h.controller.run_queue(session.id).await;

    assert!(!h.credentials.has_elevated_quota());
    assert_eq!(h.events.try_recv(), Ok(QueueEvent::CredentialRequired));
    assert!(h.events.try_recv().is_err());

    let snapshot = h.store.snapshot().unwrap();
    assert_eq!(snapshot.look("look-1").unwrap().status, LookStatus::Failed);
    assert_eq!(
        snapshot.look("look-1").unwrap().failure_reason.as_deref(),
        Some("Generation credential was not accepted.")
    );
    assert_eq!(snapshot.terminal_count, 5);

    // Elevated before the failure, standard after it
    let times = h.backend.call_times();
    assert_eq!(times[1] - times[0], Duration::from_secs(5));
    assert_eq!(times[2] - times[1], Duration::from_secs(45));
    assert_eq!(times[3] - times[2], Duration::from_secs(45));
}

#[tokio::test(start_paused = true)]
async fn other_errors_fail_the_item_without_retry_or_events() {
    let script = vec![Script::Other, Script::Ok];
    let mut h = harness(2, false, script, true);
    let session = h.controller.start_session(base_image());

    h.controller.run_queue(session.id).await;

    // Not a quota signature, so no internal retry
    assert_eq!(h.backend.call_count(), 2);
    assert!(h.events.try_recv().is_err());

    let snapshot = h.store.snapshot().unwrap();
    assert_eq!(snapshot.look("look-0").unwrap().status, LookStatus::Failed);
    assert_eq!(
        snapshot.look("look-0").unwrap().failure_reason.as_deref(),
        Some("Generation failed.")
    );
    assert_eq!(snapshot.look("look-1").unwrap().status, LookStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn out_of_band_retry_repairs_one_look_without_touching_siblings() {
    let script = vec![Script::Ok, Script::Other, Script::Ok];
    let h = harness(3, false, script, true);
    let session = h.controller.start_session(base_image());
    h.controller.run_queue(session.id).await;

    let before = h.store.snapshot().unwrap();
    assert_eq!(before.look("look-1").unwrap().status, LookStatus::Failed);
    assert_eq!(before.terminal_count, 3);

    h.backend.push(Script::Ok);
    h.controller.retry_look(session.id, "look-1").await;

    let after = h.store.snapshot().unwrap();
    assert_eq!(after.look("look-1").unwrap().status, LookStatus::Completed);
    assert!(after.look("look-1").unwrap().failure_reason.is_none());

    // Siblings and the batch accounting are untouched
    for id in ["look-0", "look-2"] {
        let b = before.look(id).unwrap();
        let a = after.look(id).unwrap();
        assert_eq!(a.status, b.status);
        assert_eq!(a.result_image, b.result_image);
    }
    assert_eq!(after.terminal_count, 3);
}

#[tokio::test(start_paused = true)]
async fn retry_applies_the_same_credential_side_effect() {
    let script = vec![Script::Other, Script::Ok];
    let mut h = harness(2, true, script, true);
    let session = h.controller.start_session(base_image());
    h.controller.run_queue(session.id).await;
    assert!(h.events.try_recv().is_err());

    h.backend.push(Script::NotFound);
    h.controller.retry_look(session.id, "look-0").await;

    assert!(!h.credentials.has_elevated_quota());
    assert_eq!(h.events.try_recv(), Ok(QueueEvent::CredentialRequired));
    let snapshot = h.store.snapshot().unwrap();
    assert_eq!(
        snapshot.look("look-0").unwrap().failure_reason.as_deref(),
        Some("Generation credential was not accepted.")
    );
    // Out-of-band repair never moves the batch counter
    assert_eq!(snapshot.terminal_count, 2);
}

#[tokio::test(start_paused = true)]
async fn retry_is_a_noop_for_unknown_looks_or_discarded_sessions() {
    let h = harness(2, false, vec![], false);
    let session = h.controller.start_session(base_image());
    h.controller.run_queue(session.id).await;

    let calls = h.backend.call_count();
    h.controller.retry_look(session.id, "look-9").await;
    assert_eq!(h.backend.call_count(), calls);

    h.store.clear();
    h.controller.retry_look(session.id, "look-0").await;
    assert_eq!(h.backend.call_count(), calls);
}

#[tokio::test(start_paused = true)]
async fn restart_discards_writes_from_the_stale_run() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let script = vec![Script::Hold(entered.clone(), release.clone())];
    let h = harness(2, false, script, false);

    let old = h.controller.start_session(base_image());
    let controller = h.controller.clone();
    let old_id = old.id;
    let drive = tokio::spawn(async move { controller.run_queue(old_id).await });

    // Wait for the stale run to be mid-call, then replace the session
    entered.notified().await;
    let new = h.controller.start_session(base_image());
    release.notify_one();
    drive.await.unwrap();

    // Only the first call happened; the stale run stopped instead of
    // proceeding to the second item
    assert_eq!(h.backend.call_count(), 1);

    let snapshot = h.store.snapshot().unwrap();
    assert_eq!(snapshot.id, new.id);
    assert!(snapshot.looks.iter().all(|l| l.status == LookStatus::Pending));
    assert_eq!(snapshot.terminal_count, 0);
}
