use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use actionlens_contracts::events::{EventKind, EventPayload, EventWriter};
use actionlens_contracts::predictions::PredictionList;
use actionlens_contracts::upload::UploadFile;
use actionlens_contracts::validation::{validate, ValidationError};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::Predictor;
use crate::preview::{derive_preview, PreviewHandle};

const WORKER_THREAD_NAME: &str = "actionlens-predict";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    Previewing,
    Requesting,
    Succeeded,
    Failed,
}

impl WorkflowPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Previewing => "previewing",
            Self::Requesting => "requesting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Everything the front end renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowState {
    pub file: Option<Arc<UploadFile>>,
    pub preview: Option<Arc<PreviewHandle>>,
    pub predictions: PredictionList,
    pub loading: bool,
    pub error_message: Option<String>,
    /// Validation failure of an upload made while a request was loading.
    /// Kept apart from `error_message` so the outstanding request still
    /// owns that slot; cleared by the next valid upload or `clear`.
    pub upload_error: Option<String>,
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        if self.loading {
            if self.preview.is_none() {
                WorkflowPhase::Previewing
            } else {
                WorkflowPhase::Requesting
            }
        } else if self.error_message.is_some() {
            WorkflowPhase::Failed
        } else if !self.predictions.is_empty() {
            WorkflowPhase::Succeeded
        } else {
            WorkflowPhase::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The request starts right away.
    Started { generation: u64 },
    /// An earlier request is still outstanding; this one runs after it.
    Queued { generation: u64 },
    Rejected(ValidationError),
    WorkerUnavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReanalyzeOutcome {
    Started { generation: u64 },
    Queued { generation: u64 },
    NoFile,
    Busy,
    WorkerUnavailable(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkflowStats {
    pub uploads: u64,
    pub rejected_uploads: u64,
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub stale_responses: u64,
}

struct Job {
    generation: u64,
    file: Arc<UploadFile>,
    derive_preview: bool,
}

enum Dispatch {
    Started,
    Queued,
    SpawnFailed(String),
}

struct Shared {
    state: WorkflowState,
    generation: u64,
    worker_active: bool,
    queued: Option<Job>,
    stats: WorkflowStats,
    subscribers: Vec<mpsc::Sender<WorkflowState>>,
}

struct ControllerInner {
    predictor: Arc<dyn Predictor>,
    events: Option<EventWriter>,
    shared: Mutex<Shared>,
    settled: Condvar,
}

/// Owns the upload/preview/request lifecycle.
///
/// One background worker runs preview derivation and the prediction request
/// for a job, so at most one request is in flight. Each job carries the
/// generation it was issued under; `select_file` and `clear` bump the
/// generation and any result that comes back under an older one is dropped.
#[derive(Clone)]
pub struct WorkflowController {
    inner: Arc<ControllerInner>,
}

impl WorkflowController {
    pub fn new(predictor: Arc<dyn Predictor>, events: Option<EventWriter>) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                predictor,
                events,
                shared: Mutex::new(Shared {
                    state: WorkflowState::default(),
                    generation: 0,
                    worker_active: false,
                    queued: None,
                    stats: WorkflowStats::default(),
                    subscribers: Vec::new(),
                }),
                settled: Condvar::new(),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        self.inner.predictor.endpoint()
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.inner.lock().state.clone()
    }

    pub fn stats(&self) -> WorkflowStats {
        self.inner.lock().stats
    }

    /// Receives the current state immediately, then every later change in
    /// order. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> mpsc::Receiver<WorkflowState> {
        let (tx, rx) = mpsc::channel();
        let mut shared = self.inner.lock();
        if tx.send(shared.state.clone()).is_ok() {
            shared.subscribers.push(tx);
        }
        rx
    }

    pub fn select_file(&self, file: Option<UploadFile>) -> SelectOutcome {
        let checked = validate(file.as_ref()).and_then(|()| file.ok_or(ValidationError::Missing));
        let file = match checked {
            Ok(file) => Arc::new(file),
            Err(err) => return self.reject(err),
        };

        let mut shared = self.inner.lock();
        shared.generation += 1;
        shared.stats.uploads += 1;
        let generation = shared.generation;
        shared.state.file = Some(Arc::clone(&file));
        shared.state.preview = None;
        shared.state.error_message = None;
        shared.state.upload_error = None;
        shared.state.loading = true;
        let dispatch = self.inner.dispatch(
            &mut shared,
            Job {
                generation,
                file: Arc::clone(&file),
                derive_preview: true,
            },
        );
        self.inner.publish(&mut shared);
        drop(shared);

        info!(file = %file.name, size = file.size(), generation, "upload selected");
        self.inner.record(
            EventKind::UploadSelected,
            json!({
                "generation": generation,
                "file_name": file.name,
                "media_type": file.media_type,
                "size": file.size(),
                "queued": matches!(dispatch, Dispatch::Queued),
            }),
        );

        match dispatch {
            Dispatch::Started => SelectOutcome::Started { generation },
            Dispatch::Queued => SelectOutcome::Queued { generation },
            Dispatch::SpawnFailed(message) => SelectOutcome::WorkerUnavailable(message),
        }
    }

    /// Runs the stored file through the predictor again, keeping its preview.
    pub fn reanalyze(&self) -> ReanalyzeOutcome {
        let mut shared = self.inner.lock();
        let Some(file) = shared.state.file.clone() else {
            return ReanalyzeOutcome::NoFile;
        };
        if shared.state.loading {
            return ReanalyzeOutcome::Busy;
        }

        shared.generation += 1;
        let generation = shared.generation;
        shared.state.loading = true;
        shared.state.error_message = None;
        let dispatch = self.inner.dispatch(
            &mut shared,
            Job {
                generation,
                file,
                derive_preview: false,
            },
        );
        self.inner.publish(&mut shared);
        drop(shared);

        debug!(generation, "re-analysis requested");
        match dispatch {
            Dispatch::Started => ReanalyzeOutcome::Started { generation },
            Dispatch::Queued => ReanalyzeOutcome::Queued { generation },
            Dispatch::SpawnFailed(message) => ReanalyzeOutcome::WorkerUnavailable(message),
        }
    }

    pub fn clear(&self) {
        let mut shared = self.inner.lock();
        shared.generation += 1;
        let generation = shared.generation;
        shared.state = WorkflowState::default();
        shared.queued = None;
        self.inner.publish(&mut shared);
        drop(shared);

        debug!(generation, "workflow cleared");
        self.inner
            .record(EventKind::WorkflowCleared, json!({ "generation": generation }));
    }

    /// Blocks until no request is outstanding or the timeout passes.
    /// Returns the settled state, or `None` on timeout.
    pub fn wait_until_settled(&self, timeout: Duration) -> Option<WorkflowState> {
        let deadline = Instant::now() + timeout;
        let mut shared = self.inner.lock();
        while shared.worker_active || shared.state.loading {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .inner
                .settled
                .wait_timeout(shared, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            shared = guard;
        }
        Some(shared.state.clone())
    }

    fn reject(&self, err: ValidationError) -> SelectOutcome {
        let mut shared = self.inner.lock();
        shared.stats.rejected_uploads += 1;
        if shared.state.loading {
            shared.state.upload_error = Some(err.to_string());
        } else {
            shared.state.error_message = Some(err.to_string());
        }
        self.inner.publish(&mut shared);
        drop(shared);

        info!(reason = err.kind(), "upload rejected");
        self.inner.record(
            EventKind::UploadRejected,
            json!({ "reason": err.kind(), "message": err.to_string() }),
        );
        SelectOutcome::Rejected(err)
    }
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, shared: &mut Shared) {
        let snapshot = shared.state.clone();
        shared
            .subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
        self.settled.notify_all();
    }

    fn record(&self, kind: EventKind, payload: Value) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let payload: EventPayload = match payload {
            Value::Object(map) => map,
            _ => EventPayload::new(),
        };
        if let Err(err) = events.emit(kind, payload) {
            warn!(event = kind.as_str(), error = %err, "failed to write session event");
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    fn dispatch(self: &Arc<Self>, shared: &mut Shared, job: Job) -> Dispatch {
        if shared.worker_active {
            shared.queued = Some(job);
            return Dispatch::Queued;
        }

        shared.worker_active = true;
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || inner.run_worker(job));
        match spawned {
            Ok(_) => Dispatch::Started,
            Err(err) => {
                let message = format!("Prediction worker failed to start: {err}");
                warn!(error = %err, "prediction worker spawn failed");
                shared.worker_active = false;
                shared.state.loading = false;
                shared.state.error_message = Some(message.clone());
                Dispatch::SpawnFailed(message)
            }
        }
    }

    fn run_worker(self: Arc<Self>, first: Job) {
        let mut job = first;
        loop {
            self.run_job(&job);
            let mut shared = self.lock();
            match shared.queued.take() {
                Some(next) => job = next,
                None => {
                    shared.worker_active = false;
                    self.settled.notify_all();
                    return;
                }
            }
        }
    }

    fn run_job(&self, job: &Job) {
        if job.derive_preview {
            let preview = Arc::new(derive_preview(&job.file));
            let mut shared = self.lock();
            if shared.generation != job.generation {
                drop(shared);
                debug!(generation = job.generation, "preview superseded before request");
                return;
            }
            shared.state.preview = Some(Arc::clone(&preview));
            self.publish(&mut shared);
            drop(shared);
            self.record(
                EventKind::PreviewReady,
                json!({
                    "generation": job.generation,
                    "fingerprint": preview.fingerprint,
                    "dimensions": preview.dimensions.map(|(width, height)| json!([width, height])),
                }),
            );
        } else if !self.is_current(job.generation) {
            debug!(generation = job.generation, "re-analysis superseded before request");
            return;
        }

        self.lock().stats.requests += 1;
        self.record(
            EventKind::PredictionRequested,
            json!({
                "generation": job.generation,
                "endpoint": self.predictor.endpoint(),
                "file_name": job.file.name,
            }),
        );
        let started = Instant::now();
        let outcome = self.predictor.predict(&job.file);
        let latency_ms = started.elapsed().as_millis() as u64;

        let mut shared = self.lock();
        if shared.generation != job.generation {
            shared.stats.stale_responses += 1;
            drop(shared);
            debug!(generation = job.generation, "discarding stale prediction response");
            self.record(
                EventKind::StaleResponseDiscarded,
                json!({ "generation": job.generation, "latency_ms": latency_ms }),
            );
            return;
        }

        shared.state.loading = false;
        match outcome {
            Ok(response) => {
                shared.stats.successes += 1;
                if !response.predictions.contract_violations().is_empty() {
                    warn!(
                        violations = ?response.predictions.contract_violations(),
                        "prediction list departs from ranking contract"
                    );
                }
                shared.state.predictions = response.predictions.clone();
                shared.state.error_message = None;
                self.publish(&mut shared);
                drop(shared);

                self.record(
                    EventKind::PredictionSucceeded,
                    json!({
                        "generation": job.generation,
                        "latency_ms": latency_ms,
                        "count": response.predictions.len(),
                        "filename": response.filename,
                        "top_prediction": response.top_prediction,
                        "predictions": response.predictions,
                    }),
                );
            }
            Err(err) => {
                shared.stats.failures += 1;
                shared.state.error_message = Some(err.user_message());
                self.publish(&mut shared);
                drop(shared);

                warn!(kind = err.kind(), error = %err, "prediction failed");
                self.record(
                    EventKind::PredictionFailed,
                    json!({
                        "generation": job.generation,
                        "latency_ms": latency_ms,
                        "kind": err.kind(),
                        "message": err.user_message(),
                        "detail": err.to_string(),
                    }),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;

    use actionlens_contracts::events::EventWriter;
    use actionlens_contracts::predictions::{PredictResponse, PredictionItem, PredictionList};
    use actionlens_contracts::upload::UploadFile;
    use actionlens_contracts::validation::{ValidationError, MAX_UPLOAD_BYTES};
    use mockito::Server;
    use serde_json::Value;

    use super::{ReanalyzeOutcome, SelectOutcome, WorkflowController, WorkflowPhase, WorkflowState};
    use crate::client::{HttpPredictionClient, Predictor};
    use crate::config::ClientConfig;
    use crate::error::PredictError;

    const WAIT: Duration = Duration::from_secs(5);

    type Reply = Result<PredictResponse, PredictError>;

    /// Predictor whose responses are fed by the test, one per request.
    struct GatedPredictor {
        started: Mutex<mpsc::Sender<String>>,
        replies: Mutex<mpsc::Receiver<Reply>>,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Predictor for GatedPredictor {
        fn endpoint(&self) -> &str {
            "http://localhost:8000"
        }

        fn predict(&self, file: &UploadFile) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Ok(started) = self.started.lock() {
                let _ = started.send(file.name.clone());
            }
            let reply = self
                .replies
                .lock()
                .ok()
                .and_then(|replies| replies.recv_timeout(WAIT).ok())
                .unwrap_or(Err(PredictError::Connectivity {
                    endpoint: "http://localhost:8000".to_string(),
                    reason: "test harness hung up".to_string(),
                }));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            reply
        }
    }

    struct Harness {
        controller: WorkflowController,
        predictor: Arc<GatedPredictor>,
        started: mpsc::Receiver<String>,
        replies: mpsc::Sender<Reply>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_events(None)
        }

        fn with_events(events: Option<EventWriter>) -> Self {
            let (started_tx, started_rx) = mpsc::channel();
            let (reply_tx, reply_rx) = mpsc::channel();
            let predictor = Arc::new(GatedPredictor {
                started: Mutex::new(started_tx),
                replies: Mutex::new(reply_rx),
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            });
            let controller = WorkflowController::new(predictor.clone(), events);
            Self {
                controller,
                predictor,
                started: started_rx,
                replies: reply_tx,
            }
        }

        fn next_request(&self) -> String {
            self.started.recv_timeout(WAIT).expect("request was not issued")
        }

        fn reply(&self, reply: Reply) {
            self.replies.send(reply).expect("predictor gone");
        }

        fn settle(&self) -> WorkflowState {
            self.controller
                .wait_until_settled(WAIT)
                .expect("workflow did not settle")
        }

        fn calls(&self) -> usize {
            self.predictor.calls.load(Ordering::SeqCst)
        }
    }

    fn image(name: &str) -> UploadFile {
        UploadFile::new(name, "image/jpeg", b"jpeg-ish bytes".to_vec())
    }

    fn success(rows: &[(u32, &str, f64)]) -> Reply {
        Ok(PredictResponse {
            success: true,
            predictions: list(rows),
            filename: None,
            top_prediction: None,
        })
    }

    fn list(rows: &[(u32, &str, f64)]) -> PredictionList {
        PredictionList::new(
            rows.iter()
                .map(|(rank, action, confidence)| PredictionItem {
                    rank: *rank,
                    action: action.to_string(),
                    confidence: *confidence,
                })
                .collect(),
        )
    }

    #[test]
    fn valid_upload_previews_then_stores_predictions_in_order() {
        let harness = Harness::new();
        let outcome = harness.controller.select_file(Some(image("bike.jpg")));
        assert_eq!(outcome, SelectOutcome::Started { generation: 1 });
        assert_eq!(harness.next_request(), "bike.jpg");

        let loading = harness.controller.snapshot();
        assert!(loading.loading);
        assert!(loading.preview.is_some(), "preview settles before the request");
        assert_eq!(loading.phase(), WorkflowPhase::Requesting);

        harness.reply(success(&[(1, "Biking", 72.3), (2, "HorseRiding", 15.1)]));
        let state = harness.settle();
        assert!(!state.loading);
        assert_eq!(state.error_message, None);
        assert_eq!(
            state.predictions,
            list(&[(1, "Biking", 72.3), (2, "HorseRiding", 15.1)])
        );
        assert_eq!(state.phase(), WorkflowPhase::Succeeded);
        assert_eq!(harness.calls(), 1);
    }

    #[test]
    fn rejected_upload_never_reaches_the_network() {
        let harness = Harness::new();
        let outcome = harness
            .controller
            .select_file(Some(UploadFile::new("notes.txt", "text/plain", vec![1])));
        assert!(matches!(
            outcome,
            SelectOutcome::Rejected(ValidationError::UnsupportedType { .. })
        ));

        let state = harness.settle();
        assert_eq!(
            state.error_message.as_deref(),
            Some("Please upload a valid image file (JPG, PNG, JFIF, AVIF)")
        );
        assert!(state.file.is_none());
        assert_eq!(state.phase(), WorkflowPhase::Failed);
        assert_eq!(harness.calls(), 0);
        assert_eq!(harness.controller.stats().rejected_uploads, 1);
    }

    #[test]
    fn missing_and_oversized_uploads_are_rejected() {
        let harness = Harness::new();
        assert_eq!(
            harness.controller.select_file(None),
            SelectOutcome::Rejected(ValidationError::Missing)
        );
        let huge = UploadFile::new(
            "huge.png",
            "image/png",
            vec![0; MAX_UPLOAD_BYTES as usize + 1],
        );
        assert!(matches!(
            harness.controller.select_file(Some(huge)),
            SelectOutcome::Rejected(ValidationError::TooLarge { .. })
        ));
        assert_eq!(
            harness.controller.snapshot().error_message.as_deref(),
            Some("Image must be under 10MB")
        );
        assert_eq!(harness.calls(), 0);
    }

    #[test]
    fn rejected_upload_keeps_previous_file_and_results() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        let before = harness.settle();

        harness
            .controller
            .select_file(Some(UploadFile::new("clip.gif", "video/mp4", vec![1])));
        let after = harness.controller.snapshot();
        assert_eq!(after.file, before.file);
        assert_eq!(after.preview, before.preview);
        assert_eq!(after.predictions, before.predictions);
        assert!(after.error_message.is_some());

        // A fresh valid upload clears the validation error.
        harness.controller.select_file(Some(image("ride.jpg")));
        assert_eq!(harness.controller.snapshot().error_message, None);
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 80.0)]));
        harness.settle();
    }

    #[test]
    fn invalid_upload_while_loading_leaves_request_state_alone() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();

        let updates = harness.controller.subscribe();
        let outcome = harness.controller.select_file(None);
        assert_eq!(outcome, SelectOutcome::Rejected(ValidationError::Missing));
        let state = harness.controller.snapshot();
        assert!(state.loading);
        assert_eq!(state.error_message, None);
        assert_eq!(state.upload_error.as_deref(), Some("No file selected"));
        assert_eq!(state.phase(), WorkflowPhase::Requesting);

        // Observers see the rejection without polling.
        let seen = updates
            .try_iter()
            .any(|state| state.upload_error.as_deref() == Some("No file selected"));
        assert!(seen);

        harness.reply(success(&[(1, "Biking", 72.3)]));
        let settled = harness.settle();
        assert_eq!(settled.error_message, None);
        assert_eq!(settled.upload_error.as_deref(), Some("No file selected"));
        assert_eq!(settled.predictions, list(&[(1, "Biking", 72.3)]));

        harness.controller.select_file(Some(image("ride.jpg")));
        assert_eq!(harness.controller.snapshot().upload_error, None);
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 80.0)]));
        harness.settle();

        harness.controller.select_file(Some(image("again.jpg")));
        harness.next_request();
        harness.controller.select_file(None);
        harness.controller.clear();
        assert_eq!(harness.controller.snapshot(), WorkflowState::default());
        harness.reply(success(&[(1, "Biking", 80.0)]));
        harness.settle();
    }

    #[test]
    fn reanalyze_is_ignored_without_file_or_while_loading() {
        let harness = Harness::new();
        assert_eq!(harness.controller.reanalyze(), ReanalyzeOutcome::NoFile);

        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        assert_eq!(harness.controller.reanalyze(), ReanalyzeOutcome::Busy);
        assert_eq!(harness.calls(), 1);

        harness.reply(success(&[(1, "Biking", 72.3)]));
        harness.settle();
        assert_eq!(harness.calls(), 1);
    }

    #[test]
    fn reanalyze_reuses_file_and_preview() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        let first = harness.settle();
        let preview = first.preview.clone().expect("preview derived");

        assert!(matches!(
            harness.controller.reanalyze(),
            ReanalyzeOutcome::Started { .. }
        ));
        assert_eq!(harness.next_request(), "bike.jpg");
        let requesting = harness.controller.snapshot();
        assert_eq!(requesting.phase(), WorkflowPhase::Requesting);
        assert!(Arc::ptr_eq(
            requesting.preview.as_ref().expect("preview kept"),
            &preview
        ));

        harness.reply(success(&[(1, "HorseRiding", 55.0)]));
        let second = harness.settle();
        assert_eq!(second.predictions, list(&[(1, "HorseRiding", 55.0)]));
        assert_eq!(harness.calls(), 2);
    }

    #[test]
    fn failed_reanalysis_keeps_previous_predictions() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 72.3), (2, "Skiing", 10.0)]));
        let before = harness.settle();

        harness.controller.reanalyze();
        harness.next_request();
        harness.reply(Err(PredictError::Connectivity {
            endpoint: "http://localhost:8000".to_string(),
            reason: "connection refused".to_string(),
        }));
        let after = harness.settle();

        assert!(!after.loading);
        assert_eq!(after.predictions, before.predictions);
        let message = after.error_message.clone().expect("error surfaced");
        assert!(message.contains("http://localhost:8000"), "{message}");
        assert!(message.starts_with("Cannot connect to the prediction server"));
        assert_eq!(after.phase(), WorkflowPhase::Failed);
    }

    #[test]
    fn service_detail_becomes_error_message_verbatim() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(Err(PredictError::Service {
            status: 400,
            detail: "unsupported image".to_string(),
        }));
        let state = harness.settle();
        assert_eq!(state.error_message.as_deref(), Some("unsupported image"));
    }

    #[test]
    fn clear_resets_everything_from_any_state() {
        let harness = Harness::new();
        harness.controller.clear();
        assert_eq!(harness.controller.snapshot(), WorkflowState::default());

        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        harness.settle();
        harness.controller.clear();
        assert_eq!(harness.controller.snapshot(), WorkflowState::default());

        harness
            .controller
            .select_file(Some(UploadFile::new("notes.txt", "text/plain", vec![1])));
        harness.controller.select_file(Some(UploadFile::new("x.doc", "", vec![1])));
        harness.controller.clear();
        assert_eq!(harness.controller.snapshot(), WorkflowState::default());
        assert_eq!(harness.controller.snapshot().phase(), WorkflowPhase::Idle);
    }

    #[test]
    fn late_response_after_clear_is_discarded() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();

        harness.controller.clear();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        let state = harness.settle();

        assert_eq!(state, WorkflowState::default());
        assert_eq!(harness.controller.stats().stale_responses, 1);
    }

    #[test]
    fn new_upload_supersedes_outstanding_request_without_overlap() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("first.jpg")));
        assert_eq!(harness.next_request(), "first.jpg");

        let outcome = harness.controller.select_file(Some(image("second.jpg")));
        assert_eq!(outcome, SelectOutcome::Queued { generation: 2 });
        let pending = harness.controller.snapshot();
        assert_eq!(
            pending.file.as_ref().map(|file| file.name.as_str()),
            Some("second.jpg")
        );
        assert_eq!(pending.phase(), WorkflowPhase::Previewing);
        assert_eq!(harness.calls(), 1);

        // The first answer arrives late and must not land.
        harness.reply(success(&[(1, "Biking", 99.0)]));
        assert_eq!(harness.next_request(), "second.jpg");
        assert!(harness.controller.snapshot().predictions.is_empty());

        harness.reply(success(&[(1, "HorseRiding", 64.0)]));
        let state = harness.settle();
        assert_eq!(state.predictions, list(&[(1, "HorseRiding", 64.0)]));
        assert_eq!(
            state.file.as_ref().map(|file| file.name.as_str()),
            Some("second.jpg")
        );
        assert_eq!(harness.calls(), 2);
        assert_eq!(harness.predictor.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(harness.controller.stats().stale_responses, 1);
    }

    #[test]
    fn only_latest_queued_upload_is_requested() {
        let harness = Harness::new();
        harness.controller.select_file(Some(image("a.jpg")));
        harness.next_request();
        harness.controller.select_file(Some(image("b.jpg")));
        harness.controller.select_file(Some(image("c.jpg")));

        harness.reply(success(&[(1, "Biking", 50.0)]));
        assert_eq!(harness.next_request(), "c.jpg");
        harness.reply(success(&[(1, "Skiing", 70.0)]));
        let state = harness.settle();

        assert_eq!(state.predictions, list(&[(1, "Skiing", 70.0)]));
        assert_eq!(harness.calls(), 2);
    }

    #[test]
    fn subscribers_see_each_phase_in_order() {
        let harness = Harness::new();
        let updates = harness.controller.subscribe();
        assert_eq!(
            updates.recv_timeout(WAIT).map(|state| state.phase()),
            Ok(WorkflowPhase::Idle)
        );

        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        harness.settle();
        harness.controller.clear();

        let phases = updates
            .try_iter()
            .map(|state| state.phase())
            .collect::<Vec<WorkflowPhase>>();
        assert_eq!(
            phases,
            vec![
                WorkflowPhase::Previewing,
                WorkflowPhase::Requesting,
                WorkflowPhase::Succeeded,
                WorkflowPhase::Idle,
            ]
        );
    }

    #[test]
    fn journal_records_workflow_milestones() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let harness = Harness::with_events(Some(EventWriter::new(&path, "session-1")));

        harness.controller.select_file(Some(image("bike.jpg")));
        harness.next_request();
        harness.controller.clear();
        harness.reply(success(&[(1, "Biking", 72.3)]));
        harness.settle();
        harness.controller.select_file(None);

        let raw = std::fs::read_to_string(&path)?;
        let types: Vec<String> = raw
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
            .collect();
        for expected in [
            "upload_selected",
            "preview_ready",
            "prediction_requested",
            "workflow_cleared",
            "stale_response_discarded",
            "upload_rejected",
        ] {
            assert!(types.contains(&expected.to_string()), "missing {expected}");
        }
        assert!(!types.contains(&"prediction_succeeded".to_string()));
        Ok(())
    }

    #[test]
    fn end_to_end_against_http_service() {
        let mut server = Server::new();
        let ok = server
            .mock("POST", "/predict")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"success":true,"predictions":[{"rank":1,"action":"Biking","confidence":72.3},{"rank":2,"action":"HorseRiding","confidence":15.1}]}"#,
            )
            .expect(1)
            .create();

        let client = HttpPredictionClient::new(ClientConfig::new(&server.url(), 5.0).unwrap())
            .unwrap();
        let controller = WorkflowController::new(Arc::new(client), None);
        controller.select_file(Some(image("bike.jpg")));
        let state = controller.wait_until_settled(WAIT).expect("settled");
        ok.assert();
        assert_eq!(
            state.predictions,
            list(&[(1, "Biking", 72.3), (2, "HorseRiding", 15.1)])
        );

        ok.remove();
        server
            .mock("POST", "/predict")
            .with_status(400)
            .with_body(r#"{"detail":"unsupported image"}"#)
            .create();
        controller.reanalyze();
        let state = controller.wait_until_settled(WAIT).expect("settled");
        assert_eq!(state.error_message.as_deref(), Some("unsupported image"));
        assert_eq!(state.predictions.len(), 2);
    }
}
