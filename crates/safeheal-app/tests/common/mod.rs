//! Shared fixtures for app integration tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use safeheal_analysis_contract::{
    AnalysisRequest, AnalysisResult, AnalysisService, AnalysisStage, CallContext,
    CollaboratorError, RecordStore, ReportExporter,
};
use safeheal_app::{WorkflowConfig, WorkflowEvent, WorkflowRuntime};
use safeheal_core::{CaptureEvent, InteractionCycle, UploadEvent};

/// Fast pacing: 10 percent per tick, 1 ms interval.
#[allow(dead_code)]
pub fn fast_config() -> WorkflowConfig {
    WorkflowConfig {
        progress_step: 10,
        tick_interval: Duration::from_millis(1),
        ..WorkflowConfig::default()
    }
}

/// Runtime on the current test runtime, camera open.
#[allow(dead_code)]
pub fn runtime_with(service: Arc<dyn AnalysisService>) -> WorkflowRuntime {
    let mut runtime =
        WorkflowRuntime::current(fast_config(), service).expect("test runs inside tokio");
    runtime.request_capture(true);
    runtime
}

/// Cycle carrying one captured still.
#[allow(dead_code)]
pub fn capture_cycle(handle: &str) -> InteractionCycle {
    InteractionCycle::capture(CaptureEvent::new(handle).expect("capture fixture should be valid"))
}

/// Cycle carrying one upload.
#[allow(dead_code)]
pub fn upload_cycle(handle: &str, mime: &str, file_name: &str) -> InteractionCycle {
    InteractionCycle::upload(
        UploadEvent::new(handle, mime, Some(file_name)).expect("upload fixture should be valid"),
    )
}

/// Ticks with 1 ms pauses until the runtime settles.
#[allow(dead_code)]
pub async fn drive_until_settled(runtime: &mut WorkflowRuntime) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    for _ in 0..2_000 {
        events.extend(runtime.tick().expect("tick should not fail"));
        if runtime.is_settled() {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("runtime did not settle");
}

/// Ticks a fixed number of times with 1 ms pauses.
#[allow(dead_code)]
pub async fn drive_ticks(runtime: &mut WorkflowRuntime, ticks: usize) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(runtime.tick().expect("tick should not fail"));
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    events
}

/// Number of completion events in `events`.
#[allow(dead_code)]
pub fn completions(events: &[WorkflowEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, WorkflowEvent::RunCompleted { .. }))
        .count()
}

/// Service returning a fixed response and counting calls.
pub struct ScriptedService {
    response: Result<Option<AnalysisResult>, CollaboratorError>,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedService {
    /// Service that answers `response` to every call.
    pub fn new(response: Result<Option<AnalysisResult>, CollaboratorError>) -> Arc<Self> {
        Arc::new(Self {
            response,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of `analyze` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnalysisService for ScriptedService {
    fn analyze(
        &self,
        _request: &AnalysisRequest,
        _context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

/// Service that blocks until released.
pub struct GatedService {
    released: Mutex<bool>,
    signal: Condvar,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl GatedService {
    /// Creates a closed gate.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            released: Mutex::new(false),
            signal: Condvar::new(),
            calls: AtomicUsize::new(0),
        })
    }

    /// Opens the gate for current and future calls.
    pub fn release(&self) {
        *self.released.lock().expect("gate lock") = true;
        self.signal.notify_all();
    }

    /// Number of `analyze` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AnalysisService for GatedService {
    fn analyze(
        &self,
        _request: &AnalysisRequest,
        _context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let released = self.released.lock().expect("gate lock");
        let _released = self
            .signal
            .wait_timeout_while(released, Duration::from_secs(5), |open| !*open)
            .expect("gate wait");
        Ok(None)
    }
}

/// Slow service that polls its cancellation token between 5 ms steps.
#[derive(Default)]
pub struct CooperativeService {
    started: AtomicBool,
    stopped_early: AtomicBool,
    finished: AtomicBool,
}

#[allow(dead_code)]
impl CooperativeService {
    /// Total work time when never cancelled.
    pub const WORK: Duration = Duration::from_millis(300);

    /// Creates an idle service.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Whether `analyze` was entered.
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Whether the call returned because its run was cancelled.
    pub fn stopped_early(&self) -> bool {
        self.stopped_early.load(Ordering::SeqCst)
    }

    /// Whether the call ran all of its work.
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl AnalysisService for CooperativeService {
    fn analyze(
        &self,
        _request: &AnalysisRequest,
        context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError> {
        self.started.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + Self::WORK;
        while Instant::now() < deadline {
            if let Err(error) = context.ensure_active() {
                self.stopped_early.store(true, Ordering::SeqCst);
                return Err(error);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        self.finished.store(true, Ordering::SeqCst);
        Ok(None)
    }
}

/// Service that reports every stage before answering.
pub struct StagedService {
    response: Result<Option<AnalysisResult>, CollaboratorError>,
}

#[allow(dead_code)]
impl StagedService {
    /// Service that answers `response` after reporting all stages.
    pub fn new(response: Result<Option<AnalysisResult>, CollaboratorError>) -> Arc<Self> {
        Arc::new(Self { response })
    }
}

impl AnalysisService for StagedService {
    fn analyze(
        &self,
        _request: &AnalysisRequest,
        context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError> {
        for stage in [
            AnalysisStage::Segmentation,
            AnalysisStage::Classification,
            AnalysisStage::Recommendation,
            AnalysisStage::Finalization,
        ] {
            context.ensure_active()?;
            context.report_stage(stage);
        }
        self.response.clone()
    }
}

/// Exporter and store that record what they were given.
#[derive(Default)]
pub struct RecordingCollaborator {
    fail: bool,
    exports: Mutex<Vec<String>>,
    persisted: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl RecordingCollaborator {
    /// Collaborator that succeeds.
    pub fn succeeding() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Collaborator that fails every call.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    /// Wound classes of exported reports.
    pub fn exports(&self) -> Vec<String> {
        self.exports.lock().expect("exports lock").clone()
    }

    /// Record keys of persisted results.
    pub fn persisted(&self) -> Vec<String> {
        self.persisted.lock().expect("persisted lock").clone()
    }
}

impl ReportExporter for RecordingCollaborator {
    fn export_report(
        &self,
        result: &AnalysisResult,
        _context: &CallContext,
    ) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Failed("renderer crashed".to_string()));
        }
        self.exports
            .lock()
            .expect("exports lock")
            .push(result.wound_class.clone());
        Ok(())
    }
}

impl RecordStore for RecordingCollaborator {
    fn persist(
        &self,
        record_key: &str,
        _result: &AnalysisResult,
        _context: &CallContext,
    ) -> Result<(), CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::Failed("store rejected write".to_string()));
        }
        self.persisted
            .lock()
            .expect("persisted lock")
            .push(record_key.to_string());
        Ok(())
    }
}
