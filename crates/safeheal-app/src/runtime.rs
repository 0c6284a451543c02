//! Tick-driven async driver around [`WorkflowSession`].
//!
//! Collaborator calls run on the blocking pool under a per-run
//! [`CancellationToken`], handed to them inside a [`CallContext`]. Results come
//! back over oneshot channels and stage reports over an unbounded channel;
//! [`WorkflowRuntime::tick`] polls both without blocking, so the session is
//! only ever mutated from the caller's thread.

use std::sync::Arc;

use safeheal_analysis_contract::{
    AnalysisOutcome, AnalysisRequest, AnalysisResult, AnalysisService, AnalysisStage,
    CallContext, CollaboratorError, RecordStore, ReportExporter,
};
use safeheal_core::{CaptureMode, InteractionCycle};
use safeheal_progress::{Pacing, Phase, ProgressStep, RunId, RunState, SimulatedPacing};
use safeheal_ui::{Notice, WorkflowSnapshot};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::session::{ActionIntent, CollaboratorAction, GateDecision, SubmitOutcome, WorkflowSession};
use crate::{AppError, app_version};

/// Observable transition produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// A requested run moved to in-progress.
    RunStarted(RunId),
    /// Progress crossed into a new phase.
    PhaseEntered {
        /// Run.
        run_id: RunId,
        /// Phase entered.
        phase: Phase,
    },
    /// Percentage moved forward.
    Progress {
        /// Run.
        run_id: RunId,
        /// New percentage.
        percent: u8,
    },
    /// Run completed. Emitted once per run.
    RunCompleted {
        /// Run.
        run_id: RunId,
        /// Whether the service failed.
        failed: bool,
    },
    /// A collaborator action returned.
    ActionFinished {
        /// Run.
        run_id: RunId,
        /// Action.
        action: CollaboratorAction,
        /// Whether the collaborator succeeded.
        succeeded: bool,
    },
}

/// Exporter and store used when no backend is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCollaborator;

impl ReportExporter for UnavailableCollaborator {
    fn export_report(
        &self,
        _result: &AnalysisResult,
        _context: &CallContext,
    ) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "report export is not configured".to_string(),
        ))
    }
}

impl RecordStore for UnavailableCollaborator {
    fn persist(
        &self,
        _record_key: &str,
        _result: &AnalysisResult,
        _context: &CallContext,
    ) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Unavailable(
            "health record store is not configured".to_string(),
        ))
    }
}

type ActionReceiver = oneshot::Receiver<Result<(), CollaboratorError>>;

struct PendingAction {
    run_id: RunId,
    action: CollaboratorAction,
    rx: ActionReceiver,
}

/// Owns one session and the work it has in flight.
pub struct WorkflowRuntime {
    handle: Handle,
    session: WorkflowSession,
    service: Arc<dyn AnalysisService>,
    exporter: Arc<dyn ReportExporter>,
    store: Arc<dyn RecordStore>,
    pacing: Box<dyn Pacing>,
    shutdown: CancellationToken,
    run_cancel: Option<CancellationToken>,
    pending_analysis: Option<(RunId, oneshot::Receiver<AnalysisOutcome>)>,
    stage_reports: Option<(RunId, mpsc::UnboundedReceiver<AnalysisStage>)>,
    pending_actions: Vec<PendingAction>,
}

impl WorkflowRuntime {
    /// Creates a runtime that spawns onto `handle`.
    ///
    /// Export and persistence default to [`UnavailableCollaborator`]; pacing
    /// defaults to [`SimulatedPacing`] with the configured step.
    pub fn new(handle: Handle, config: WorkflowConfig, service: Arc<dyn AnalysisService>) -> Self {
        let pacing = Box::new(SimulatedPacing::new(config.progress_step));
        Self {
            handle,
            session: WorkflowSession::new(config),
            service,
            exporter: Arc::new(UnavailableCollaborator),
            store: Arc::new(UnavailableCollaborator),
            pacing,
            shutdown: CancellationToken::new(),
            run_cancel: None,
            pending_analysis: None,
            stage_reports: None,
            pending_actions: Vec::new(),
        }
    }

    /// Creates a runtime on the ambient tokio runtime.
    ///
    /// # Errors
    /// Returns [`AppError::NoRuntime`] outside a tokio runtime.
    pub fn current(config: WorkflowConfig, service: Arc<dyn AnalysisService>) -> Result<Self, AppError> {
        let handle = Handle::try_current().map_err(|error| AppError::NoRuntime(error.to_string()))?;
        Ok(Self::new(handle, config, service))
    }

    /// Replaces the report exporter.
    pub fn with_exporter(mut self, exporter: Arc<dyn ReportExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    /// Replaces the record store.
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the pacing strategy.
    pub fn with_pacing(mut self, pacing: Box<dyn Pacing>) -> Self {
        self.pacing = pacing;
        self
    }

    /// Read access to the session.
    pub fn session(&self) -> &WorkflowSession {
        &self.session
    }

    /// Current snapshot, stamped with the application version.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.session.snapshot(app_version())
    }

    /// Drains pending notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.session.take_notices()
    }

    /// See [`WorkflowSession::select_capture_mode`].
    pub fn select_capture_mode(&mut self, mode: CaptureMode) {
        self.session.select_capture_mode(mode);
    }

    /// See [`WorkflowSession::request_capture`].
    pub fn request_capture(&mut self, requested: bool) {
        self.session.request_capture(requested);
    }

    /// Folds an interaction cycle; cancels work of a superseded run.
    pub fn submit_media(&mut self, cycle: InteractionCycle) -> SubmitOutcome {
        let outcome = self.session.submit_media(cycle);
        if outcome.discarded_run.is_some() {
            self.cancel_run_work();
        }
        outcome
    }

    /// Trigger gate. The run starts on the next tick.
    pub fn request_analysis(&mut self) -> GateDecision {
        self.session.request_analysis()
    }

    /// Drops the run and cancels its pending work. Idempotent.
    pub fn reset_workflow(&mut self) -> Option<RunId> {
        self.cancel_run_work();
        self.session.reset_workflow()
    }

    /// Clears the whole session and cancels pending work.
    pub fn teardown(&mut self) -> Option<RunId> {
        self.cancel_run_work();
        self.session.teardown()
    }

    /// Dispatches report export for the completed run.
    ///
    /// Returns `false` when refused; the refusal is surfaced as a notice.
    pub fn export_report(&mut self) -> bool {
        self.dispatch_action(CollaboratorAction::ExportReport)
    }

    /// Dispatches health-record persistence for the completed run.
    ///
    /// Returns `false` when refused; the refusal is surfaced as a notice.
    pub fn persist_record(&mut self) -> bool {
        self.dispatch_action(CollaboratorAction::PersistRecord)
    }

    /// Returns `true` when no run is pending and no action is in flight.
    pub fn is_settled(&self) -> bool {
        !matches!(
            self.session.run_state(),
            RunState::Requested | RunState::InProgress
        ) && self.pending_actions.is_empty()
    }

    /// Performs one non-blocking step.
    ///
    /// Starts a requested run, collects finished work and stage reports, then
    /// advances progress by one pacing step.
    ///
    /// # Errors
    /// Returns [`AppError::Progress`] if the run rejects a transition.
    pub fn tick(&mut self) -> Result<Vec<WorkflowEvent>, AppError> {
        let mut events = Vec::new();

        if let Some((run_id, request)) = self.session.start_requested_run()? {
            self.spawn_analysis(run_id, request);
            events.push(WorkflowEvent::RunStarted(run_id));
            events.push(WorkflowEvent::PhaseEntered {
                run_id,
                phase: Phase::Segmenting,
            });
        }

        // Outcome first: every stage reported before it is already queued.
        self.poll_analysis()?;
        self.poll_stages(&mut events)?;

        if let Some((percent, outcome_ready)) = self.session.progress() {
            let target = self.pacing.next_target(percent, outcome_ready);
            if let Some((run_id, step)) = self.session.advance_run(target)? {
                self.push_step(&mut events, run_id, step);
            }
        }

        self.poll_actions(&mut events);
        Ok(events)
    }

    fn push_step(&self, events: &mut Vec<WorkflowEvent>, run_id: RunId, step: ProgressStep) {
        match step {
            ProgressStep::Advanced { percent, entered } => {
                if let Some(phase) = entered {
                    events.push(WorkflowEvent::PhaseEntered { run_id, phase });
                }
                events.push(WorkflowEvent::Progress { run_id, percent });
            }
            ProgressStep::Holding { .. } => {}
            ProgressStep::Completed => {
                let failed = self
                    .session
                    .run()
                    .and_then(|run| run.outcome())
                    .is_some_and(AnalysisOutcome::is_failed);
                events.push(WorkflowEvent::Progress {
                    run_id,
                    percent: 100,
                });
                events.push(WorkflowEvent::RunCompleted { run_id, failed });
            }
        }
    }

    /// Ticks at the configured interval until settled or `shutdown` fires.
    ///
    /// # Errors
    /// Propagates [`Self::tick`] errors.
    pub async fn run_until_settled(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<Vec<WorkflowEvent>, AppError> {
        let mut interval = tokio::time::interval(self.session.config().tick_interval);
        let mut events = Vec::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("tick loop stopped by shutdown");
                    break;
                }
                _ = interval.tick() => {
                    events.extend(self.tick()?);
                    if self.is_settled() {
                        break;
                    }
                }
            }
        }

        Ok(events)
    }

    fn spawn_analysis(&mut self, run_id: RunId, request: AnalysisRequest) {
        let token = self.shutdown.child_token();
        self.run_cancel = Some(token.clone());

        let (tx, rx) = oneshot::channel();
        self.pending_analysis = Some((run_id, rx));

        let (stage_tx, stage_rx) = mpsc::unbounded_channel();
        self.stage_reports = Some((run_id, stage_rx));
        let context = CallContext::new(token.clone()).with_stage_sink(stage_tx);

        let service = Arc::clone(&self.service);
        self.handle.spawn(async move {
            let work =
                tokio::task::spawn_blocking(move || service.analyze(&request, &context));
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%run_id, "analysis cancelled");
                }
                joined = work => {
                    let outcome = match joined {
                        Ok(result) => AnalysisOutcome::from(result),
                        Err(error) => AnalysisOutcome::Failed(format!("analysis task failed: {error}")),
                    };
                    let _ = tx.send(outcome);
                }
            }
        });
    }

    fn poll_analysis(&mut self) -> Result<(), AppError> {
        let Some((run_id, rx)) = self.pending_analysis.as_mut() else {
            return Ok(());
        };
        let run_id = *run_id;

        let outcome = match rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return Ok(()),
            Err(TryRecvError::Closed) => {
                warn!(%run_id, "analysis task ended without a result");
                AnalysisOutcome::Failed("analysis task ended without a result".to_string())
            }
        };

        self.pending_analysis = None;
        self.session.record_outcome(run_id, outcome)?;
        Ok(())
    }

    fn poll_stages(&mut self, events: &mut Vec<WorkflowEvent>) -> Result<(), AppError> {
        let Some((run_id, rx)) = self.stage_reports.as_mut() else {
            return Ok(());
        };
        let run_id = *run_id;

        let mut reported = Vec::new();
        let finished = loop {
            match rx.try_recv() {
                Ok(stage) => reported.push(stage),
                Err(mpsc::error::TryRecvError::Empty) => break false,
                Err(mpsc::error::TryRecvError::Disconnected) => break true,
            }
        };
        if finished {
            self.stage_reports = None;
        }

        for stage in reported {
            if let Some((run_id, step)) = self.session.enter_stage(run_id, stage)? {
                self.push_step(events, run_id, step);
            }
        }
        Ok(())
    }

    fn dispatch_action(&mut self, action: CollaboratorAction) -> bool {
        let Some(intent) = self.session.prepare_action(action) else {
            return false;
        };
        let ActionIntent {
            run_id,
            result,
            record_key,
            ..
        } = intent;

        let token = self
            .run_cancel
            .clone()
            .unwrap_or_else(|| self.shutdown.child_token());
        let context = CallContext::new(token.clone());
        let (tx, rx) = oneshot::channel();
        self.pending_actions.push(PendingAction { run_id, action, rx });

        let exporter = Arc::clone(&self.exporter);
        let store = Arc::clone(&self.store);
        self.handle.spawn(async move {
            let work = tokio::task::spawn_blocking(move || match action {
                CollaboratorAction::ExportReport => exporter.export_report(&result, &context),
                CollaboratorAction::PersistRecord => store.persist(&record_key, &result, &context),
            });
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(%run_id, ?action, "action cancelled");
                }
                joined = work => {
                    let result = joined.unwrap_or_else(|error| {
                        Err(CollaboratorError::Failed(format!("action task failed: {error}")))
                    });
                    let _ = tx.send(result);
                }
            }
        });
        true
    }

    fn poll_actions(&mut self, events: &mut Vec<WorkflowEvent>) {
        let mut still_pending = Vec::with_capacity(self.pending_actions.len());

        for mut pending in std::mem::take(&mut self.pending_actions) {
            let result = match pending.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => {
                    still_pending.push(pending);
                    continue;
                }
                Err(TryRecvError::Closed) => Err(CollaboratorError::Failed(
                    "action ended without a result".to_string(),
                )),
            };

            let succeeded = result.is_ok();
            if self.session.finish_action(pending.run_id, pending.action, result) {
                events.push(WorkflowEvent::ActionFinished {
                    run_id: pending.run_id,
                    action: pending.action,
                    succeeded,
                });
            }
        }

        self.pending_actions = still_pending;
    }

    fn cancel_run_work(&mut self) {
        if let Some(token) = self.run_cancel.take() {
            token.cancel();
        }
        if let Some((run_id, _)) = self.pending_analysis.take() {
            info!(%run_id, "pending analysis cancelled");
        }
        self.stage_reports = None;
        self.pending_actions.clear();
    }
}

impl Drop for WorkflowRuntime {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
