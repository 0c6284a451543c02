//! Explicit per-session workflow state.
//!
//! [`WorkflowSession`] threads the acquisition selector, the trigger gate and
//! the current run together. It is synchronous and owns no tasks; the
//! runtime drives it between user intents.

use std::collections::HashSet;

use safeheal_acquisition::{AcquisitionSelector, UnsupportedInput, capture_affordance};
use safeheal_analysis_contract::{
    AnalysisOutcome, AnalysisRequest, AnalysisResult, AnalysisStage, CollaboratorError,
    record_key,
};
use safeheal_core::{CaptureMode, InteractionCycle, MediaSubject};
use safeheal_progress::{AnalysisRun, Phase, ProgressError, ProgressStep, RunId, RunState};
use safeheal_ui::{
    Notice, NoticeLevel, ResultsPanel, WorkflowSnapshot, phase_status_text,
    project_results_panel, unsupported_input_notice,
};
use tracing::{debug, info, warn};

use crate::AppError;
use crate::config::WorkflowConfig;

/// Notices kept until the presentation drains them; older ones are dropped.
pub const MAX_PENDING_NOTICES: usize = 16;

/// Answer of the trigger gate to one `request_analysis` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A run was created or moved to requested.
    Requested(RunId),
    /// Nothing to analyze.
    NoActiveSubject,
    /// Run already requested; no-op.
    AlreadyRequested,
    /// Run already in progress; no-op.
    AlreadyRunning,
    /// Run already completed; no-op until reset.
    AlreadyCompleted,
    /// Analysis disabled by configuration.
    Disabled,
}

impl GateDecision {
    /// Returns `true` when this call created the request.
    pub fn is_requested(&self) -> bool {
        matches!(self, Self::Requested(_))
    }
}

/// Effect of one `submit_media` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Active subject changed.
    pub active_changed: bool,
    /// Run dropped because its subject was superseded.
    pub discarded_run: Option<RunId>,
    /// Notice for unsupported input.
    pub notice: Option<Notice>,
}

/// Side-effecting requests delegated to collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollaboratorAction {
    /// Render a PDF report.
    ExportReport,
    /// Save to the health record.
    PersistRecord,
}

/// Payload handed to a collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionIntent {
    /// Run the result belongs to.
    pub run_id: RunId,
    /// Requested action.
    pub action: CollaboratorAction,
    /// Result shown to the user.
    pub result: AnalysisResult,
    /// Deduplication key of `result`.
    pub record_key: String,
}

#[derive(Debug, Clone)]
struct RunRecord {
    run: AnalysisRun,
    subject: MediaSubject,
    actions: HashSet<CollaboratorAction>,
}

/// Mutable record of one user session.
#[derive(Debug, Clone)]
pub struct WorkflowSession {
    config: WorkflowConfig,
    capture_mode: CaptureMode,
    capture_requested: bool,
    selector: AcquisitionSelector,
    run: Option<RunRecord>,
    next_run_id: u64,
    notices: Vec<Notice>,
}

impl WorkflowSession {
    /// Creates the session of a first visit.
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            capture_mode: CaptureMode::default(),
            capture_requested: false,
            selector: AcquisitionSelector::new(),
            run: None,
            next_run_id: 1,
            notices: Vec::new(),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Selected capture mode.
    pub fn capture_mode(&self) -> CaptureMode {
        self.capture_mode
    }

    /// Whether the camera is open ("Capture" pressed, not "Use Upload").
    pub fn capture_requested(&self) -> bool {
        self.capture_requested
    }

    /// Active subject, if any.
    pub fn active_subject(&self) -> Option<&MediaSubject> {
        self.selector.active()
    }

    /// Current run, if any.
    pub fn run(&self) -> Option<&AnalysisRun> {
        self.run.as_ref().map(|record| &record.run)
    }

    /// Current run state; `Idle` when no run exists.
    pub fn run_state(&self) -> RunState {
        self.run().map_or(RunState::Idle, AnalysisRun::state)
    }

    /// Changes the capture mode. Never touches the active subject.
    pub fn select_capture_mode(&mut self, mode: CaptureMode) {
        if self.capture_mode != mode {
            debug!(?mode, "capture mode selected");
        }
        self.capture_mode = mode;
    }

    /// "Capture" (`true`) or "Use Upload" (`false`).
    ///
    /// Opening the camera in video mode warns that live video is unsupported.
    /// Closing it keeps any retained capture.
    pub fn request_capture(&mut self, requested: bool) {
        if requested && !self.capture_requested && self.capture_mode == CaptureMode::Video {
            self.push_notice(unsupported_input_notice(&UnsupportedInput::LiveVideoCapture));
        }
        if self.capture_requested != requested {
            debug!(requested, "capture toggled");
        }
        self.capture_requested = requested;
    }

    /// Folds one interaction cycle into the session.
    ///
    /// Captures are ignored while the camera is closed. A changed subject
    /// discards the current run; the caller must cancel any work still
    /// pending for [`SubmitOutcome::discarded_run`].
    pub fn submit_media(&mut self, mut cycle: InteractionCycle) -> SubmitOutcome {
        if !self.capture_requested && cycle.capture.take().is_some() {
            debug!("capture ignored: camera closed");
        }
        let outcome = self.selector.resolve(self.capture_mode, cycle);

        let notice = outcome.unsupported.as_ref().map(unsupported_input_notice);
        if let Some(notice) = &notice {
            self.push_notice(notice.clone());
        }

        let discarded_run = if outcome.changed {
            self.run.take().map(|record| {
                info!(run_id = %record.run.id(), "run discarded for new subject");
                record.run.id()
            })
        } else {
            None
        };

        SubmitOutcome {
            active_changed: outcome.changed,
            discarded_run,
            notice,
        }
    }

    /// Whether the trigger gate would accept a request now.
    pub fn can_request_analysis(&self) -> bool {
        self.config.analysis_enabled
            && self.active_subject().is_some()
            && self.run_state() == RunState::Idle
    }

    /// Trigger gate. Idempotent while a run is requested, running or done.
    pub fn request_analysis(&mut self) -> GateDecision {
        if !self.config.analysis_enabled {
            self.push_notice(Notice::new(
                NoticeLevel::Warning,
                "Analysis is currently disabled.",
            ));
            return GateDecision::Disabled;
        }

        let Some(subject) = self.selector.active().cloned() else {
            debug!("analysis request ignored: no active subject");
            return GateDecision::NoActiveSubject;
        };

        if let Some(record) = self.run.as_mut() {
            return match record.run.state() {
                RunState::Requested => GateDecision::AlreadyRequested,
                RunState::InProgress => GateDecision::AlreadyRunning,
                RunState::Completed => GateDecision::AlreadyCompleted,
                RunState::Idle => {
                    record.run.request();
                    GateDecision::Requested(record.run.id())
                }
            };
        }

        let id = RunId(self.next_run_id);
        self.next_run_id += 1;

        let mut run = AnalysisRun::new(id);
        run.request();
        info!(run_id = %id, handle = %subject.handle, "analysis requested");

        self.run = Some(RunRecord {
            run,
            subject,
            actions: HashSet::new(),
        });
        GateDecision::Requested(id)
    }

    /// "New analysis": drops the run and its result, keeps subject and mode.
    ///
    /// Returns the dropped run so the caller can cancel its pending work.
    /// A second call is a no-op.
    pub fn reset_workflow(&mut self) -> Option<RunId> {
        let dropped = self.run.take().map(|record| record.run.id());
        if let Some(run_id) = dropped {
            info!(%run_id, "workflow reset");
        }
        dropped
    }

    /// "Reset application": clears everything back to a first visit.
    pub fn teardown(&mut self) -> Option<RunId> {
        let dropped = self.reset_workflow();
        self.selector.clear();
        self.capture_mode = CaptureMode::default();
        self.capture_requested = false;
        self.notices.clear();
        info!("session torn down");
        dropped
    }

    /// Moves a requested run to in-progress and returns the service request.
    ///
    /// # Errors
    /// Returns [`AppError::Progress`] if the run refuses the transition.
    pub fn start_requested_run(&mut self) -> Result<Option<(RunId, AnalysisRequest)>, AppError> {
        let Some(record) = self.run.as_mut() else {
            return Ok(None);
        };
        if record.run.state() != RunState::Requested {
            return Ok(None);
        }

        record.run.start()?;
        info!(run_id = %record.run.id(), "analysis started");

        Ok(Some((
            record.run.id(),
            AnalysisRequest {
                handle: record.subject.handle.clone(),
                kind: record.subject.kind,
                depth: self.config.analysis_depth,
            },
        )))
    }

    /// Records the service outcome for `run_id`.
    ///
    /// Returns `false` for outcomes of runs that no longer exist.
    ///
    /// # Errors
    /// Returns [`AppError::Progress`] on a duplicate outcome.
    pub fn record_outcome(
        &mut self,
        run_id: RunId,
        outcome: AnalysisOutcome,
    ) -> Result<bool, AppError> {
        let Some(record) = self.run.as_mut().filter(|record| record.run.id() == run_id) else {
            debug!(%run_id, "stale outcome dropped");
            return Ok(false);
        };

        if let AnalysisOutcome::Failed(reason) = &outcome {
            warn!(%run_id, %reason, "analysis service failed");
        }
        record.run.record_outcome(outcome)?;
        Ok(true)
    }

    /// Percentage and outcome readiness of the in-progress run.
    pub fn progress(&self) -> Option<(u8, bool)> {
        self.run()
            .filter(|run| run.state() == RunState::InProgress)
            .map(|run| (run.percent(), run.outcome_ready()))
    }

    /// Advances the in-progress run toward `target`.
    ///
    /// # Errors
    /// Returns [`AppError::Progress`] if the run refuses the step.
    pub fn advance_run(&mut self, target: u8) -> Result<Option<(RunId, ProgressStep)>, AppError> {
        self.step_run(|run| run.advance_to(target))
    }

    /// Moves the in-progress run to the phase of a stage the service reported.
    ///
    /// Reports for a run that no longer exists are ignored.
    ///
    /// # Errors
    /// Returns [`AppError::Progress`] if the run refuses the step.
    pub fn enter_stage(
        &mut self,
        run_id: RunId,
        stage: AnalysisStage,
    ) -> Result<Option<(RunId, ProgressStep)>, AppError> {
        if self.run().map(AnalysisRun::id) != Some(run_id) {
            debug!(%run_id, ?stage, "stale stage report dropped");
            return Ok(None);
        }
        debug!(%run_id, ?stage, "service stage reported");
        self.step_run(|run| run.enter_phase(Phase::from(stage)))
    }

    fn step_run(
        &mut self,
        apply: impl FnOnce(&mut AnalysisRun) -> Result<ProgressStep, ProgressError>,
    ) -> Result<Option<(RunId, ProgressStep)>, AppError> {
        let Some(record) = self
            .run
            .as_mut()
            .filter(|record| record.run.state() == RunState::InProgress)
        else {
            return Ok(None);
        };

        let step = apply(&mut record.run)?;
        if step == ProgressStep::Completed {
            info!(
                run_id = %record.run.id(),
                failed = record.run.outcome().is_some_and(AnalysisOutcome::is_failed),
                "analysis completed"
            );
        }
        Ok(Some((record.run.id(), step)))
    }

    /// Builds the payload for a collaborator action, or refuses with a notice.
    ///
    /// Each action runs at most once per run. The displayed result is handed
    /// over as shown, sample included.
    pub fn prepare_action(&mut self, action: CollaboratorAction) -> Option<ActionIntent> {
        let refusal = match self.run.as_mut() {
            Some(record) if record.run.state() == RunState::Completed => {
                match record.run.outcome().and_then(AnalysisOutcome::displayed_result) {
                    None => Err("There is no result for a failed analysis."),
                    Some(_) if record.actions.contains(&action) => Err(match action {
                        CollaboratorAction::ExportReport => "This report was already requested.",
                        CollaboratorAction::PersistRecord => "This analysis was already saved.",
                    }),
                    Some((result, _)) => match record_key(&result) {
                        Ok(key) => {
                            record.actions.insert(action);
                            Ok(ActionIntent {
                                run_id: record.run.id(),
                                action,
                                result,
                                record_key: key,
                            })
                        }
                        Err(error) => {
                            warn!(%error, "record key derivation failed");
                            Err("The result could not be prepared.")
                        }
                    },
                }
            }
            _ => Err("Results are not ready yet."),
        };

        match refusal {
            Ok(intent) => {
                info!(run_id = %intent.run_id, ?action, key = %intent.record_key, "action dispatched");
                if action == CollaboratorAction::ExportReport {
                    self.push_notice(Notice::new(
                        NoticeLevel::Info,
                        "Preparing PDF report for download...",
                    ));
                }
                Some(intent)
            }
            Err(message) => {
                self.push_notice(Notice::new(NoticeLevel::Warning, message));
                None
            }
        }
    }

    /// Surfaces a collaborator result as a notice. Run state is untouched.
    ///
    /// Returns `false` when the run is gone.
    pub fn finish_action(
        &mut self,
        run_id: RunId,
        action: CollaboratorAction,
        result: Result<(), CollaboratorError>,
    ) -> bool {
        if self.run().map(AnalysisRun::id) != Some(run_id) {
            debug!(%run_id, ?action, "stale collaborator result dropped");
            return false;
        }

        let notice = match (action, result) {
            (CollaboratorAction::ExportReport, Ok(())) => {
                Notice::new(NoticeLevel::Success, "PDF report is ready for download")
            }
            (CollaboratorAction::PersistRecord, Ok(())) => {
                Notice::new(NoticeLevel::Success, "Analysis saved to health record")
            }
            (CollaboratorAction::ExportReport, Err(error)) => {
                warn!(%run_id, %error, "report export failed");
                Notice::new(NoticeLevel::Error, "Report export failed.").with_hint(error.to_string())
            }
            (CollaboratorAction::PersistRecord, Err(error)) => {
                warn!(%run_id, %error, "record persistence failed");
                Notice::new(NoticeLevel::Error, "Saving to health record failed.")
                    .with_hint(error.to_string())
            }
        };
        self.push_notice(notice);
        true
    }

    /// Pending notices, oldest first, at most [`MAX_PENDING_NOTICES`].
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Drains pending notices once the presentation has shown them.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() >= MAX_PENDING_NOTICES {
            let overflow = self.notices.len() + 1 - MAX_PENDING_NOTICES;
            self.notices.drain(..overflow);
        }
        self.notices.push(notice);
    }

    /// Read-only projection for rendering.
    pub fn snapshot(&self, version: &str) -> WorkflowSnapshot {
        let run_state = self.run_state();
        let results = match self.run.as_ref() {
            None => ResultsPanel::Hidden,
            Some(record) => match record.run.state() {
                RunState::Idle => ResultsPanel::Hidden,
                RunState::Requested | RunState::InProgress => ResultsPanel::Progress {
                    percent: record.run.percent(),
                    phase: record.run.phase(),
                    status_text: phase_status_text(record.run.phase()),
                },
                RunState::Completed => record
                    .run
                    .outcome()
                    .map_or(ResultsPanel::Hidden, |outcome| {
                        project_results_panel(outcome, Some(&record.subject.handle))
                    }),
            },
        };

        WorkflowSnapshot {
            version: version.to_string(),
            capture_mode: self.capture_mode,
            capture_affordance: capture_affordance(self.capture_mode, self.capture_requested),
            active_subject: self.active_subject().cloned(),
            can_request_analysis: self.can_request_analysis(),
            run_state,
            analysis_requested: run_state != RunState::Idle,
            analysis_in_progress: run_state == RunState::InProgress,
            analysis_complete: run_state == RunState::Completed,
            results,
            show_technical: self.config.show_technical,
            notices: self.notices.clone(),
        }
    }
}
