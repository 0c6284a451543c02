#![warn(missing_docs)]
//! # safeheal-progress
//!
//! ## Purpose
//! Tracks one analysis run from request to completion.
//!
//! ## Responsibilities
//! - Enforce the run lifecycle `Idle -> Requested -> InProgress -> Completed`.
//! - Keep progress monotonic and derive the phase from fixed breakpoints.
//! - Hold progress below 100 until the service outcome is recorded, then
//!   complete exactly once.
//! - Let callers swap the pacing strategy without touching the lifecycle.
//!
//! ## Data flow
//! Trigger gate -> [`AnalysisRun::request`] -> driver calls
//! [`AnalysisRun::start`] -> repeated [`AnalysisRun::advance_to`] with targets
//! from a [`Pacing`] strategy -> [`ProgressStep::Completed`].
//!
//! ## Ownership and lifetimes
//! A run owns its outcome. Dropping the run drops the result with it, which
//! is how a reset makes the previous result unreachable.
//!
//! ## Error model
//! Calls that do not fit the current state return
//! [`ProgressError::InvalidTransition`] and leave the run unchanged.
//!
//! ## Example
//! ```rust
//! use safeheal_progress::{AnalysisRun, Phase, RunId, RunState};
//!
//! let mut run = AnalysisRun::new(RunId(1));
//! assert!(run.request());
//! assert!(!run.request());
//! run.start().unwrap();
//! assert_eq!(run.state(), RunState::InProgress);
//! assert_eq!(Phase::from_percent(45), Phase::Classifying);
//! ```

use std::fmt;

use safeheal_analysis_contract::{AnalysisOutcome, AnalysisStage};
use thiserror::Error;
use tracing::debug;

/// Highest percentage shown while the service outcome is still pending.
pub const HOLD_PERCENT: u8 = 99;

/// Lower bounds of the phases, in order.
pub const PHASE_BREAKPOINTS: [(u8, Phase); 4] = [
    (0, Phase::Segmenting),
    (30, Phase::Classifying),
    (60, Phase::Recommending),
    (90, Phase::Finalizing),
];

/// Lifecycle state of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// User requested analysis; the driver has not started it.
    Requested,
    /// Analysis is running.
    InProgress,
    /// Terminal. Outcome recorded.
    Completed,
}

/// Coarse analysis phase derived from the percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// `[0, 30)`
    Segmenting,
    /// `[30, 60)`
    Classifying,
    /// `[60, 90)`
    Recommending,
    /// `[90, 100]`
    Finalizing,
}

impl Phase {
    /// Maps a percentage to its phase. Values above 100 count as 100.
    pub fn from_percent(percent: u8) -> Self {
        PHASE_BREAKPOINTS
            .iter()
            .rev()
            .find(|(lower, _)| percent >= *lower)
            .map_or(Self::Segmenting, |(_, phase)| *phase)
    }

    /// Lowest percentage of this phase.
    pub fn lower_bound(self) -> u8 {
        PHASE_BREAKPOINTS
            .iter()
            .find(|(_, phase)| *phase == self)
            .map_or(0, |(lower, _)| *lower)
    }
}

impl From<AnalysisStage> for Phase {
    fn from(stage: AnalysisStage) -> Self {
        match stage {
            AnalysisStage::Segmentation => Self::Segmenting,
            AnalysisStage::Classification => Self::Classifying,
            AnalysisStage::Recommendation => Self::Recommending,
            AnalysisStage::Finalization => Self::Finalizing,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Segmenting => "segmenting",
            Self::Classifying => "classifying",
            Self::Recommending => "recommending",
            Self::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// Session-local run identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// Result of one advancement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    /// Percentage moved forward.
    Advanced {
        /// New percentage.
        percent: u8,
        /// Phase entered by this step, if it crossed a breakpoint.
        entered: Option<Phase>,
    },
    /// Nothing moved; waiting on the target or on the outcome.
    Holding {
        /// Current percentage.
        percent: u8,
    },
    /// Reached 100 and completed. Emitted once per run.
    Completed,
}

/// One analysis attempt for the active subject.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRun {
    id: RunId,
    state: RunState,
    percent: u8,
    outcome: Option<AnalysisOutcome>,
}

impl AnalysisRun {
    /// Creates an idle run.
    pub fn new(id: RunId) -> Self {
        Self {
            id,
            state: RunState::Idle,
            percent: 0,
            outcome: None,
        }
    }

    /// Run identifier.
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Current percentage in `0..=100`.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Phase derived from the current percentage.
    pub fn phase(&self) -> Phase {
        Phase::from_percent(self.percent)
    }

    /// Outcome, present iff the run is completed.
    pub fn outcome(&self) -> Option<&AnalysisOutcome> {
        match self.state {
            RunState::Completed => self.outcome.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` once the service outcome has been recorded.
    pub fn outcome_ready(&self) -> bool {
        self.outcome.is_some()
    }

    /// Moves `Idle -> Requested`.
    ///
    /// Returns `false` and changes nothing in any other state.
    pub fn request(&mut self) -> bool {
        if self.state != RunState::Idle {
            return false;
        }
        self.state = RunState::Requested;
        true
    }

    /// Moves `Requested -> InProgress` at 0 percent.
    ///
    /// # Errors
    /// Returns [`ProgressError::InvalidTransition`] unless requested.
    pub fn start(&mut self) -> Result<(), ProgressError> {
        self.expect_state(RunState::Requested, "start")?;
        self.state = RunState::InProgress;
        self.percent = 0;
        debug!(run_id = %self.id, "run started");
        Ok(())
    }

    /// Records the service outcome. Accepted once, while in progress.
    ///
    /// # Errors
    /// Returns [`ProgressError::InvalidTransition`] when not in progress and
    /// [`ProgressError::OutcomeAlreadyRecorded`] on a second call.
    pub fn record_outcome(&mut self, outcome: AnalysisOutcome) -> Result<(), ProgressError> {
        self.expect_state(RunState::InProgress, "record_outcome")?;
        if self.outcome.is_some() {
            return Err(ProgressError::OutcomeAlreadyRecorded(self.id));
        }
        self.outcome = Some(outcome);
        Ok(())
    }

    /// Moves progress toward `target`.
    ///
    /// Progress never decreases and stays at [`HOLD_PERCENT`] until the
    /// outcome is recorded. Reaching 100 completes the run.
    ///
    /// # Errors
    /// Returns [`ProgressError::InvalidTransition`] unless in progress.
    pub fn advance_to(&mut self, target: u8) -> Result<ProgressStep, ProgressError> {
        self.expect_state(RunState::InProgress, "advance")?;

        let ceiling = if self.outcome.is_some() { 100 } else { HOLD_PERCENT };
        let next = target.min(ceiling).max(self.percent);
        if next == self.percent {
            return Ok(ProgressStep::Holding {
                percent: self.percent,
            });
        }

        let before = self.phase();
        self.percent = next;
        if self.percent == 100 {
            self.state = RunState::Completed;
            debug!(run_id = %self.id, "run completed");
            return Ok(ProgressStep::Completed);
        }

        let after = self.phase();
        Ok(ProgressStep::Advanced {
            percent: self.percent,
            entered: (after != before).then_some(after),
        })
    }

    /// Jumps to the start of `phase` when the service reports a stage.
    ///
    /// Never moves backwards; a phase behind the current percentage leaves
    /// the run where it is.
    ///
    /// # Errors
    /// Same as [`Self::advance_to`].
    pub fn enter_phase(&mut self, phase: Phase) -> Result<ProgressStep, ProgressError> {
        self.advance_to(phase.lower_bound())
    }

    fn expect_state(&self, expected: RunState, action: &'static str) -> Result<(), ProgressError> {
        if self.state != expected {
            return Err(ProgressError::InvalidTransition {
                run: self.id,
                action,
                state: self.state,
            });
        }
        Ok(())
    }
}

/// Strategy choosing the next progress target on each tick.
pub trait Pacing: Send + Sync {
    /// Returns the percentage the run should move toward.
    fn next_target(&self, current: u8, outcome_ready: bool) -> u8;
}

/// Wall-clock simulation: a fixed step per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedPacing {
    step: u8,
}

impl SimulatedPacing {
    /// Creates pacing with `step` percent per tick, clamped to `1..=100`.
    pub fn new(step: u8) -> Self {
        Self {
            step: step.clamp(1, 100),
        }
    }

    /// Configured step.
    pub fn step(&self) -> u8 {
        self.step
    }
}

impl Default for SimulatedPacing {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Pacing for SimulatedPacing {
    fn next_target(&self, current: u8, _outcome_ready: bool) -> u8 {
        current.saturating_add(self.step).min(100)
    }
}

/// Follows the service: moves only through reported stages and finishes
/// once the outcome arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeDrivenPacing;

impl Pacing for OutcomeDrivenPacing {
    fn next_target(&self, current: u8, outcome_ready: bool) -> u8 {
        if outcome_ready { 100 } else { current }
    }
}

/// Run lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    /// Operation does not fit the current state.
    #[error("{run}: cannot {action} while {state:?}")]
    InvalidTransition {
        /// Run that refused the operation.
        run: RunId,
        /// Attempted operation.
        action: &'static str,
        /// State at the time.
        state: RunState,
    },
    /// Outcome recorded twice.
    #[error("{0}: outcome already recorded")]
    OutcomeAlreadyRecorded(RunId),
}
