#![warn(missing_docs)]
//! # safeheal-app
//!
//! ## Purpose
//! Orchestrates acquisition, the analysis trigger gate, progress pacing and
//! results projection for one SafeHeal session.
//!
//! ## Responsibilities
//! - Hold per-session state explicitly in [`WorkflowSession`].
//! - Gate analysis requests so a run is created at most once per request.
//! - Drive runs asynchronously in [`WorkflowRuntime`] with cancellation on
//!   reset.
//! - Delegate report export and record persistence to collaborators.
//! - Load [`WorkflowConfig`] from the environment.
//!
//! ## Data flow
//! Interaction cycle -> acquisition selector -> trigger gate -> analysis
//! service (blocking pool) -> run outcome -> paced progress -> snapshot.
//!
//! ## Ownership and lifetimes
//! The session is owned by one runtime and mutated only from the ticking
//! thread. Spawned work receives owned requests and reports back through
//! oneshot channels.
//!
//! ## Error model
//! User-facing problems become notices, never errors. [`AppError`] is
//! reserved for broken invariants, unreadable media files and a missing
//! tokio runtime.
//!
//! ## Security and privacy notes
//! - Media bytes never enter the session; only opaque handles do.
//! - Logs carry handles and run ids, never result contents.
//!
//! ## Example
//! ```
//! use safeheal_app::{GateDecision, WorkflowConfig, WorkflowSession};
//!
//! let mut session = WorkflowSession::new(WorkflowConfig::default());
//! assert_eq!(session.request_analysis(), GateDecision::NoActiveSubject);
//! ```

mod config;
mod runtime;
mod session;

use safeheal_acquisition::AcquisitionError;
use safeheal_analysis_contract::AnalysisContractError;
use safeheal_core::CoreError;
use safeheal_progress::ProgressError;
use thiserror::Error;

pub use config::{
    ENV_ANALYSIS_DEPTH, ENV_ANALYSIS_ENABLED, ENV_PROGRESS_STEP, ENV_SHOW_TECHNICAL,
    ENV_TICK_INTERVAL_MS, WorkflowConfig,
};
pub use runtime::{UnavailableCollaborator, WorkflowEvent, WorkflowRuntime};
pub use session::{
    ActionIntent, CollaboratorAction, GateDecision, MAX_PENDING_NOTICES, SubmitOutcome,
    WorkflowSession,
};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("SAFEHEAL_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Media model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Media ingestion error.
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),
    /// Run lifecycle invariant violated.
    #[error("progress error: {0}")]
    Progress(#[from] ProgressError),
    /// Analysis payload error.
    #[error("analysis error: {0}")]
    Analysis(#[from] AnalysisContractError),
    /// Media file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// No tokio runtime to spawn onto.
    #[error("no async runtime: {0}")]
    NoRuntime(String),
}
