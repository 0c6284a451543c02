#![warn(missing_docs)]
//! # safeheal-analysis-contract
//!
//! ## Purpose
//! Defines the analysis result schema and the contracts of the external
//! collaborators (analysis service, report exporter, record store).
//!
//! ## Responsibilities
//! - Parse versioned analysis result payloads.
//! - Provide the fixed, clearly labelled sample result used when no service
//!   payload exists.
//! - Classify a service call into delivered / missing / failed outcomes.
//! - Derive a deterministic record key for persistence deduplication.
//!
//! ## Data flow
//! [`AnalysisRequest`] -> [`AnalysisService::analyze`] -> [`AnalysisOutcome`]
//! -> results projection. Completed results flow to [`ReportExporter`] and
//! [`RecordStore`]. Every collaborator call receives a [`CallContext`] carrying
//! the run's cancellation token; analysis calls may also report the
//! [`AnalysisStage`] they are entering.
//!
//! ## Ownership and lifetimes
//! Results are owned structs so they outlive the worker task that produced
//! them.
//!
//! ## Error model
//! Invalid JSON or blank mandatory fields return [`AnalysisContractError`].
//! Collaborators report [`CollaboratorError`]; a failed analysis is kept
//! distinct from an analysis that produced no payload. A delivered payload
//! that violates the contract is classified as failed.
//!
//! ## Security and privacy notes
//! Results describe a wound and count as health data. They are never logged;
//! only the record key is.

use std::fmt;

use safeheal_core::{MediaHandle, MediaKind};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Canonical schema version for the analysis result contract.
pub const ANALYSIS_SCHEMA_VERSION_V1: &str = "v1";

/// Wound class of the sample result.
pub const SAMPLE_WOUND_CLASS: &str = "Laceration (Cut)";

/// Risk level reported for a wound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Home care is usually enough.
    Low,
    /// A healthcare provider should be considered.
    Medium,
    /// Immediate medical attention.
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => f.write_str("Low"),
            Self::Medium => f.write_str("Medium"),
            Self::High => f.write_str("High"),
        }
    }
}

/// One row of the wound characteristics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WoundCharacteristic {
    /// Feature name, for example `Edges`.
    pub feature: String,
    /// Assessment text.
    pub assessment: String,
}

/// Optional technical metrics attached to a result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechnicalMetrics {
    /// Segmented wound area in square centimetres.
    #[serde(default)]
    pub wound_area_cm2: Option<f32>,
    /// Coarse depth estimate.
    #[serde(default)]
    pub depth_estimate: Option<String>,
    /// Infection risk in percent.
    #[serde(default)]
    pub infection_risk_percent: Option<u8>,
    /// Classifier confidence in [0.0, 1.0].
    #[serde(default)]
    pub classification_confidence: Option<f32>,
    /// Characteristics table.
    #[serde(default)]
    pub characteristics: Vec<WoundCharacteristic>,
}

/// Structured result produced by the external analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Result schema version.
    pub schema_version: String,
    /// Wound type label.
    pub wound_class: String,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Ordered first-aid recommendations.
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Natural-language assessment.
    #[serde(default)]
    pub explanation: String,
    /// Handle of a segmentation overlay rendered by the media layer.
    #[serde(default)]
    pub segmentation_overlay: Option<MediaHandle>,
    /// Technical metrics.
    #[serde(default)]
    pub technical: Option<TechnicalMetrics>,
}

impl AnalysisResult {
    /// Fixed sample result shown when the analysis service is not wired up.
    pub fn sample() -> Self {
        Self {
            schema_version: ANALYSIS_SCHEMA_VERSION_V1.to_string(),
            wound_class: SAMPLE_WOUND_CLASS.to_string(),
            risk_level: RiskLevel::Medium,
            recommendations: [
                "Clean the wound with mild soap and water",
                "Apply gentle pressure with a clean cloth to stop bleeding",
                "Apply antibiotic ointment if available",
                "Cover with a sterile bandage",
                "Seek medical attention if the cut is deep or shows signs of infection",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            explanation: "This appears to be a laceration with moderate depth. There is minimal \
                tissue damage visible, but proper cleaning and dressing is recommended to prevent \
                infection. The edges of the wound are relatively clean which suggests good \
                healing potential with appropriate care."
                .to_string(),
            segmentation_overlay: None,
            technical: Some(TechnicalMetrics {
                wound_area_cm2: Some(3.2),
                depth_estimate: Some("Medium".to_string()),
                infection_risk_percent: Some(18),
                classification_confidence: Some(0.87),
                characteristics: [
                    ("Edges", "Clean, slightly irregular"),
                    ("Tissue Loss", "Minimal"),
                    ("Bleeding", "Controlled"),
                    ("Contamination", "Low-Medium"),
                    ("Inflammation", "Minimal"),
                ]
                .into_iter()
                .map(|(feature, assessment)| WoundCharacteristic {
                    feature: feature.to_string(),
                    assessment: assessment.to_string(),
                })
                .collect(),
            }),
        }
    }
}

/// Requested level of analysis detail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisDepth {
    /// Classification and risk only.
    Basic,
    /// Classification, risk, and recommendations.
    #[default]
    Standard,
    /// Everything including technical metrics.
    Detailed,
}

impl AnalysisDepth {
    /// Parses a case-insensitive depth name.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Self::Basic),
            "standard" => Some(Self::Standard),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }
}

/// Input handed to the analysis service once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Handle of the active subject.
    pub handle: MediaHandle,
    /// Kind of the active subject.
    pub kind: MediaKind,
    /// Requested detail level.
    pub depth: AnalysisDepth,
}

/// Pipeline stage an analysis service reports as it starts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisStage {
    /// Segmentation model call.
    Segmentation,
    /// Classification model call.
    Classification,
    /// Recommendation generation.
    Recommendation,
    /// Assembling the final result.
    Finalization,
}

/// Per-call context handed to every collaborator.
///
/// Carries the cancellation token of the owning run. Long calls should check
/// [`CallContext::is_cancelled`] between steps and return
/// [`CollaboratorError::Cancelled`] once it fires.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: CancellationToken,
    stages: Option<mpsc::UnboundedSender<AnalysisStage>>,
}

impl CallContext {
    /// Creates a context bound to `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            stages: None,
        }
    }

    /// Creates a context that is never cancelled and drops stage reports.
    pub fn detached() -> Self {
        Self::new(CancellationToken::new())
    }

    /// Attaches the channel that receives stage reports.
    pub fn with_stage_sink(mut self, stages: mpsc::UnboundedSender<AnalysisStage>) -> Self {
        self.stages = Some(stages);
        self
    }

    /// Returns `true` once the owning run was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Returns the cancellation token for async collaborators.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fails with [`CollaboratorError::Cancelled`] once the run was cancelled.
    ///
    /// # Errors
    /// Returns [`CollaboratorError::Cancelled`] after cancellation.
    pub fn ensure_active(&self) -> Result<(), CollaboratorError> {
        if self.is_cancelled() {
            Err(CollaboratorError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Reports that the service entered `stage`.
    ///
    /// Reports after the run was dropped are discarded.
    pub fn report_stage(&self, stage: AnalysisStage) {
        if let Some(stages) = &self.stages {
            let _ = stages.send(stage);
        }
    }
}

/// External wound analysis service.
pub trait AnalysisService: Send + Sync {
    /// Analyzes one media item.
    ///
    /// `Ok(None)` means the service ran but produced no payload.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when the service failed or was
    /// cancelled.
    fn analyze(
        &self,
        request: &AnalysisRequest,
        context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError>;
}

/// External PDF report renderer.
pub trait ReportExporter: Send + Sync {
    /// Exports a report for a completed result.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when export failed.
    fn export_report(
        &self,
        result: &AnalysisResult,
        context: &CallContext,
    ) -> Result<(), CollaboratorError>;
}

/// External health-record store.
pub trait RecordStore: Send + Sync {
    /// Persists a completed result under a deduplication key.
    ///
    /// # Errors
    /// Returns [`CollaboratorError`] when persistence failed.
    fn persist(
        &self,
        record_key: &str,
        result: &AnalysisResult,
        context: &CallContext,
    ) -> Result<(), CollaboratorError>;
}

/// Analysis service stand-in used when no model backend is configured.
///
/// Always reports "no payload", which makes the results view fall back to
/// the sample result.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineAnalysisService;

impl AnalysisService for OfflineAnalysisService {
    fn analyze(
        &self,
        _request: &AnalysisRequest,
        _context: &CallContext,
    ) -> Result<Option<AnalysisResult>, CollaboratorError> {
        Ok(None)
    }
}

/// Final classification of one analysis service call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// Service returned a payload.
    Delivered(AnalysisResult),
    /// Service ran without producing a payload.
    Missing,
    /// Service signalled failure.
    Failed(String),
}

impl AnalysisOutcome {
    /// Returns the result to display and whether it is the sample.
    ///
    /// Returns `None` for failed runs: failures show a notice, never sample
    /// values.
    pub fn displayed_result(&self) -> Option<(AnalysisResult, bool)> {
        match self {
            Self::Delivered(result) => Some((result.clone(), false)),
            Self::Missing => Some((AnalysisResult::sample(), true)),
            Self::Failed(_) => None,
        }
    }

    /// Returns `true` for failed runs.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl From<Result<Option<AnalysisResult>, CollaboratorError>> for AnalysisOutcome {
    fn from(value: Result<Option<AnalysisResult>, CollaboratorError>) -> Self {
        match value {
            Ok(Some(result)) => match validate_analysis_result(&result) {
                Ok(()) => Self::Delivered(result),
                Err(error) => Self::Failed(error.to_string()),
            },
            Ok(None) => Self::Missing,
            Err(error) => Self::Failed(error.to_string()),
        }
    }
}

/// Parses raw JSON into a validated analysis result.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] for invalid JSON.
/// Returns [`AnalysisContractError::InvalidContract`] when mandatory contract
/// fields are blank.
pub fn parse_analysis_result(raw: &str) -> Result<AnalysisResult, AnalysisContractError> {
    let parsed: AnalysisResult =
        serde_json::from_str(raw).map_err(AnalysisContractError::Decode)?;
    validate_analysis_result(&parsed)?;
    Ok(parsed)
}

/// Checks the contract invariants of a result built in memory.
///
/// # Errors
/// Returns [`AnalysisContractError::InvalidContract`] for a blank schema
/// version or wound class, or a confidence outside [0, 1].
pub fn validate_analysis_result(parsed: &AnalysisResult) -> Result<(), AnalysisContractError> {
    if parsed.schema_version.trim().is_empty() {
        return Err(AnalysisContractError::InvalidContract(
            "schema_version is empty".to_string(),
        ));
    }

    if parsed.wound_class.trim().is_empty() {
        return Err(AnalysisContractError::InvalidContract(
            "wound_class is empty".to_string(),
        ));
    }

    if let Some(confidence) = parsed
        .technical
        .as_ref()
        .and_then(|metrics| metrics.classification_confidence)
        && !(0.0..=1.0).contains(&confidence)
    {
        return Err(AnalysisContractError::InvalidContract(format!(
            "classification_confidence {confidence} outside [0, 1]"
        )));
    }

    Ok(())
}

/// Computes the persistence deduplication key for a result.
///
/// SHA-256 over the canonical JSON encoding, hex encoded. Identical results
/// always share a key.
///
/// # Errors
/// Returns [`AnalysisContractError::Decode`] when the result cannot be
/// encoded.
pub fn record_key(result: &AnalysisResult) -> Result<String, AnalysisContractError> {
    let encoded = serde_json::to_vec(result)?;
    Ok(hex::encode(Sha256::digest(&encoded)))
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Collaborator is not reachable or not configured.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    /// Collaborator ran and failed.
    #[error("collaborator failed: {0}")]
    Failed(String),
    /// Call stopped because its run was cancelled.
    #[error("collaborator call cancelled")]
    Cancelled,
}

/// Analysis contract errors.
#[derive(Debug, Error)]
pub enum AnalysisContractError {
    /// JSON encode or decode failure.
    #[error("analysis decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed payload violates contract invariants.
    #[error("analysis contract violation: {0}")]
    InvalidContract(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for outcome classification and defaults.

    use super::*;

    #[test]
    fn missing_payload_displays_labelled_sample() {
        let (result, is_sample) = AnalysisOutcome::Missing
            .displayed_result()
            .expect("missing payload should fall back to sample");
        assert!(is_sample);
        assert_eq!(result.wound_class, SAMPLE_WOUND_CLASS);
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.recommendations.len(), 5);
    }

    #[test]
    fn failure_never_displays_sample() {
        let outcome = AnalysisOutcome::from(Err(CollaboratorError::Failed("gpu oom".to_string())));
        assert!(outcome.is_failed());
        assert!(outcome.displayed_result().is_none());
    }

    #[test]
    fn delivered_blank_class_is_classified_as_failed() {
        let blank = AnalysisResult {
            wound_class: "  ".to_string(),
            ..AnalysisResult::sample()
        };
        match AnalysisOutcome::from(Ok(Some(blank))) {
            AnalysisOutcome::Failed(reason) => assert!(reason.contains("wound_class")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn context_reports_cancellation_and_stages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let context = CallContext::new(token.clone()).with_stage_sink(tx);

        context.report_stage(AnalysisStage::Classification);
        assert!(context.ensure_active().is_ok());
        token.cancel();

        assert_eq!(context.ensure_active(), Err(CollaboratorError::Cancelled));
        assert_eq!(rx.try_recv().ok(), Some(AnalysisStage::Classification));
        CallContext::detached().report_stage(AnalysisStage::Finalization);
    }

    #[test]
    fn record_key_is_stable_hex_sha256() {
        let key_a = record_key(&AnalysisResult::sample()).unwrap();
        let key_b = record_key(&AnalysisResult::sample()).unwrap();
        assert_eq!(key_a, key_b);
        assert_eq!(key_a.len(), 64);
        assert!(key_a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
