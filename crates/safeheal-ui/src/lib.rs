#![warn(missing_docs)]
//! # safeheal-ui
//!
//! ## Purpose
//! Defines the read-only projections the presentation layer renders.
//!
//! ## Responsibilities
//! - Represent the workflow snapshot published after every transition.
//! - Project an analysis result into overview, technical, and first-aid
//!   views.
//! - Hold user-visible notices and the fixed copy of the workflow.
//!
//! ## Data flow
//! Session state -> [`WorkflowSnapshot`] -> rendered by the shell. A completed
//! outcome goes through [`project_results_panel`] into [`ResultsPanel`].
//!
//! ## Ownership and lifetimes
//! Snapshots own their data so the renderer can keep them across ticks
//! without borrowing the session.
//!
//! ## Error model
//! Projections cannot fail. Missing metrics render as "Not available" and a
//! failed analysis becomes an error notice.
//!
//! ## Security and privacy notes
//! Snapshots reference media by handle only.

use safeheal_acquisition::{CaptureAffordance, UnsupportedInput};
use safeheal_analysis_contract::{AnalysisOutcome, AnalysisResult, RiskLevel, TechnicalMetrics};
use safeheal_core::{CaptureMode, MediaHandle, MediaSubject};
use safeheal_progress::{Phase, RunState};

/// Shown where the media preview goes when no subject is active.
pub const PREVIEW_PLACEHOLDER: &str = "Preview will appear here";

/// Label attached to sample results.
pub const SAMPLE_RESULT_LABEL: &str =
    "Sample result: the analysis service is not connected, values are illustrative only";

/// Shown under the subject when the service produced no segmentation overlay.
pub const SEGMENTATION_PENDING_NOTICE: &str =
    "In the full version, AI wound segmentation would be displayed as an overlay";

/// Status line once a run completes.
pub const ANALYSIS_COMPLETE_TEXT: &str = "Analysis complete!";

/// Value rendered for absent metrics.
pub const NOT_AVAILABLE: &str = "Not available";

/// Number of recommendations promoted to the overview.
pub const KEY_RECOMMENDATION_COUNT: usize = 3;

/// Medical disclaimer shown alongside every result.
pub const MEDICAL_DISCLAIMER: &str = "SafeHeal is designed as a first aid assistant only. \
    Always seek professional medical help for serious injuries.";

/// Static guidance closing the first-aid view.
pub const WHEN_TO_SEEK_HELP: [&str; 6] = [
    "If bleeding cannot be controlled after 15 minutes of pressure",
    "If the wound is very deep, jagged, or gaping",
    "If there are signs of infection (increasing redness, warmth, swelling, pus)",
    "If you cannot properly clean the wound",
    "If the wound was caused by a rusty or dirty object",
    "If you haven't had a tetanus shot in the last 5 years",
];

/// Status line for a phase.
pub fn phase_status_text(phase: Phase) -> &'static str {
    match phase {
        Phase::Segmenting => "Segmenting wound area...",
        Phase::Classifying => "Classifying wound type...",
        Phase::Recommending => "Generating recommendations...",
        Phase::Finalizing => "Finalizing analysis...",
    }
}

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Neutral information.
    Info,
    /// Action succeeded.
    Success,
    /// Recoverable problem.
    Warning,
    /// Action failed.
    Error,
}

/// User-visible, transient message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity.
    pub level: NoticeLevel,
    /// Main message.
    pub message: String,
    /// Follow-up hint, if any.
    pub hint: Option<String>,
}

impl Notice {
    /// Creates a notice without hint.
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            hint: None,
        }
    }

    /// Adds a follow-up hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Notice for input the workflow cannot use.
pub fn unsupported_input_notice(input: &UnsupportedInput) -> Notice {
    match input {
        UnsupportedInput::LiveVideoCapture => Notice::new(
            NoticeLevel::Warning,
            "Live video capture is not supported.",
        )
        .with_hint("Please upload a video instead if you wish to use video."),
        UnsupportedInput::MediaType(detail) => Notice::new(
            NoticeLevel::Warning,
            format!("This file cannot be analyzed ({detail})."),
        )
        .with_hint("Upload a JPG or PNG image, or an MP4, MOV or AVI video."),
    }
}

/// Guidance attached to a risk level.
pub fn risk_guidance(level: RiskLevel) -> Option<Notice> {
    match level {
        RiskLevel::High => Some(Notice::new(
            NoticeLevel::Warning,
            "Seek immediate medical attention!",
        )),
        RiskLevel::Medium => Some(Notice::new(
            NoticeLevel::Info,
            "Consider consulting a healthcare provider",
        )),
        RiskLevel::Low => None,
    }
}

/// What the overview shows next to the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentationDisplay {
    /// Overlay produced by the service.
    Overlay(MediaHandle),
    /// Plain subject with an explanatory notice.
    Subject {
        /// Analyzed media.
        handle: MediaHandle,
        /// Notice shown under it.
        notice: &'static str,
    },
    /// Nothing to show.
    None,
}

/// Overview tab.
#[derive(Debug, Clone, PartialEq)]
pub struct OverviewView {
    /// Wound type.
    pub wound_class: String,
    /// Risk level.
    pub risk_level: RiskLevel,
    /// Guidance for the risk level.
    pub risk_guidance: Option<Notice>,
    /// First few recommendations.
    pub key_recommendations: Vec<String>,
    /// Natural-language assessment.
    pub assessment: String,
    /// Segmentation area.
    pub segmentation: SegmentationDisplay,
}

/// Technical tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TechnicalView {
    /// Wound area, e.g. `3.2 cm²`.
    pub wound_area: String,
    /// Depth estimate.
    pub depth_estimate: String,
    /// Infection risk, e.g. `18%`.
    pub infection_risk: String,
    /// Classifier confidence in whole percent.
    pub confidence_percent: Option<u8>,
    /// `(feature, assessment)` rows.
    pub characteristics: Vec<(String, String)>,
}

/// First-aid tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstAidView {
    /// Numbered instructions.
    pub steps: Vec<String>,
    /// When to seek medical help.
    pub when_to_seek_help: Vec<&'static str>,
}

/// The three result views.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultViews {
    /// Overview tab.
    pub overview: OverviewView,
    /// Technical tab.
    pub technical: TechnicalView,
    /// First-aid tab.
    pub first_aid: FirstAidView,
    /// Label when the values are the sample.
    pub sample_label: Option<&'static str>,
}

/// Results area of the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsPanel {
    /// Nothing requested.
    Hidden,
    /// Run requested or in progress.
    Progress {
        /// Percentage in `0..=100`.
        percent: u8,
        /// Current phase.
        phase: Phase,
        /// Status line.
        status_text: &'static str,
    },
    /// Completed with a result to show.
    Ready(Box<ResultViews>),
    /// Completed with a service failure.
    Failed(Notice),
}

/// Projects one result into the three views.
pub fn project_result_views(
    result: &AnalysisResult,
    subject: Option<&MediaHandle>,
    is_sample: bool,
) -> ResultViews {
    let segmentation = match (&result.segmentation_overlay, subject) {
        (Some(overlay), _) => SegmentationDisplay::Overlay(overlay.clone()),
        (None, Some(handle)) => SegmentationDisplay::Subject {
            handle: handle.clone(),
            notice: SEGMENTATION_PENDING_NOTICE,
        },
        (None, None) => SegmentationDisplay::None,
    };

    ResultViews {
        overview: OverviewView {
            wound_class: result.wound_class.clone(),
            risk_level: result.risk_level,
            risk_guidance: risk_guidance(result.risk_level),
            key_recommendations: result
                .recommendations
                .iter()
                .take(KEY_RECOMMENDATION_COUNT)
                .cloned()
                .collect(),
            assessment: result.explanation.clone(),
            segmentation,
        },
        technical: project_technical(result.technical.as_ref()),
        first_aid: FirstAidView {
            steps: result
                .recommendations
                .iter()
                .enumerate()
                .map(|(index, rec)| format!("Step {}: {rec}", index + 1))
                .collect(),
            when_to_seek_help: WHEN_TO_SEEK_HELP.to_vec(),
        },
        sample_label: is_sample.then_some(SAMPLE_RESULT_LABEL),
    }
}

fn project_technical(metrics: Option<&TechnicalMetrics>) -> TechnicalView {
    let Some(metrics) = metrics else {
        return TechnicalView {
            wound_area: NOT_AVAILABLE.to_string(),
            depth_estimate: NOT_AVAILABLE.to_string(),
            infection_risk: NOT_AVAILABLE.to_string(),
            confidence_percent: None,
            characteristics: Vec::new(),
        };
    };

    TechnicalView {
        wound_area: metrics
            .wound_area_cm2
            .map_or_else(|| NOT_AVAILABLE.to_string(), |area| format!("{area:.1} cm²")),
        depth_estimate: metrics
            .depth_estimate
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        infection_risk: metrics
            .infection_risk_percent
            .map_or_else(|| NOT_AVAILABLE.to_string(), |risk| format!("{risk}%")),
        confidence_percent: metrics
            .classification_confidence
            .map(|confidence| (confidence.clamp(0.0, 1.0) * 100.0).round() as u8),
        characteristics: metrics
            .characteristics
            .iter()
            .map(|row| (row.feature.clone(), row.assessment.clone()))
            .collect(),
    }
}

/// Projects a completed outcome into the results panel.
///
/// Missing payloads show the labelled sample; failures show an error notice
/// and no values.
pub fn project_results_panel(
    outcome: &AnalysisOutcome,
    subject: Option<&MediaHandle>,
) -> ResultsPanel {
    match outcome {
        AnalysisOutcome::Failed(reason) => ResultsPanel::Failed(
            Notice::new(NoticeLevel::Error, "Analysis failed. No results are available.")
                .with_hint(format!("{reason}. Start a new analysis to try again.")),
        ),
        AnalysisOutcome::Delivered(result) => {
            ResultsPanel::Ready(Box::new(project_result_views(result, subject, false)))
        }
        AnalysisOutcome::Missing => ResultsPanel::Ready(Box::new(project_result_views(
            &AnalysisResult::sample(),
            subject,
            true,
        ))),
    }
}

/// Read-only state published after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    /// Application version.
    pub version: String,
    /// Selected capture mode.
    pub capture_mode: CaptureMode,
    /// Capture affordance for the mode and camera toggle.
    pub capture_affordance: CaptureAffordance,
    /// Active subject, if any.
    pub active_subject: Option<MediaSubject>,
    /// Whether the trigger gate would accept a request now.
    pub can_request_analysis: bool,
    /// Run state; `Idle` when no run exists.
    pub run_state: RunState,
    /// Mirrors `run_state == Requested | InProgress | Completed`.
    pub analysis_requested: bool,
    /// Mirrors `run_state == InProgress`.
    pub analysis_in_progress: bool,
    /// Mirrors `run_state == Completed`.
    pub analysis_complete: bool,
    /// Results area.
    pub results: ResultsPanel,
    /// Whether the technical view should be expanded.
    pub show_technical: bool,
    /// Pending notices, oldest first.
    pub notices: Vec<Notice>,
}

impl WorkflowSnapshot {
    /// Returns the neutral placeholder text when no subject is active.
    pub fn preview_placeholder(&self) -> Option<&'static str> {
        self.active_subject.is_none().then_some(PREVIEW_PLACEHOLDER)
    }

    /// Returns progress percentage and phase while a run is active.
    pub fn progress(&self) -> Option<(u8, Phase)> {
        match self.results {
            ResultsPanel::Progress { percent, phase, .. } => Some((percent, phase)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for result projections.

    use super::*;

    #[test]
    fn sample_overview_promotes_three_recommendations_and_medium_guidance() {
        let views = project_result_views(&AnalysisResult::sample(), None, true);

        assert_eq!(views.overview.key_recommendations.len(), 3);
        assert_eq!(
            views.overview.risk_guidance.unwrap().message,
            "Consider consulting a healthcare provider"
        );
        assert_eq!(views.first_aid.steps.len(), 5);
        assert!(views.first_aid.steps[0].starts_with("Step 1: "));
        assert_eq!(views.sample_label, Some(SAMPLE_RESULT_LABEL));
    }

    #[test]
    fn sample_technical_view_formats_metrics() {
        let views = project_result_views(&AnalysisResult::sample(), None, true);

        assert_eq!(views.technical.wound_area, "3.2 cm²");
        assert_eq!(views.technical.infection_risk, "18%");
        assert_eq!(views.technical.confidence_percent, Some(87));
        assert_eq!(views.technical.characteristics.len(), 5);
    }
}
