//! Integration tests for analysis outcome classification.

use safeheal_analysis_contract::{
    AnalysisDepth, AnalysisOutcome, AnalysisRequest, AnalysisResult, AnalysisService,
    CallContext, CollaboratorError, OfflineAnalysisService, TechnicalMetrics,
};
use safeheal_core::{MediaHandle, MediaKind};

fn request() -> AnalysisRequest {
    AnalysisRequest {
        handle: MediaHandle::new("upload-1").unwrap(),
        kind: MediaKind::Image,
        depth: AnalysisDepth::Standard,
    }
}

#[test]
fn outcome_classification_tests_offline_service_reports_missing_payload() {
    let outcome =
        AnalysisOutcome::from(OfflineAnalysisService.analyze(&request(), &CallContext::detached()));
    assert_eq!(outcome, AnalysisOutcome::Missing);
}

#[test]
fn outcome_classification_tests_delivered_payload_is_not_sample() {
    let mut result = AnalysisResult::sample();
    result.wound_class = "Puncture".to_string();

    let outcome = AnalysisOutcome::from(Ok(Some(result)));
    let (displayed, is_sample) = outcome.displayed_result().unwrap();
    assert!(!is_sample);
    assert_eq!(displayed.wound_class, "Puncture");
}

#[test]
fn outcome_classification_tests_out_of_range_confidence_fails_delivery() {
    let result = AnalysisResult {
        technical: Some(TechnicalMetrics {
            classification_confidence: Some(1.4),
            ..TechnicalMetrics::default()
        }),
        ..AnalysisResult::sample()
    };

    let outcome = AnalysisOutcome::from(Ok(Some(result)));
    assert!(outcome.is_failed());
    assert!(outcome.displayed_result().is_none());
}

#[test]
fn outcome_classification_tests_cancelled_call_is_a_failure() {
    let outcome = AnalysisOutcome::from(Err(CollaboratorError::Cancelled));
    assert_eq!(
        outcome,
        AnalysisOutcome::Failed("collaborator call cancelled".to_string())
    );
}

#[test]
fn outcome_classification_tests_failure_keeps_reason() {
    let outcome = AnalysisOutcome::from(Err(CollaboratorError::Unavailable(
        "segmentation model not loaded".to_string(),
    )));
    match outcome {
        AnalysisOutcome::Failed(reason) => assert!(reason.contains("segmentation model")),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn outcome_classification_tests_depth_names_parse_case_insensitively() {
    assert_eq!(AnalysisDepth::parse("DETAILED"), Some(AnalysisDepth::Detailed));
    assert_eq!(AnalysisDepth::parse(" basic "), Some(AnalysisDepth::Basic));
    assert_eq!(AnalysisDepth::parse("extreme"), None);
}
