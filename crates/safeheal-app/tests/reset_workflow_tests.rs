//! Integration tests for "new analysis" and cancellation of pending work.

mod common;

use std::time::Duration;

use common::{
    CooperativeService, GatedService, ScriptedService, capture_cycle, completions, drive_ticks,
    drive_until_settled, runtime_with,
};
use safeheal_acquisition::CaptureAffordance;
use safeheal_analysis_contract::SAMPLE_WOUND_CLASS;
use safeheal_app::GateDecision;
use safeheal_core::CaptureMode;
use safeheal_progress::{RunId, RunState};
use safeheal_ui::{ResultsPanel, SAMPLE_RESULT_LABEL};

#[tokio::test]
async fn reset_workflow_tests_sample_result_then_new_analysis() {
    let service = ScriptedService::new(Ok(None));
    let mut runtime = runtime_with(service);
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();
    drive_until_settled(&mut runtime).await;

    let completed = runtime.snapshot();
    let ResultsPanel::Ready(views) = &completed.results else {
        panic!("expected ready results, got {:?}", completed.results);
    };
    assert_eq!(views.overview.wound_class, SAMPLE_WOUND_CLASS);
    assert_eq!(views.sample_label, Some(SAMPLE_RESULT_LABEL));
    assert_eq!(views.technical.wound_area, "3.2 cm²");

    assert_eq!(runtime.reset_workflow(), Some(RunId(1)));
    let reset = runtime.snapshot();
    assert_eq!(reset.run_state, RunState::Idle);
    assert_eq!(reset.results, ResultsPanel::Hidden);
    assert_eq!(
        reset.active_subject.map(|subject| subject.handle.to_string()),
        Some("capture-1".to_string())
    );
    assert!(reset.can_request_analysis);
}

#[tokio::test]
async fn reset_workflow_tests_reset_is_idempotent() {
    let service = ScriptedService::new(Ok(None));
    let mut runtime = runtime_with(service);
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();
    drive_until_settled(&mut runtime).await;

    assert!(runtime.reset_workflow().is_some());
    let once = runtime.snapshot();
    assert_eq!(runtime.reset_workflow(), None);
    assert_eq!(runtime.snapshot(), once);
}

#[tokio::test]
async fn reset_workflow_tests_next_request_gets_fresh_run() {
    let service = ScriptedService::new(Ok(None));
    let mut runtime = runtime_with(service.clone());
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();
    drive_until_settled(&mut runtime).await;
    runtime.reset_workflow();

    assert_eq!(runtime.request_analysis(), GateDecision::Requested(RunId(2)));
    let events = drive_until_settled(&mut runtime).await;
    assert_eq!(completions(&events), 1);
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn reset_workflow_tests_pending_outcome_never_reaches_reset_session() {
    let service = GatedService::new();
    let mut runtime = runtime_with(service.clone());
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();

    let before_reset = drive_ticks(&mut runtime, 20).await;
    assert_eq!(completions(&before_reset), 0);
    assert_eq!(runtime.snapshot().progress().map(|(p, _)| p), Some(99));

    runtime.reset_workflow();
    service.release();
    let after_reset = drive_ticks(&mut runtime, 20).await;

    assert!(after_reset.is_empty());
    assert_eq!(runtime.snapshot().run_state, RunState::Idle);
    assert_eq!(service.calls(), 1);
}

#[tokio::test]
async fn reset_workflow_tests_teardown_returns_to_first_visit() {
    let service = ScriptedService::new(Ok(None));
    let mut runtime = runtime_with(service);
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();
    drive_until_settled(&mut runtime).await;

    runtime.teardown();
    let snapshot = runtime.snapshot();
    assert!(snapshot.active_subject.is_none());
    assert!(snapshot.preview_placeholder().is_some());
    assert_eq!(snapshot.run_state, RunState::Idle);
    assert!(snapshot.notices.is_empty());
    assert_eq!(runtime.request_analysis(), GateDecision::NoActiveSubject);
}

#[tokio::test]
async fn reset_workflow_tests_reset_stops_running_service_call() {
    let service = CooperativeService::new();
    let mut runtime = runtime_with(service.clone());
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();

    for _ in 0..100 {
        if service.started() {
            break;
        }
        drive_ticks(&mut runtime, 1).await;
    }
    assert!(service.started());

    runtime.reset_workflow();
    for _ in 0..100 {
        if service.stopped_early() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(service.stopped_early());
    assert!(!service.finished());
    assert!(drive_ticks(&mut runtime, 5).await.is_empty());
    assert_eq!(runtime.snapshot().run_state, RunState::Idle);
}

#[tokio::test]
async fn reset_workflow_tests_teardown_mid_progress_cancels_pending_work() {
    let service = GatedService::new();
    let mut runtime = runtime_with(service.clone());
    runtime.submit_media(capture_cycle("capture-1"));
    runtime.request_analysis();
    runtime.select_capture_mode(CaptureMode::Video);

    drive_ticks(&mut runtime, 5).await;
    assert_eq!(runtime.snapshot().run_state, RunState::InProgress);

    assert_eq!(runtime.teardown(), Some(RunId(1)));
    service.release();
    let after_teardown = drive_ticks(&mut runtime, 20).await;

    assert!(after_teardown.is_empty());
    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.run_state, RunState::Idle);
    assert!(snapshot.active_subject.is_none());
    assert_eq!(snapshot.capture_mode, CaptureMode::Image);
    assert_eq!(snapshot.capture_affordance, CaptureAffordance::Offer);
    assert!(snapshot.notices.is_empty());
    assert!(runtime.is_settled());
    assert_eq!(service.calls(), 1);
}
