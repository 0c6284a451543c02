//! Integration tests for environment-driven workflow configuration.

use std::time::Duration;

use safeheal_analysis_contract::AnalysisDepth;
use safeheal_app::{
    ENV_ANALYSIS_DEPTH, ENV_ANALYSIS_ENABLED, ENV_PROGRESS_STEP, ENV_TICK_INTERVAL_MS,
    WorkflowConfig,
};

#[test]
fn workflow_config_tests_disables_analysis_when_env_is_false() {
    // Safety:
    // - Integration tests mutate process env in a single-threaded test body.
    // - We reset the variable before returning.
    unsafe { std::env::set_var(ENV_ANALYSIS_ENABLED, "false") };
    assert!(!WorkflowConfig::from_env().analysis_enabled);

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_ANALYSIS_ENABLED, "OFF") };
    assert!(!WorkflowConfig::from_env().analysis_enabled);

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_ANALYSIS_ENABLED, "true") };
    assert!(WorkflowConfig::from_env().analysis_enabled);

    // Safety: see rationale above.
    unsafe { std::env::remove_var(ENV_ANALYSIS_ENABLED) };
    assert!(WorkflowConfig::from_env().analysis_enabled);
}

#[test]
fn workflow_config_tests_reads_pacing_and_depth_from_lookup() {
    let config = WorkflowConfig::from_lookup(|key| match key {
        ENV_PROGRESS_STEP => Some("25".to_string()),
        ENV_TICK_INTERVAL_MS => Some("5".to_string()),
        ENV_ANALYSIS_DEPTH => Some("basic".to_string()),
        _ => None,
    });

    assert_eq!(config.progress_step, 25);
    assert_eq!(config.tick_interval, Duration::from_millis(5));
    assert_eq!(config.analysis_depth, AnalysisDepth::Basic);
    assert!(config.analysis_enabled);
}
