//! Environment-driven workflow configuration.
//!
//! Every variable is optional. Unset or malformed values fall back to the
//! defaults; malformed ones are logged.

use std::time::Duration;

use safeheal_analysis_contract::AnalysisDepth;
use tracing::warn;

/// Kill switch for the trigger gate.
pub const ENV_ANALYSIS_ENABLED: &str = "SAFEHEAL_ANALYSIS_ENABLED";
/// Percent advanced per simulated tick.
pub const ENV_PROGRESS_STEP: &str = "SAFEHEAL_PROGRESS_STEP";
/// Milliseconds between ticks.
pub const ENV_TICK_INTERVAL_MS: &str = "SAFEHEAL_TICK_INTERVAL_MS";
/// Requested analysis depth.
pub const ENV_ANALYSIS_DEPTH: &str = "SAFEHEAL_ANALYSIS_DEPTH";
/// Whether the technical view starts expanded.
pub const ENV_SHOW_TECHNICAL: &str = "SAFEHEAL_SHOW_TECHNICAL";

const DEFAULT_PROGRESS_STEP: u8 = 1;
const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

/// Workflow settings for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// When `false` the trigger gate refuses every request.
    pub analysis_enabled: bool,
    /// Percent per simulated tick, `1..=100`.
    pub progress_step: u8,
    /// Delay between ticks.
    pub tick_interval: Duration,
    /// Depth passed to the analysis service.
    pub analysis_depth: AnalysisDepth,
    /// Technical view preference.
    pub show_technical: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            analysis_enabled: true,
            progress_step: DEFAULT_PROGRESS_STEP,
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            analysis_depth: AnalysisDepth::default(),
            show_technical: false,
        }
    }
}

impl WorkflowConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let analysis_enabled = lookup(ENV_ANALYSIS_ENABLED)
            .map_or(defaults.analysis_enabled, |raw| switch_enabled(&raw));

        let show_technical = lookup(ENV_SHOW_TECHNICAL)
            .map_or(defaults.show_technical, |raw| switch_enabled(&raw));

        let progress_step = match lookup(ENV_PROGRESS_STEP) {
            Some(raw) => match raw.trim().parse::<u8>() {
                Ok(step) if (1..=100).contains(&step) => step,
                _ => {
                    warn!(key = ENV_PROGRESS_STEP, value = %raw, "ignoring invalid value");
                    defaults.progress_step
                }
            },
            None => defaults.progress_step,
        };

        let tick_interval = match lookup(ENV_TICK_INTERVAL_MS) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    warn!(key = ENV_TICK_INTERVAL_MS, value = %raw, "ignoring invalid value");
                    defaults.tick_interval
                }
            },
            None => defaults.tick_interval,
        };

        let analysis_depth = match lookup(ENV_ANALYSIS_DEPTH) {
            Some(raw) => AnalysisDepth::parse(&raw).unwrap_or_else(|| {
                warn!(key = ENV_ANALYSIS_DEPTH, value = %raw, "ignoring invalid value");
                defaults.analysis_depth
            }),
            None => defaults.analysis_depth,
        };

        Self {
            analysis_enabled,
            progress_step,
            tick_interval,
            analysis_depth,
            show_technical,
        }
    }
}

/// Switch semantics shared by boolean variables.
///
/// `0`, `false`, `off`, `no` (case-insensitive) disable; anything else
/// enables.
fn switch_enabled(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    !matches!(normalized.as_str(), "0" | "false" | "off" | "no")
}

#[cfg(test)]
mod tests {
    //! Unit tests for environment parsing.

    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(WorkflowConfig::from_lookup(|_| None), WorkflowConfig::default());
    }

    #[test]
    fn malformed_values_fall_back_individually() {
        let config = WorkflowConfig::from_lookup(lookup(&[
            (ENV_PROGRESS_STEP, "0"),
            (ENV_TICK_INTERVAL_MS, "fast"),
            (ENV_ANALYSIS_DEPTH, "Detailed"),
            (ENV_SHOW_TECHNICAL, "yes"),
        ]));

        assert_eq!(config.progress_step, DEFAULT_PROGRESS_STEP);
        assert_eq!(
            config.tick_interval,
            Duration::from_millis(DEFAULT_TICK_INTERVAL_MS)
        );
        assert_eq!(config.analysis_depth, AnalysisDepth::Detailed);
        assert!(config.show_technical);
    }
}
