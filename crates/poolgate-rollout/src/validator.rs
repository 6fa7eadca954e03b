//! Phase validation — sanity checks on the live set of a rollout.
//!
//! Validation is advisory. It never changes the rollout; operators (or a
//! scheduler) read the report and decide whether to pause or roll back.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use poolgate_core::ValidationConfig;
use poolgate_state::{ItemCode, RolloutPhase, RolloutState};

use crate::selector;

/// How many missing items a failed integrity check lists by name.
const MAX_LISTED: usize = 10;

/// Answers whether an item has the data it needs to be served.
pub trait DataProbe: Send + Sync {
    fn has_data(&self, code: &str) -> bool;
}

/// Looks for `{dir}/{code}.csv`.
#[derive(Debug, Clone)]
pub struct DirectoryProbe {
    dir: PathBuf,
}

impl DirectoryProbe {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DataProbe for DirectoryProbe {
    fn has_data(&self, code: &str) -> bool {
        self.dir.join(format!("{code}.csv")).is_file()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    fn new(name: &'static str, passed: bool, message: String) -> Self {
        Self {
            name,
            passed,
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub rollout_id: String,
    pub phase: RolloutPhase,
    pub checked_at: u64,
    /// True when every check passed.
    pub passed: bool,
    pub checks: Vec<CheckResult>,
}

impl ValidationReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Runs the phase checks against a rollout state.
pub struct RolloutValidator {
    min_availability_percent: f64,
    probe: Option<Box<dyn DataProbe>>,
}

impl RolloutValidator {
    /// A validator without a data probe; the availability check is skipped.
    pub fn new(min_availability_percent: f64) -> Self {
        Self {
            min_availability_percent,
            probe: None,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.min_availability_percent)
            .with_probe(DirectoryProbe::new(&config.data_dir))
    }

    pub fn with_probe(mut self, probe: impl DataProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn validate_phase(&self, state: &RolloutState, now: u64) -> ValidationReport {
        let mut checks = vec![
            check_pool_integrity(state),
            check_pool_containment(state),
            check_phase_consistency(state),
        ];
        if let Some(probe) = &self.probe {
            checks.push(self.check_data_availability(probe.as_ref(), &state.active_pool));
        }

        let passed = checks.iter().all(|c| c.passed);
        let report = ValidationReport {
            rollout_id: state.rollout_id.clone(),
            phase: state.current_phase,
            checked_at: now,
            passed,
            checks,
        };

        if passed {
            info!(rollout = %state.rollout_id, phase = %state.current_phase, "phase validation passed");
        } else {
            for failure in report.failures() {
                warn!(
                    rollout = %state.rollout_id,
                    phase = %state.current_phase,
                    check = failure.name,
                    message = %failure.message,
                    "phase validation failed"
                );
            }
        }
        report
    }

    fn check_data_availability(&self, probe: &dyn DataProbe, active: &[ItemCode]) -> CheckResult {
        if active.is_empty() {
            return CheckResult::new("data_availability", true, "active set is empty".to_string());
        }
        let available = active.iter().filter(|c| probe.has_data(c)).count();
        let percent = available as f64 / active.len() as f64 * 100.0;
        CheckResult::new(
            "data_availability",
            percent >= self.min_availability_percent,
            format!(
                "data available for {available}/{} items ({percent:.1}%, need {}%)",
                active.len(),
                self.min_availability_percent
            ),
        )
    }
}

/// Every baseline item must still be live.
fn check_pool_integrity(state: &RolloutState) -> CheckResult {
    let missing: Vec<&ItemCode> = state
        .original_pool
        .iter()
        .filter(|c| state.active_pool.binary_search(c).is_err())
        .collect();
    if missing.is_empty() {
        return CheckResult::new(
            "pool_integrity",
            true,
            format!("all {} baseline items active", state.original_pool.len()),
        );
    }

    let listed: Vec<&str> = missing.iter().take(MAX_LISTED).map(|c| c.as_str()).collect();
    let more = missing.len().saturating_sub(MAX_LISTED);
    let mut message = format!("{} baseline items missing: {}", missing.len(), listed.join(", "));
    if more > 0 {
        message.push_str(&format!(" (+{more} more)"));
    }
    CheckResult::new("pool_integrity", false, message)
}

/// Nothing outside the baseline and target may be live.
fn check_pool_containment(state: &RolloutState) -> CheckResult {
    let unknown = state
        .active_pool
        .iter()
        .filter(|c| !state.original_pool.contains(c) && !state.target_pool.contains(c))
        .count();
    if unknown == 0 {
        CheckResult::new("pool_containment", true, "active set within baseline and target".to_string())
    } else {
        CheckResult::new(
            "pool_containment",
            false,
            format!("{unknown} active items are in neither baseline nor target"),
        )
    }
}

/// The live set must match what the selector computes for the current phase.
fn check_phase_consistency(state: &RolloutState) -> CheckResult {
    let expected = selector::compute_active_set(
        state.current_phase,
        &state.original_pool,
        &state.target_pool,
        &state.config,
    );
    if expected == state.active_pool {
        CheckResult::new(
            "phase_consistency",
            true,
            format!("{} items active as expected for {}", expected.len(), state.current_phase),
        )
    } else {
        CheckResult::new(
            "phase_consistency",
            false,
            format!(
                "expected {} items for {}, found {}",
                expected.len(),
                state.current_phase,
                state.active_pool.len()
            ),
        )
    }
}
