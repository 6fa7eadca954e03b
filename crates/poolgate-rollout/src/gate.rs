//! Advancement gate — may the open phase move on?
//!
//! Three rules, checked in order, first failure wins:
//!
//! 1. the phase has run for at least its observation window
//! 2. `error_rate <= max_error_rate`
//! 3. `success_rate >= min_success_rate`

use poolgate_state::{PhaseMetrics, RolloutConfig, RolloutPhase};

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// All rules hold.
    Pass,
    /// A rule failed; `reason` names the actual and required values.
    Hold { reason: String },
}

impl GateDecision {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateDecision::Pass)
    }
}

/// Check whether `phase` (whose open metrics are `metrics`) may advance at `now`.
pub fn check(
    metrics: &PhaseMetrics,
    config: &RolloutConfig,
    phase: RolloutPhase,
    now: u64,
) -> GateDecision {
    let required_hours = config.observation_hours_for(phase);
    let elapsed_hours = metrics.duration_hours(now);
    if elapsed_hours < f64::from(required_hours) {
        return GateDecision::Hold {
            reason: format!("observation time short: {elapsed_hours:.1}/{required_hours}h"),
        };
    }

    let error_rate = metrics.error_rate();
    if error_rate > config.max_error_rate {
        return GateDecision::Hold {
            reason: format!(
                "error rate too high: {error_rate:.1}% > {}%",
                config.max_error_rate
            ),
        };
    }

    let success_rate = metrics.success_rate();
    if success_rate < config.min_success_rate {
        return GateDecision::Hold {
            reason: format!(
                "success rate too low: {success_rate:.1}% < {}%",
                config.min_success_rate
            ),
        };
    }

    GateDecision::Pass
}
