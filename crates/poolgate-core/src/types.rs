//! Shared types used across poolgate crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exposure phase of a rollout.
///
/// Phases move strictly forward through [`RolloutPhase::SEQUENCE`].
/// `Rollback` sits outside the sequence and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutPhase {
    /// Rollout created, nothing from the target set exposed yet.
    NotStarted,
    /// First small slice of the added items.
    Canary,
    EarlyAdopter,
    Gradual,
    Majority,
    /// Every added item is live.
    Full,
    /// Reverted to the baseline set.
    Rollback,
}

impl RolloutPhase {
    /// The forward-only phase order.
    pub const SEQUENCE: [RolloutPhase; 6] = [
        RolloutPhase::NotStarted,
        RolloutPhase::Canary,
        RolloutPhase::EarlyAdopter,
        RolloutPhase::Gradual,
        RolloutPhase::Majority,
        RolloutPhase::Full,
    ];

    /// Position in [`Self::SEQUENCE`], or `None` for `Rollback`.
    pub fn position(self) -> Option<usize> {
        Self::SEQUENCE.iter().position(|p| *p == self)
    }

    /// The phase that follows this one, if any.
    pub fn next(self) -> Option<RolloutPhase> {
        let idx = self.position()?;
        Self::SEQUENCE.get(idx + 1).copied()
    }

    /// Whether no further phase transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, RolloutPhase::Full | RolloutPhase::Rollback)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RolloutPhase::NotStarted => "not_started",
            RolloutPhase::Canary => "canary",
            RolloutPhase::EarlyAdopter => "early_adopter",
            RolloutPhase::Gradual => "gradual",
            RolloutPhase::Majority => "majority",
            RolloutPhase::Full => "full",
            RolloutPhase::Rollback => "rollback",
        }
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall lifecycle status of a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutStatus {
    Pending,
    InProgress,
    Paused,
    Completed,
    Failed,
    RolledBack,
}

impl RolloutStatus {
    /// A rollout in this status blocks a new `start`.
    pub fn is_active(self) -> bool {
        matches!(self, RolloutStatus::InProgress | RolloutStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RolloutStatus::Pending => "pending",
            RolloutStatus::InProgress => "in_progress",
            RolloutStatus::Paused => "paused",
            RolloutStatus::Completed => "completed",
            RolloutStatus::Failed => "failed",
            RolloutStatus::RolledBack => "rolled_back",
        }
    }
}

impl fmt::Display for RolloutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds and exposure steps for one rollout.
///
/// Fixed at `start` and persisted with the rollout state. Missing fields
/// fall back to the defaults below when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolloutConfig {
    /// Share of the added items exposed per phase (0-100).
    pub canary_percent: f64,
    pub early_adopter_percent: f64,
    pub gradual_percent: f64,
    pub majority_percent: f64,

    /// Minimum hours a phase must run before it may advance.
    pub canary_observation_hours: u32,
    pub early_adopter_observation_hours: u32,
    pub gradual_observation_hours: u32,
    pub majority_observation_hours: u32,

    /// Let `tick()` advance phases without an operator.
    pub auto_advance: bool,
    /// Maximum acceptable error rate (percentage).
    pub max_error_rate: f64,
    /// Minimum acceptable success rate (percentage).
    pub min_success_rate: f64,

    /// Roll back automatically after `rollback_error_threshold` consecutive errors.
    pub auto_rollback_on_error: bool,
    pub rollback_error_threshold: u32,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            canary_percent: 10.0,
            early_adopter_percent: 25.0,
            gradual_percent: 50.0,
            majority_percent: 75.0,
            canary_observation_hours: 24,
            early_adopter_observation_hours: 48,
            gradual_observation_hours: 72,
            majority_observation_hours: 24,
            auto_advance: false,
            max_error_rate: 5.0,
            min_success_rate: 95.0,
            auto_rollback_on_error: true,
            rollback_error_threshold: 3,
        }
    }
}

impl RolloutConfig {
    /// A config with every observation window set to zero.
    pub fn without_observation(mut self) -> Self {
        self.canary_observation_hours = 0;
        self.early_adopter_observation_hours = 0;
        self.gradual_observation_hours = 0;
        self.majority_observation_hours = 0;
        self
    }

    /// Exposure percentage for a phase, clamped to 0-100.
    pub fn percent_for(&self, phase: RolloutPhase) -> f64 {
        let percent = match phase {
            RolloutPhase::NotStarted | RolloutPhase::Rollback => 0.0,
            RolloutPhase::Canary => self.canary_percent,
            RolloutPhase::EarlyAdopter => self.early_adopter_percent,
            RolloutPhase::Gradual => self.gradual_percent,
            RolloutPhase::Majority => self.majority_percent,
            RolloutPhase::Full => 100.0,
        };
        percent.clamp(0.0, 100.0)
    }

    /// Minimum observation window for a phase, in hours.
    pub fn observation_hours_for(&self, phase: RolloutPhase) -> u32 {
        match phase {
            RolloutPhase::Canary => self.canary_observation_hours,
            RolloutPhase::EarlyAdopter => self.early_adopter_observation_hours,
            RolloutPhase::Gradual => self.gradual_observation_hours,
            RolloutPhase::Majority => self.majority_observation_hours,
            RolloutPhase::NotStarted | RolloutPhase::Full | RolloutPhase::Rollback => 0,
        }
    }
}
