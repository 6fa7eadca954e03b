//! Rollout controller — drives the rollout state machine.
//!
//! The controller owns the single live [`RolloutState`] and writes it
//! through its [`RolloutStore`] before every mutating call returns. Each
//! mutation is applied to a copy first; the copy only replaces the live
//! state once the store accepted it, so a failed save leaves memory and
//! disk in agreement.
//!
//! ```text
//! NotStarted → Canary → EarlyAdopter → Gradual → Majority → Full
//!      └──────────┴──────────┴────────────┴──────────┴────────┴──→ Rollback
//! ```
//!
//! There is no internal timer. An external scheduler calls [`advance`]
//! (or [`tick`] for auto-advance rollouts) whenever it wants the gate
//! re-evaluated.
//!
//! [`advance`]: RolloutController::advance
//! [`tick`]: RolloutController::tick

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use poolgate_state::*;

use crate::clock::{Clock, SystemClock};
use crate::error::{RolloutError, RolloutResult};
use crate::gate::{self, GateDecision};
use crate::selector;

/// Result of an `advance` or `tick` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The rollout moved to the next phase.
    Advanced {
        from: RolloutPhase,
        to: RolloutPhase,
        active_count: usize,
    },
    /// The rollout stayed where it is; retry later.
    Held { reason: String },
}

impl Advance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Advance::Advanced { .. })
    }
}

impl fmt::Display for Advance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advance::Advanced {
                from,
                to,
                active_count,
            } => write!(f, "advanced {from} -> {to} ({active_count} active)"),
            Advance::Held { reason } => write!(f, "held: {reason}"),
        }
    }
}

/// Read-only view of a rollout for dashboards and reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub rollout_id: RolloutId,
    pub status: RolloutStatus,
    pub current_phase: RolloutPhase,
    /// Share of the five exposure phases reached (0-100).
    pub progress_percent: f64,
    pub original_pool_size: usize,
    pub new_pool_size: usize,
    pub active_pool_size: usize,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
    pub phase_history: Vec<PhaseMetrics>,
}

impl Progress {
    pub fn from_state(state: &RolloutState) -> Self {
        Self {
            rollout_id: state.rollout_id.clone(),
            status: state.status,
            current_phase: state.current_phase,
            progress_percent: completion_percent(state.current_phase),
            original_pool_size: state.original_pool.len(),
            new_pool_size: state.target_pool.len(),
            active_pool_size: state.active_pool.len(),
            consecutive_errors: state.consecutive_errors,
            last_error: state.last_error.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
            phase_history: state.phase_history.clone(),
        }
    }
}

/// Position of `phase` among the exposure phases, as a percentage.
///
/// `NotStarted` and `Rollback` count as 0.
pub fn completion_percent(phase: RolloutPhase) -> f64 {
    let steps = (RolloutPhase::SEQUENCE.len() - 1) as f64;
    match phase.position() {
        Some(idx) => idx as f64 / steps * 100.0,
        None => 0.0,
    }
}

/// Drives one rollout at a time through its phases.
pub struct RolloutController<S> {
    store: S,
    clock: Arc<dyn Clock>,
    state: Option<RolloutState>,
}

impl<S: RolloutStore> RolloutController<S> {
    /// Open a controller over `store`, resuming any persisted rollout.
    pub fn open(store: S) -> RolloutResult<Self> {
        Self::open_with_clock(store, Arc::new(SystemClock))
    }

    /// Like [`open`](Self::open) with an explicit clock.
    pub fn open_with_clock(store: S, clock: Arc<dyn Clock>) -> RolloutResult<Self> {
        let state = store.load()?;
        if let Some(state) = &state {
            let expected = selector::compute_active_set(
                state.current_phase,
                &state.original_pool,
                &state.target_pool,
                &state.config,
            );
            if expected != state.active_pool {
                warn!(
                    rollout = %state.rollout_id,
                    phase = %state.current_phase,
                    stored = state.active_pool.len(),
                    expected = expected.len(),
                    "stored active set differs from recomputed set"
                );
            }
            info!(
                rollout = %state.rollout_id,
                status = %state.status,
                phase = %state.current_phase,
                "resumed rollout state"
            );
        }
        Ok(Self { store, clock, state })
    }

    /// The current rollout, if any (including finished ones).
    pub fn state(&self) -> Option<&RolloutState> {
        self.state.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The clock used for phase timing.
    pub fn now(&self) -> u64 {
        self.clock.now_secs()
    }

    /// Start a new rollout from `original` towards `target`.
    ///
    /// Fails with `AlreadyInProgress` while another rollout is in progress
    /// or paused. The baseline snapshot is written before any state changes,
    /// and its key names the rollout, so ids never repeat within a store.
    pub fn start(
        &mut self,
        original: &[ItemCode],
        target: &[ItemCode],
        config: RolloutConfig,
    ) -> RolloutResult<&RolloutState> {
        if let Some(current) = self.state.as_ref().filter(|s| s.is_active()) {
            return Err(RolloutError::AlreadyInProgress(current.rollout_id.clone()));
        }

        let now = self.now();
        let backup = self.store.snapshot_baseline(original, now)?;
        let rollout_id = format!("ROLLOUT_{}", backup.key);
        let next = RolloutState::new(rollout_id, config, original, target, now);

        let state = self.commit(next)?;
        info!(
            rollout = %state.rollout_id,
            original = state.original_pool.len(),
            target = state.target_pool.len(),
            backup = %backup.locator,
            "started rollout"
        );
        Ok(state)
    }

    /// Try to move to the next phase.
    ///
    /// The first call after `start` always advances. Later calls consult
    /// the gate with the metrics of the open phase.
    pub fn advance(&mut self) -> RolloutResult<Advance> {
        let current = self.state.as_ref().ok_or(RolloutError::NoActiveRollout)?;
        if current.status != RolloutStatus::InProgress {
            let reason = format!("rollout is {}", current.status);
            debug!(rollout = %current.rollout_id, %reason, "advance refused");
            return Ok(Advance::Held { reason });
        }

        let now = self.now();
        if let Some(open) = current.open_phase() {
            if let GateDecision::Hold { reason } =
                gate::check(open, &current.config, current.current_phase, now)
            {
                info!(
                    rollout = %current.rollout_id,
                    phase = %current.current_phase,
                    %reason,
                    "advance held by gate"
                );
                return Ok(Advance::Held { reason });
            }
        }

        let from = current.current_phase;
        let Some(to) = from.next() else {
            return Ok(Advance::Held {
                reason: format!("no phase after {from}"),
            });
        };

        let mut next = current.clone();
        if let Some(open) = next.open_phase_mut() {
            open.close(now);
        }
        let active =
            selector::compute_active_set(to, &next.original_pool, &next.target_pool, &next.config);
        next.phase_history.push(PhaseMetrics::open(to, now, active.len()));
        next.active_pool = active;
        next.current_phase = to;
        next.updated_at = now;
        if to == RolloutPhase::Full {
            next.status = RolloutStatus::Completed;
        }

        let state = self.commit(next)?;
        let active_count = state.active_pool.len();
        info!(
            rollout = %state.rollout_id,
            %from,
            %to,
            active = active_count,
            "advanced phase"
        );
        if state.status == RolloutStatus::Completed {
            info!(rollout = %state.rollout_id, "rollout completed");
        }
        Ok(Advance::Advanced {
            from,
            to,
            active_count,
        })
    }

    /// Advance if the rollout was configured with `auto_advance`.
    ///
    /// Meant for periodic schedulers; gate failures come back as `Held`.
    pub fn tick(&mut self) -> RolloutResult<Advance> {
        let current = self.state.as_ref().ok_or(RolloutError::NoActiveRollout)?;
        if !current.config.auto_advance {
            return Ok(Advance::Held {
                reason: "auto-advance disabled".to_string(),
            });
        }
        self.advance()
    }

    /// Stop phase progression. Outcomes keep being recorded.
    pub fn pause(&mut self) -> RolloutResult<&RolloutState> {
        let state = self.transition("pause", RolloutStatus::InProgress, RolloutStatus::Paused)?;
        info!(rollout = %state.rollout_id, phase = %state.current_phase, "rollout paused");
        Ok(state)
    }

    pub fn resume(&mut self) -> RolloutResult<&RolloutState> {
        let state = self.transition("resume", RolloutStatus::Paused, RolloutStatus::InProgress)?;
        info!(rollout = %state.rollout_id, phase = %state.current_phase, "rollout resumed");
        Ok(state)
    }

    /// Revert the active set to the baseline. Available whenever a rollout exists.
    pub fn rollback(&mut self, reason: &str) -> RolloutResult<&RolloutState> {
        let current = self.state.as_ref().ok_or(RolloutError::NoActiveRollout)?;
        let now = self.now();
        let mut next = current.clone();
        apply_rollback(&mut next, reason, now);

        let state = self.commit(next)?;
        warn!(rollout = %state.rollout_id, %reason, "rollout rolled back");
        Ok(state)
    }

    /// Record a successful outcome; clears the consecutive-error counter.
    pub fn record_success(&mut self) -> RolloutResult<()> {
        let now = self.now();
        let mut next = self.active_state()?.clone();
        if let Some(open) = next.open_phase_mut() {
            open.success_count += 1;
        }
        next.consecutive_errors = 0;
        next.updated_at = now;
        self.commit(next)?;
        Ok(())
    }

    /// Record a failed outcome.
    ///
    /// Returns `true` if this error reached the consecutive-error threshold
    /// and rolled the rollout back.
    pub fn record_error(&mut self, message: &str) -> RolloutResult<bool> {
        let now = self.now();
        let mut next = self.active_state()?.clone();
        if let Some(open) = next.open_phase_mut() {
            open.error_count += 1;
        }
        next.consecutive_errors += 1;
        next.last_error = Some(message.to_string());
        next.updated_at = now;

        let config = &next.config;
        let rolled_back = config.auto_rollback_on_error
            && next.consecutive_errors >= config.rollback_error_threshold;
        if rolled_back {
            apply_rollback(
                &mut next,
                &format!("consecutive error threshold reached: {message}"),
                now,
            );
        }

        let state = self.commit(next)?;
        if rolled_back {
            warn!(
                rollout = %state.rollout_id,
                errors = state.consecutive_errors,
                error = %message,
                "consecutive errors triggered automatic rollback"
            );
        } else {
            debug!(
                rollout = %state.rollout_id,
                errors = state.consecutive_errors,
                error = %message,
                "error recorded"
            );
        }
        Ok(rolled_back)
    }

    pub fn record_warning(&mut self) -> RolloutResult<()> {
        let now = self.now();
        let mut next = self.active_state()?.clone();
        if let Some(open) = next.open_phase_mut() {
            open.warning_count += 1;
        }
        next.updated_at = now;
        self.commit(next)?;
        Ok(())
    }

    /// Overwrite any of the open phase's quality scores.
    pub fn update_metrics(
        &mut self,
        data_quality: Option<f64>,
        performance: Option<f64>,
        user_feedback: Option<f64>,
    ) -> RolloutResult<()> {
        let now = self.now();
        let mut next = self.active_state()?.clone();
        if let Some(open) = next.open_phase_mut() {
            if let Some(score) = data_quality {
                open.data_quality_score = score;
            }
            if let Some(score) = performance {
                open.performance_score = score;
            }
            if let Some(score) = user_feedback {
                open.user_feedback_score = score;
            }
        }
        next.updated_at = now;
        self.commit(next)?;
        Ok(())
    }

    /// The live item set, sorted. Empty when no rollout exists.
    pub fn current_active_set(&self) -> &[ItemCode] {
        self.state
            .as_ref()
            .map(|s| s.active_pool.as_slice())
            .unwrap_or_default()
    }

    pub fn progress(&self) -> Option<Progress> {
        self.state.as_ref().map(Progress::from_state)
    }

    /// The rollout if it is in progress or paused.
    fn active_state(&self) -> RolloutResult<&RolloutState> {
        self.state
            .as_ref()
            .filter(|s| s.is_active())
            .ok_or(RolloutError::NoActiveRollout)
    }

    fn transition(
        &mut self,
        operation: &'static str,
        from: RolloutStatus,
        to: RolloutStatus,
    ) -> RolloutResult<&RolloutState> {
        let current = self.state.as_ref().ok_or(RolloutError::NoActiveRollout)?;
        if current.status != from {
            return Err(RolloutError::InvalidTransition {
                operation,
                status: current.status,
            });
        }
        let now = self.now();
        let mut next = current.clone();
        next.status = to;
        next.updated_at = now;
        self.commit(next)
    }

    /// Persist `next`, then make it the live state.
    fn commit(&mut self, next: RolloutState) -> RolloutResult<&RolloutState> {
        self.store.save(&next)?;
        Ok(&*self.state.insert(next))
    }
}

fn apply_rollback(state: &mut RolloutState, reason: &str, now: u64) {
    if let Some(open) = state.open_phase_mut() {
        open.close(now);
    }
    state.active_pool = state.original_pool.clone();
    state.current_phase = RolloutPhase::Rollback;
    state.status = RolloutStatus::RolledBack;
    state.last_error = Some(reason.to_string());
    state.updated_at = now;
}
