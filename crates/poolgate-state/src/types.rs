//! Persisted rollout types.
//!
//! `RolloutState` is the single live document; `PhaseMetrics` entries form
//! its phase history; `BaselineSnapshot` is the write-once copy of the
//! pre-rollout set. Timestamps are unix seconds.

use serde::{Deserialize, Serialize};

pub use poolgate_core::{RolloutConfig, RolloutPhase, RolloutStatus};

/// Unique identifier for a rollout (`ROLLOUT_YYYYMMDD_HHMMSS`).
pub type RolloutId = String;

/// Identifier for one item in a pool (e.g. an instrument code).
pub type ItemCode = String;

// ── Phase metrics ─────────────────────────────────────────────────

/// Outcome counters and quality scores for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub phase: RolloutPhase,
    pub start_time: u64,
    /// Set when the next phase opens or on rollback.
    #[serde(default)]
    pub end_time: Option<u64>,
    /// Size of the active set while this phase is live.
    #[serde(default)]
    pub stocks_count: usize,
    #[serde(default)]
    pub success_count: u32,
    #[serde(default)]
    pub error_count: u32,
    #[serde(default)]
    pub warning_count: u32,
    #[serde(default)]
    pub data_quality_score: f64,
    #[serde(default)]
    pub performance_score: f64,
    #[serde(default)]
    pub user_feedback_score: f64,
}

impl PhaseMetrics {
    /// Open a fresh metrics entry for `phase`.
    pub fn open(phase: RolloutPhase, start_time: u64, stocks_count: usize) -> Self {
        Self {
            phase,
            start_time,
            end_time: None,
            stocks_count,
            success_count: 0,
            error_count: 0,
            warning_count: 0,
            data_quality_score: 0.0,
            performance_score: 0.0,
            user_feedback_score: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Close the phase. A closed phase keeps its first end time.
    pub fn close(&mut self, now: u64) {
        if self.end_time.is_none() {
            self.end_time = Some(now);
        }
    }

    fn outcomes(&self) -> u32 {
        self.success_count + self.error_count
    }

    /// Success percentage; 100 when nothing has been recorded.
    pub fn success_rate(&self) -> f64 {
        match self.outcomes() {
            0 => 100.0,
            total => f64::from(self.success_count) / f64::from(total) * 100.0,
        }
    }

    /// Error percentage; 0 when nothing has been recorded.
    pub fn error_rate(&self) -> f64 {
        match self.outcomes() {
            0 => 0.0,
            total => f64::from(self.error_count) / f64::from(total) * 100.0,
        }
    }

    /// Hours between start and end, or start and `now` while open.
    pub fn duration_hours(&self, now: u64) -> f64 {
        let end = self.end_time.unwrap_or(now);
        end.saturating_sub(self.start_time) as f64 / 3600.0
    }
}

// ── Rollout state ─────────────────────────────────────────────────

/// The full, persisted state of one rollout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutState {
    pub rollout_id: RolloutId,
    pub status: RolloutStatus,
    pub current_phase: RolloutPhase,
    #[serde(default)]
    pub config: RolloutConfig,
    /// Baseline that was live before the rollout began.
    #[serde(default)]
    pub original_pool: Vec<ItemCode>,
    /// Desired end state.
    #[serde(rename = "new_pool", default)]
    pub target_pool: Vec<ItemCode>,
    /// What is live at the current phase.
    #[serde(default)]
    pub active_pool: Vec<ItemCode>,
    #[serde(default)]
    pub phase_history: Vec<PhaseMetrics>,
    #[serde(default)]
    pub consecutive_errors: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl RolloutState {
    /// A new rollout at `NotStarted` with the baseline active.
    ///
    /// Both pools are sorted and de-duplicated.
    pub fn new(
        rollout_id: RolloutId,
        config: RolloutConfig,
        original: &[ItemCode],
        target: &[ItemCode],
        now: u64,
    ) -> Self {
        let original_pool = sorted_unique(original);
        let target_pool = sorted_unique(target);
        Self {
            rollout_id,
            status: RolloutStatus::InProgress,
            current_phase: RolloutPhase::NotStarted,
            config,
            active_pool: original_pool.clone(),
            original_pool,
            target_pool,
            phase_history: Vec::new(),
            consecutive_errors: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this rollout still blocks a new one.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// The metrics entry of the phase currently live, if one is open.
    pub fn open_phase(&self) -> Option<&PhaseMetrics> {
        self.phase_history.last().filter(|m| m.is_open())
    }

    pub fn open_phase_mut(&mut self) -> Option<&mut PhaseMetrics> {
        self.phase_history.last_mut().filter(|m| m.is_open())
    }
}

fn sorted_unique(items: &[ItemCode]) -> Vec<ItemCode> {
    let mut out = items.to_vec();
    out.sort();
    out.dedup();
    out
}

// ── Baseline snapshot ─────────────────────────────────────────────

/// Write-once copy of the pool that was live before a rollout started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    /// `YYYYMMDD_HHMMSS` (UTC).
    pub timestamp: String,
    pub pool: Vec<ItemCode>,
    pub count: usize,
}

impl BaselineSnapshot {
    pub fn new(pool: &[ItemCode], now: u64) -> Self {
        Self {
            timestamp: compact_timestamp(now),
            pool: pool.to_vec(),
            count: pool.len(),
        }
    }
}

/// Format unix seconds as `YYYYMMDD_HHMMSS` in UTC.
pub fn compact_timestamp(epoch_secs: u64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs as i64, 0)
        .map(|dt| dt.format("%Y%m%d_%H%M%S").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}

/// Format unix seconds as `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn format_epoch(epoch_secs: u64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}
