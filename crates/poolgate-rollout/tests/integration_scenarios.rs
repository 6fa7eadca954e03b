//! End-to-end rollout scenarios through the file-backed store.
//!
//! Each test drives a controller with a manual clock, then reopens the
//! state from disk to check that what was persisted is what was live.

use std::path::Path;
use std::sync::Arc;

use poolgate_rollout::{Advance, ManualClock, RolloutController, RolloutError};
use poolgate_state::{
    FileStore, ItemCode, RedbStore, RolloutConfig, RolloutPhase, RolloutStatus, RolloutStore,
};

const T0: u64 = 1_704_067_200;

// ── Helpers ───────────────────────────────────────────────────────

fn codes(items: &[&str]) -> Vec<ItemCode> {
    items.iter().map(|s| s.to_string()).collect()
}

fn original() -> Vec<ItemCode> {
    codes(&["A", "B", "C"])
}

fn target() -> Vec<ItemCode> {
    codes(&["A", "B", "C", "D", "E", "F", "G", "H"])
}

fn file_store(dir: &Path) -> FileStore {
    FileStore::new(dir.join("rollout_state.json"), dir.join("pool_backups"))
}

fn open(dir: &Path, clock: &ManualClock) -> RolloutController<FileStore> {
    RolloutController::open_with_clock(file_store(dir), Arc::new(clock.clone())).unwrap()
}

fn no_wait() -> RolloutConfig {
    RolloutConfig::default().without_observation()
}

// ── Scenarios ─────────────────────────────────────────────────────

#[test]
fn canary_exposes_first_sorted_added_item() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);

    let config = RolloutConfig {
        canary_percent: 20.0,
        ..no_wait()
    };
    ctl.start(&original(), &target(), config).unwrap();
    ctl.advance().unwrap();

    assert_eq!(ctl.current_active_set(), codes(&["A", "B", "C", "D"]).as_slice());
}

#[test]
fn zero_windows_run_straight_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);
    ctl.start(&original(), &target(), no_wait()).unwrap();

    let mut phases = Vec::new();
    for _ in 0..5 {
        let outcome = ctl.advance().unwrap();
        let Advance::Advanced { to, .. } = outcome else {
            panic!("expected advance, got {outcome}");
        };
        phases.push(to);
    }
    assert_eq!(
        phases,
        vec![
            RolloutPhase::Canary,
            RolloutPhase::EarlyAdopter,
            RolloutPhase::Gradual,
            RolloutPhase::Majority,
            RolloutPhase::Full,
        ]
    );

    let reopened = open(dir.path(), &clock);
    let state = reopened.state().unwrap();
    assert_eq!(state.status, RolloutStatus::Completed);
    assert_eq!(state.active_pool, target());
    assert_eq!(state.phase_history.len(), 5);
    assert!(state.phase_history[..4].iter().all(|m| !m.is_open()));
}

#[test]
fn third_consecutive_error_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);
    let config = RolloutConfig {
        rollback_error_threshold: 3,
        auto_rollback_on_error: true,
        ..no_wait()
    };
    ctl.start(&original(), &target(), config).unwrap();
    ctl.advance().unwrap();
    ctl.advance().unwrap();

    assert!(!ctl.record_error("quote feed stalled").unwrap());
    assert!(!ctl.record_error("quote feed stalled").unwrap());
    assert!(ctl.record_error("quote feed stalled").unwrap());

    let reopened = open(dir.path(), &clock);
    let state = reopened.state().unwrap();
    assert_eq!(state.status, RolloutStatus::RolledBack);
    assert_eq!(state.current_phase, RolloutPhase::Rollback);
    assert_eq!(state.active_pool, original());
}

#[test]
fn immediate_second_advance_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);
    ctl.start(&original(), &target(), RolloutConfig::default()).unwrap();
    ctl.advance().unwrap();

    let outcome = ctl.advance().unwrap();
    assert_eq!(
        outcome,
        Advance::Held {
            reason: "observation time short: 0.0/24h".to_string()
        }
    );
    assert_eq!(ctl.state().unwrap().current_phase, RolloutPhase::Canary);
}

// ── Durability ────────────────────────────────────────────────────

#[test]
fn restart_resumes_mid_rollout() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    {
        let mut ctl = open(dir.path(), &clock);
        ctl.start(&original(), &target(), RolloutConfig::default()).unwrap();
        ctl.advance().unwrap();
        ctl.record_success().unwrap();
        ctl.record_warning().unwrap();
    }

    clock.advance_hours(25);
    let mut ctl = open(dir.path(), &clock);
    let metrics = ctl.state().unwrap().open_phase().unwrap().clone();
    assert_eq!(metrics.success_count, 1);
    assert_eq!(metrics.warning_count, 1);
    assert_eq!(metrics.start_time, T0);

    assert!(ctl.advance().unwrap().is_advanced());
    assert_eq!(ctl.state().unwrap().current_phase, RolloutPhase::EarlyAdopter);
}

#[test]
fn reloaded_active_set_matches_live_one() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);
    ctl.start(&original(), &target(), no_wait()).unwrap();

    for _ in 0..4 {
        ctl.advance().unwrap();
        let live = ctl.current_active_set().to_vec();
        let reopened = open(dir.path(), &clock);
        assert_eq!(reopened.current_active_set(), live.as_slice());
    }
}

#[test]
fn baseline_written_once_per_start() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);

    ctl.start(&original(), &target(), no_wait()).unwrap();
    ctl.advance().unwrap();
    ctl.rollback("manual").unwrap();
    ctl.start(&original(), &target(), no_wait()).unwrap();

    let baselines = ctl.store().list_baselines().unwrap();
    assert_eq!(baselines.len(), 2);
    assert!(baselines.iter().all(|b| b.pool == original() && b.count == 3));
    assert!(dir.path().join("pool_backups/pool_backup_20240101_000000.json").exists());
    assert!(dir.path().join("pool_backups/pool_backup_20240101_000000_1.json").exists());
}

#[test]
fn state_document_is_plain_json() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(T0);
    let mut ctl = open(dir.path(), &clock);
    ctl.start(&original(), &target(), no_wait()).unwrap();
    ctl.advance().unwrap();

    let raw = std::fs::read_to_string(dir.path().join("rollout_state.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["rollout_id"], "ROLLOUT_20240101_000000");
    assert_eq!(doc["status"], "in_progress");
    assert_eq!(doc["current_phase"], "canary");
    assert_eq!(doc["new_pool"].as_array().unwrap().len(), 8);
    assert_eq!(doc["phase_history"][0]["phase"], "canary");
}

#[test]
fn corrupt_state_file_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("rollout_state.json"), "{ not json").unwrap();
    let result = RolloutController::open(file_store(dir.path()));
    assert!(matches!(result, Err(RolloutError::Persistence(_))));
}

#[test]
fn redb_backend_runs_the_same_rollout() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("poolgate.redb");
    let clock = ManualClock::new(T0);
    {
        let store = RedbStore::open(&db_path).unwrap();
        let mut ctl = RolloutController::open_with_clock(store, Arc::new(clock.clone())).unwrap();
        ctl.start(&original(), &target(), no_wait()).unwrap();
        ctl.advance().unwrap();
        ctl.pause().unwrap();
    }

    let store: Box<dyn RolloutStore> = Box::new(RedbStore::open(&db_path).unwrap());
    let mut ctl = RolloutController::open_with_clock(store, Arc::new(clock)).unwrap();
    assert_eq!(ctl.state().unwrap().status, RolloutStatus::Paused);
    assert!(!ctl.advance().unwrap().is_advanced());
    ctl.resume().unwrap();
    assert!(ctl.advance().unwrap().is_advanced());
    assert_eq!(ctl.store().list_baselines().unwrap().len(), 1);
}
