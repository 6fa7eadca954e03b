//! Mutating subcommands: start, advance, tick, pause, resume, rollback,
//! record and metrics.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use poolgate_core::PoolgateConfig;
use poolgate_rollout::Advance;
use poolgate_state::RolloutConfig;

use super::{open_controller, read_items};

pub fn start(
    config: &PoolgateConfig,
    original_path: &Path,
    target_path: &Path,
    auto_advance: bool,
) -> Result<()> {
    // An empty baseline is a valid first rollout; an empty target is not.
    let original = read_items(original_path)?;
    let target = read_items(target_path)?;
    if target.is_empty() {
        bail!("target item list {} is empty", target_path.display());
    }
    let rollout_config = RolloutConfig {
        auto_advance: auto_advance || config.rollout.auto_advance,
        ..config.rollout.clone()
    };

    let mut ctl = open_controller(config)?;
    let state = ctl.start(&original, &target, rollout_config)?;
    println!("✓ Started {}", state.rollout_id);
    println!(
        "  original {} items, target {} items",
        state.original_pool.len(),
        state.target_pool.len()
    );
    println!("  run `poolgate advance` to open the canary phase");
    Ok(())
}

pub fn advance(config: &PoolgateConfig) -> Result<()> {
    let mut ctl = open_controller(config)?;
    print_advance(&ctl.advance()?);
    Ok(())
}

pub fn tick(config: &PoolgateConfig) -> Result<()> {
    let mut ctl = open_controller(config)?;
    let outcome = ctl.tick()?;
    info!(%outcome, "tick");
    print_advance(&outcome);
    Ok(())
}

fn print_advance(outcome: &Advance) {
    match outcome {
        Advance::Advanced { .. } => println!("✓ {outcome}"),
        Advance::Held { reason } => println!("… held: {reason}"),
    }
}

pub fn pause(config: &PoolgateConfig) -> Result<()> {
    let mut ctl = open_controller(config)?;
    let state = ctl.pause()?;
    println!("✓ Paused {} at {}", state.rollout_id, state.current_phase);
    Ok(())
}

pub fn resume(config: &PoolgateConfig) -> Result<()> {
    let mut ctl = open_controller(config)?;
    let state = ctl.resume()?;
    println!("✓ Resumed {} at {}", state.rollout_id, state.current_phase);
    Ok(())
}

pub fn rollback(config: &PoolgateConfig, reason: &str) -> Result<()> {
    let mut ctl = open_controller(config)?;
    let state = ctl.rollback(reason)?;
    println!(
        "✓ Rolled back {} ({} baseline items live)",
        state.rollout_id,
        state.active_pool.len()
    );
    Ok(())
}

pub fn record_success(config: &PoolgateConfig) -> Result<()> {
    open_controller(config)?.record_success()?;
    Ok(())
}

pub fn record_error(config: &PoolgateConfig, message: &str) -> Result<()> {
    let mut ctl = open_controller(config)?;
    if ctl.record_error(message)? {
        println!("⚠️  consecutive error threshold reached, rolled back to baseline");
    } else if let Some(state) = ctl.state() {
        println!(
            "error recorded ({}/{} consecutive)",
            state.consecutive_errors, state.config.rollback_error_threshold
        );
    }
    Ok(())
}

pub fn record_warning(config: &PoolgateConfig) -> Result<()> {
    open_controller(config)?.record_warning()?;
    Ok(())
}

pub fn metrics(
    config: &PoolgateConfig,
    data_quality: Option<f64>,
    performance: Option<f64>,
    feedback: Option<f64>,
) -> Result<()> {
    open_controller(config)?.update_metrics(data_quality, performance, feedback)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolgate_core::StoreConfig;
    use poolgate_state::RolloutStatus;
    use std::fs;

    fn test_config(dir: &Path) -> PoolgateConfig {
        PoolgateConfig {
            store: StoreConfig {
                state_file: dir.join("rollout_state.json"),
                backup_dir: dir.join("pool_backups"),
                db_path: dir.join("poolgate.redb"),
                ..Default::default()
            },
            rollout: RolloutConfig::default().without_observation(),
            ..Default::default()
        }
    }

    fn write_pools(dir: &Path) {
        fs::write(dir.join("original.txt"), "A\nB\nC\n").unwrap();
        fs::write(dir.join("target.json"), r#"["A","B","C","D","E"]"#).unwrap();
    }

    #[test]
    fn test_commands_share_state_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_pools(dir.path());

        start(&config, &dir.path().join("original.txt"), &dir.path().join("target.json"), false)
            .unwrap();
        advance(&config).unwrap();
        record_success(&config).unwrap();
        pause(&config).unwrap();

        let ctl = open_controller(&config).unwrap();
        let state = ctl.state().unwrap();
        assert_eq!(state.status, RolloutStatus::Paused);
        assert_eq!(state.open_phase().unwrap().success_count, 1);
    }

    #[test]
    fn test_start_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_pools(dir.path());
        let original = dir.path().join("original.txt");
        let target = dir.path().join("target.json");

        start(&config, &original, &target, false).unwrap();
        assert!(start(&config, &original, &target, false).is_err());
    }

    #[test]
    fn test_auto_advance_flag_reaches_state() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        write_pools(dir.path());

        start(&config, &dir.path().join("original.txt"), &dir.path().join("target.json"), true)
            .unwrap();
        tick(&config).unwrap();

        let ctl = open_controller(&config).unwrap();
        assert!(ctl.state().unwrap().config.auto_advance);
        assert_eq!(ctl.progress().unwrap().phase_history.len(), 1);
    }

    #[test]
    fn test_start_from_empty_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        fs::write(dir.path().join("original.txt"), "# first rollout\n").unwrap();
        fs::write(dir.path().join("target.txt"), "A\nB\n").unwrap();
        fs::write(dir.path().join("empty.json"), "[]").unwrap();

        assert!(
            start(&config, &dir.path().join("target.txt"), &dir.path().join("empty.json"), false)
                .is_err()
        );
        start(&config, &dir.path().join("original.txt"), &dir.path().join("target.txt"), false)
            .unwrap();

        let ctl = open_controller(&config).unwrap();
        let state = ctl.state().unwrap();
        assert!(state.original_pool.is_empty());
        assert_eq!(state.target_pool, vec!["A", "B"]);
    }

    #[test]
    fn test_record_without_rollout_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        assert!(record_success(&config).is_err());
        assert!(record_error(&config, "boom").is_err());
        assert!(rollback(&config, "none").is_err());
    }
}
