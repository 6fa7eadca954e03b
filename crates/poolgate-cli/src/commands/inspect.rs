//! Read-only subcommands: active, status, report, validate, baselines.

use std::path::PathBuf;

use anyhow::Result;

use poolgate_core::{PoolgateConfig, ValidationConfig};
use poolgate_rollout::report::{self, NO_ROLLOUT};
use poolgate_rollout::RolloutValidator;
use poolgate_state::RolloutStore;

use super::{open_controller, open_store};
use crate::{Format, ReportKind};

pub fn active(config: &PoolgateConfig, format: Format) -> Result<()> {
    let ctl = open_controller(config)?;
    let items = ctl.current_active_set();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(items)?),
        Format::Text => {
            for code in items {
                println!("{code}");
            }
        }
    }
    Ok(())
}

pub fn status(config: &PoolgateConfig, format: Format) -> Result<()> {
    let ctl = open_controller(config)?;
    let progress = ctl.progress();
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&progress)?),
        Format::Text => print!("{}", report::progress_report(progress.as_ref(), ctl.now())),
    }
    Ok(())
}

pub fn report(config: &PoolgateConfig, kind: ReportKind) -> Result<()> {
    let ctl = open_controller(config)?;
    let now = ctl.now();
    let text = match kind {
        ReportKind::Progress => report::progress_report(ctl.progress().as_ref(), now),
        ReportKind::Summary => report::summary_report(ctl.state(), now),
        ReportKind::Phase => match ctl.state().and_then(|s| s.phase_history.last()) {
            Some(metrics) => report::phase_report(metrics, now),
            None => format!("{NO_ROLLOUT}\n"),
        },
    };
    print!("{text}");
    Ok(())
}

pub fn validate(config: &PoolgateConfig, data_dir: Option<PathBuf>, format: Format) -> Result<()> {
    let ctl = open_controller(config)?;
    let Some(state) = ctl.state() else {
        println!("{NO_ROLLOUT}");
        return Ok(());
    };

    let validation = ValidationConfig {
        data_dir: data_dir.unwrap_or_else(|| config.validation.data_dir.clone()),
        ..config.validation.clone()
    };
    let result = RolloutValidator::from_config(&validation).validate_phase(state, ctl.now());
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print!("{}", report::validation_report(&result)),
    }
    if !result.passed {
        anyhow::bail!("validation failed");
    }
    Ok(())
}

pub fn baselines(config: &PoolgateConfig) -> Result<()> {
    let store = open_store(&config.store)?;
    let snapshots = store.list_baselines()?;
    if snapshots.is_empty() {
        println!("No baseline snapshots.");
        return Ok(());
    }
    for snapshot in snapshots {
        println!("{}  {} items", snapshot.timestamp, snapshot.count);
    }
    Ok(())
}
