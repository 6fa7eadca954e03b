//! Subcommand implementations.
//!
//! Every command opens its own controller over the configured store, does
//! one thing, and exits. The store is the only thing shared between runs.

use std::path::Path;

use anyhow::{Context, Result};

use poolgate_core::{PoolgateConfig, StoreBackend, StoreConfig};
use poolgate_rollout::RolloutController;
use poolgate_state::{FileStore, ItemCode, RedbStore, RolloutStore};

pub mod init;
pub mod inspect;
pub mod rollout;

pub type Controller = RolloutController<Box<dyn RolloutStore>>;

pub fn open_store(config: &StoreConfig) -> Result<Box<dyn RolloutStore>> {
    Ok(match config.backend {
        StoreBackend::File => Box::new(FileStore::new(&config.state_file, &config.backup_dir)),
        StoreBackend::Redb => Box::new(
            RedbStore::open(&config.db_path)
                .with_context(|| format!("opening {}", config.db_path.display()))?,
        ),
    })
}

pub fn open_controller(config: &PoolgateConfig) -> Result<Controller> {
    let store = open_store(&config.store)?;
    Ok(RolloutController::open(store)?)
}

/// Read an item list: a JSON array of codes, or one code per line.
pub fn read_items(path: &Path) -> Result<Vec<ItemCode>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading item list {}", path.display()))?;
    parse_items(&content).with_context(|| format!("parsing item list {}", path.display()))
}

fn parse_items(content: &str) -> Result<Vec<ItemCode>> {
    if content.trim_start().starts_with('[') {
        return Ok(serde_json::from_str(content)?);
    }
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
