//! `poolgate init` — write a default poolgate.toml.

use std::path::Path;

use anyhow::{bail, Result};
use poolgate_core::PoolgateConfig;

pub fn init(config_path: &Path, data_root: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", config_path.display());
    }
    let config = PoolgateConfig::scaffold(data_root);
    std::fs::write(config_path, config.to_toml_string()?)?;
    println!("✓ Generated {}", config_path.display());
    Ok(())
}
