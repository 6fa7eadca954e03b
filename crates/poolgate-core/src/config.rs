//! poolgate.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::RolloutConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolgateConfig {
    pub store: StoreConfig,
    pub rollout: RolloutConfig,
    pub validation: ValidationConfig,
}

/// Which persistence backend holds the rollout state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// JSON state document plus one file per baseline snapshot.
    #[default]
    File,
    /// Single redb database file.
    Redb,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Live state document (file backend).
    pub state_file: PathBuf,
    /// Directory for baseline snapshots (file backend).
    pub backup_dir: PathBuf,
    /// Database path (redb backend).
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            state_file: PathBuf::from("data/rollout_state.json"),
            backup_dir: PathBuf::from("data/pool_backups"),
            db_path: PathBuf::from("data/poolgate.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Directory holding one `{code}.csv` per item with market data.
    pub data_dir: PathBuf,
    /// Minimum share of active items with data for the check to pass.
    pub min_availability_percent: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/processed"),
            min_availability_percent: 90.0,
        }
    }
}

impl PoolgateConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PoolgateConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a poolgate.toml rooted at `data_root`.
    pub fn scaffold(data_root: &Path) -> Self {
        PoolgateConfig {
            store: StoreConfig {
                backend: StoreBackend::File,
                state_file: data_root.join("rollout_state.json"),
                backup_dir: data_root.join("pool_backups"),
                db_path: data_root.join("poolgate.redb"),
            },
            rollout: RolloutConfig::default(),
            validation: ValidationConfig {
                data_dir: data_root.join("processed"),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold() {
        let config = PoolgateConfig::scaffold(Path::new("/var/lib/poolgate"));
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("/var/lib/poolgate/rollout_state.json"));
        assert!(toml_str.contains("canary_percent"));
        assert!(toml_str.contains("backend = \"file\""));
    }

    #[test]
    fn test_parse_empty() {
        let config: PoolgateConfig = toml::from_str("").unwrap();
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.rollout, RolloutConfig::default());
        assert_eq!(config.validation.min_availability_percent, 90.0);
    }

    #[test]
    fn test_parse_partial() {
        let toml_str = r#"
[store]
backend = "redb"
db_path = "/tmp/pg.redb"

[rollout]
canary_percent = 20.0
canary_observation_hours = 0
auto_rollback_on_error = false
"#;
        let config: PoolgateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Redb);
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/pg.redb"));
        assert_eq!(config.store.state_file, PathBuf::from("data/rollout_state.json"));
        assert_eq!(config.rollout.canary_percent, 20.0);
        assert_eq!(config.rollout.canary_observation_hours, 0);
        assert!(!config.rollout.auto_rollback_on_error);
        assert_eq!(config.rollout.rollback_error_threshold, 3);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = PoolgateConfig::load_or_default(Path::new("/nonexistent/poolgate.toml")).unwrap();
        assert_eq!(config.store.backup_dir, PathBuf::from("data/pool_backups"));
    }
}
