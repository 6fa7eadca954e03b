//! FileStore — JSON documents on the local filesystem.
//!
//! The live state is one pretty-printed JSON file, replaced on every save
//! by writing a sibling temp file, syncing it, and renaming it over the
//! original. Baselines go to `{backup_dir}/pool_backup_{stamp}.json`,
//! opened with `create_new` so an existing snapshot is never touched.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{map_err, snapshot_keys, snapshot_order, RolloutStore, SnapshotRef};
use crate::types::{compact_timestamp, BaselineSnapshot, ItemCode, RolloutState};

const BACKUP_PREFIX: &str = "pool_backup_";

/// File-backed rollout store.
#[derive(Debug, Clone)]
pub struct FileStore {
    state_file: PathBuf,
    backup_dir: PathBuf,
}

impl FileStore {
    pub fn new(state_file: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_file: state_file.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .state_file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("rollout_state.json");
        self.state_file
            .with_file_name(format!(".{name}.tmp.{}", std::process::id()))
    }
}

impl RolloutStore for FileStore {
    fn load(&self) -> StateResult<Option<RolloutState>> {
        let content = match fs::read_to_string(&self.state_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StateError::Io(e.to_string())),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        let state: RolloutState =
            serde_json::from_str(&content).map_err(map_err!(Deserialize))?;
        debug!(path = ?self.state_file, rollout = %state.rollout_id, "state loaded");
        Ok(Some(state))
    }

    fn save(&self, state: &RolloutState) -> StateResult<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).map_err(map_err!(Io))?;
        }
        let bytes = serde_json::to_vec_pretty(state).map_err(map_err!(Serialize))?;
        let tmp = self.temp_path();
        let replaced = write_synced(&tmp, &bytes)
            .and_then(|()| fs::rename(&tmp, &self.state_file).map_err(map_err!(Write)));
        if let Err(e) = replaced {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        sync_parent(&self.state_file);
        debug!(path = ?self.state_file, rollout = %state.rollout_id, "state saved");
        Ok(())
    }

    fn snapshot_baseline(&self, pool: &[ItemCode], now: u64) -> StateResult<SnapshotRef> {
        fs::create_dir_all(&self.backup_dir).map_err(map_err!(Io))?;
        let snapshot = BaselineSnapshot::new(pool, now);
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(map_err!(Serialize))?;
        let stamp = compact_timestamp(now);

        for key in snapshot_keys(&stamp) {
            let path = self.backup_dir.join(format!("{BACKUP_PREFIX}{key}.json"));
            let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StateError::Io(e.to_string())),
            };
            file.write_all(&bytes).map_err(map_err!(Write))?;
            file.sync_all().map_err(map_err!(Write))?;
            debug!(?path, count = snapshot.count, "baseline snapshot written");
            return Ok(SnapshotRef {
                locator: path.display().to_string(),
                key,
            });
        }
        Err(StateError::Write(format!("no free snapshot name for {stamp}")))
    }

    fn list_baselines(&self) -> StateResult<Vec<BaselineSnapshot>> {
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Io(e.to_string())),
        };
        let mut keyed: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let key = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_prefix(BACKUP_PREFIX))
                    .and_then(|n| n.strip_suffix(".json"))?
                    .to_string();
                Some((key, path))
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| snapshot_order(a).cmp(&snapshot_order(b)));
        let paths = keyed.into_iter().map(|(_, path)| path);

        let mut results = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path).map_err(map_err!(Io))?;
            let snapshot: BaselineSnapshot =
                serde_json::from_str(&content).map_err(map_err!(Deserialize))?;
            results.push(snapshot);
        }
        Ok(results)
    }
}

/// Write `bytes` to a fresh file at `path` and fsync it.
fn write_synced(path: &Path, bytes: &[u8]) -> StateResult<()> {
    let mut file = fs::File::create(path).map_err(map_err!(Io))?;
    file.write_all(bytes).map_err(map_err!(Write))?;
    file.sync_all().map_err(map_err!(Write))
}

/// Persist the rename itself. Failures are ignored: the data is already synced.
#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use poolgate_core::{RolloutConfig, RolloutPhase};

    use crate::types::PhaseMetrics;

    fn codes(items: &[&str]) -> Vec<ItemCode> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn test_state() -> RolloutState {
        let mut state = RolloutState::new(
            "ROLLOUT_20240101_000000".to_string(),
            RolloutConfig::default(),
            &codes(&["000001", "000002"]),
            &codes(&["000001", "000002", "000003"]),
            1_704_067_200,
        );
        state.phase_history.push(PhaseMetrics::open(RolloutPhase::Canary, 1_704_067_200, 2));
        state.current_phase = RolloutPhase::Canary;
        state
    }

    fn test_store(dir: &Path) -> FileStore {
        FileStore::new(dir.join("state/rollout_state.json"), dir.join("backups"))
    }

    #[test]
    fn load_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(test_store(dir.path()).load().unwrap().is_none());
    }

    #[test]
    fn load_empty_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        fs::create_dir_all(store.state_file().parent().unwrap()).unwrap();
        fs::write(store.state_file(), "  \n").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        fs::create_dir_all(store.state_file().parent().unwrap()).unwrap();
        fs::write(store.state_file(), "{}").unwrap();
        assert!(matches!(store.load(), Err(StateError::Deserialize(_))));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let state = test_state();

        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn save_replaces_without_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        let mut state = test_state();
        store.save(&state).unwrap();

        state.consecutive_errors = 2;
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap().unwrap().consecutive_errors, 2);
        let names: Vec<String> = fs::read_dir(store.state_file().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rollout_state.json".to_string()]);
    }

    #[test]
    fn snapshot_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());

        let first = store.snapshot_baseline(&codes(&["A", "B"]), 1_704_067_200).unwrap();
        let second = store.snapshot_baseline(&codes(&["C"]), 1_704_067_200).unwrap();
        assert_eq!(first.key, "20240101_000000");
        assert_eq!(second.key, "20240101_000000_1");
        assert!(first.locator.ends_with("pool_backup_20240101_000000.json"));
        assert!(second.locator.ends_with("pool_backup_20240101_000000_1.json"));

        let baselines = store.list_baselines().unwrap();
        assert_eq!(baselines.len(), 2);
        assert_eq!(baselines[0].pool, codes(&["A", "B"]));
        assert_eq!(baselines[0].count, 2);
        assert_eq!(baselines[1].pool, codes(&["C"]));
    }

    #[test]
    fn list_baselines_without_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(test_store(dir.path()).list_baselines().unwrap().is_empty());
    }

    #[test]
    fn list_baselines_keeps_creation_order_past_ten() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        for n in 0..12 {
            let pool: Vec<ItemCode> = (0..n).map(|i| format!("S{i}")).collect();
            store.snapshot_baseline(&pool, 1_704_067_200).unwrap();
        }
        store.snapshot_baseline(&codes(&["late"]), 1_704_067_201).unwrap();

        let counts: Vec<usize> = store.list_baselines().unwrap().iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 1]);
    }

    #[test]
    fn failed_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(dir.path());
        // A non-empty directory where the state file should be makes the rename fail.
        fs::create_dir_all(store.state_file().join("occupied")).unwrap();

        assert!(store.save(&test_state()).is_err());
        let names: Vec<String> = fs::read_dir(store.state_file().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rollout_state.json".to_string()]);
        assert!(store.state_file().is_dir());
    }
}
