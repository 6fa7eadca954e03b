//! RedbStore — redb-backed rollout persistence.
//!
//! The live state sits under a single key of the `rollout_state` table and
//! is replaced inside one write transaction. Baselines are appended to the
//! `baselines` table and never rewritten. Supports on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::store::{map_err, snapshot_keys, snapshot_order, RolloutStore, SnapshotRef};
use crate::tables::*;
use crate::types::{compact_timestamp, BaselineSnapshot, ItemCode, RolloutState};

/// Thread-safe rollout store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(map_err!(Io))?;
        }
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "rollout store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory rollout store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ROLLOUT_STATE).map_err(map_err!(Table))?;
        txn.open_table(BASELINES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl RolloutStore for RedbStore {
    fn load(&self) -> StateResult<Option<RolloutState>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ROLLOUT_STATE).map_err(map_err!(Table))?;
        match table.get(CURRENT_KEY).map_err(map_err!(Read))? {
            Some(guard) => {
                let state: RolloutState =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    fn save(&self, state: &RolloutState) -> StateResult<()> {
        let value = serde_json::to_vec(state).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ROLLOUT_STATE).map_err(map_err!(Table))?;
            table
                .insert(CURRENT_KEY, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(rollout = %state.rollout_id, "state stored");
        Ok(())
    }

    fn snapshot_baseline(&self, pool: &[ItemCode], now: u64) -> StateResult<SnapshotRef> {
        let snapshot = BaselineSnapshot::new(pool, now);
        let value = serde_json::to_vec(&snapshot).map_err(map_err!(Serialize))?;
        let stamp = compact_timestamp(now);

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let key;
        {
            let mut table = txn.open_table(BASELINES).map_err(map_err!(Table))?;
            let mut candidates = snapshot_keys(&stamp);
            key = loop {
                let Some(candidate) = candidates.next() else {
                    return Err(StateError::Write(format!(
                        "no free snapshot key for {stamp}"
                    )));
                };
                if table.get(candidate.as_str()).map_err(map_err!(Read))?.is_none() {
                    break candidate;
                }
            };
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, count = snapshot.count, "baseline snapshot stored");
        Ok(SnapshotRef {
            locator: format!("baselines:{key}"),
            key,
        })
    }

    fn list_baselines(&self) -> StateResult<Vec<BaselineSnapshot>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(BASELINES).map_err(map_err!(Table))?;
        let mut keyed = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let snapshot: BaselineSnapshot =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            keyed.push((key.value().to_string(), snapshot));
        }
        keyed.sort_by(|(a, _), (b, _)| snapshot_order(a).cmp(&snapshot_order(b)));
        Ok(keyed.into_iter().map(|(_, snapshot)| snapshot).collect())
    }
}
