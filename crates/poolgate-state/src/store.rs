//! The persistence seam for rollout state.
//!
//! The controller only sees [`RolloutStore`]. Two backends ship with the
//! crate: [`FileStore`](crate::file::FileStore) (a JSON document replaced
//! atomically) and [`RedbStore`](crate::db::RedbStore).

use crate::error::StateResult;
use crate::types::{BaselineSnapshot, ItemCode, RolloutState};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}
pub(crate) use map_err;

/// Where a baseline snapshot was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRef {
    /// `YYYYMMDD_HHMMSS`, suffixed `_{n}` when that second was already taken.
    pub key: String,
    /// File path or table key, for operators.
    pub locator: String,
}

/// Durable storage for the single live rollout record.
pub trait RolloutStore: Send + Sync {
    /// Load the last saved state, or `None` if nothing was ever saved.
    fn load(&self) -> StateResult<Option<RolloutState>>;

    /// Replace the saved state. Must be atomic: a reader sees either the
    /// previous document or this one, never a torn write.
    fn save(&self, state: &RolloutState) -> StateResult<()>;

    /// Write a new, never-overwritten copy of `pool`.
    ///
    /// The returned key is unique within the store.
    fn snapshot_baseline(&self, pool: &[ItemCode], now: u64) -> StateResult<SnapshotRef>;

    /// All baseline snapshots, oldest first.
    fn list_baselines(&self) -> StateResult<Vec<BaselineSnapshot>>;
}

impl<T: RolloutStore + ?Sized> RolloutStore for Box<T> {
    fn load(&self) -> StateResult<Option<RolloutState>> {
        (**self).load()
    }

    fn save(&self, state: &RolloutState) -> StateResult<()> {
        (**self).save(state)
    }

    fn snapshot_baseline(&self, pool: &[ItemCode], now: u64) -> StateResult<SnapshotRef> {
        (**self).snapshot_baseline(pool, now)
    }

    fn list_baselines(&self) -> StateResult<Vec<BaselineSnapshot>> {
        (**self).list_baselines()
    }
}

/// Candidate snapshot names for a timestamp: `stamp`, `stamp_1`, `stamp_2`, ...
pub(crate) fn snapshot_keys(stamp: &str) -> impl Iterator<Item = String> + '_ {
    (0u32..).map(move |n| match n {
        0 => stamp.to_string(),
        n => format!("{stamp}_{n}"),
    })
}

/// Length of a `YYYYMMDD_HHMMSS` stamp.
const STAMP_LEN: usize = 15;

/// Chronological sort key for a snapshot key: stamp, then collision suffix.
pub(crate) fn snapshot_order(key: &str) -> (&str, u32) {
    let seq = key
        .get(STAMP_LEN..)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|n| n.parse().ok());
    match (key.get(..STAMP_LEN), seq) {
        (Some(stamp), Some(seq)) => (stamp, seq),
        _ => (key, 0),
    }
}
