//! poolgate-state — durable rollout state.
//!
//! Holds the persisted rollout types and the [`RolloutStore`] trait the
//! controller writes through after every mutation.
//!
//! # Backends
//!
//! - [`FileStore`]: one JSON state document replaced by write-then-rename,
//!   plus one `pool_backup_*.json` file per baseline snapshot.
//! - [`RedbStore`]: a [redb](https://docs.rs/redb) database with a
//!   `rollout_state` table and an append-only `baselines` table. Has an
//!   in-memory variant for tests.
//!
//! Baseline snapshots exist for manual disaster recovery only; the
//! controller writes them and never reads them back.

pub mod db;
pub mod error;
pub mod file;
pub mod store;
pub mod tables;
pub mod types;

pub use db::RedbStore;
pub use error::{StateError, StateResult};
pub use file::FileStore;
pub use store::{RolloutStore, SnapshotRef};
pub use types::*;
