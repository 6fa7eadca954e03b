//! redb table definitions for the poolgate state store.
//!
//! Both tables use `&str` keys and `&[u8]` values (JSON-serialized types).

use redb::TableDefinition;

/// The live rollout document, stored under [`CURRENT_KEY`].
pub const ROLLOUT_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("rollout_state");

/// Baseline snapshots keyed by `{YYYYMMDD_HHMMSS}` (suffixed `_{n}` on collision).
pub const BASELINES: TableDefinition<&str, &[u8]> = TableDefinition::new("baselines");

/// Key of the single live rollout record.
pub const CURRENT_KEY: &str = "current";
