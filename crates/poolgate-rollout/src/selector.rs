//! Phase selection — which items are live at a given phase.
//!
//! ```text
//! added    = sort(target − original)
//! n        = floor(len(added) × percent(phase) / 100)
//! active   = sort(original ∪ added[..n])
//! ```
//!
//! The function is pure: the same inputs always give the same set, so a
//! controller reloaded after a crash recomputes exactly what was live.

use std::collections::BTreeSet;

use poolgate_state::{ItemCode, RolloutConfig, RolloutPhase};

/// Items from `target` that are not in `original`, sorted.
pub fn added_items(original: &[ItemCode], target: &[ItemCode]) -> Vec<ItemCode> {
    let original: BTreeSet<&ItemCode> = original.iter().collect();
    let added: BTreeSet<&ItemCode> = target.iter().filter(|c| !original.contains(c)).collect();
    added.into_iter().cloned().collect()
}

/// Number of added items exposed at `percent`.
pub fn exposed_count(added: usize, percent: f64) -> usize {
    ((added as f64) * percent / 100.0).floor() as usize
}

/// Compute the active set for `phase`.
pub fn compute_active_set(
    phase: RolloutPhase,
    original: &[ItemCode],
    target: &[ItemCode],
    config: &RolloutConfig,
) -> Vec<ItemCode> {
    let added = added_items(original, target);
    let n = exposed_count(added.len(), config.percent_for(phase)).min(added.len());

    let active: BTreeSet<&ItemCode> = original.iter().chain(added[..n].iter()).collect();
    active.into_iter().cloned().collect()
}
