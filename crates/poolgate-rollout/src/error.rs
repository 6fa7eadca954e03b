//! Error types for rollout control.

use poolgate_state::{RolloutStatus, StateError};
use thiserror::Error;

/// Result type alias for controller operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Failures of controller operations.
///
/// A gate that is not yet satisfied is not an error; `advance` reports it
/// as [`Advance::Held`](crate::controller::Advance::Held).
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("rollout {0} is already in progress")]
    AlreadyInProgress(String),

    #[error("no active rollout")]
    NoActiveRollout,

    #[error("cannot {operation} a rollout that is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: RolloutStatus,
    },

    /// The state could not be persisted. The in-memory state is unchanged.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StateError),
}
