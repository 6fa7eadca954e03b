//! poolgate rollout control — phased exposure of a new item pool.
//!
//! This crate drives a single rollout from a baseline pool to a target
//! pool through five exposure phases, gating each step on observation
//! time and outcome rates, and reverting to the baseline on demand or
//! after too many consecutive errors.
//!
//! # Components
//!
//! - **`controller`** — Rollout state machine (start, advance, pause, rollback, outcomes)
//! - **`gate`** — Advancement rules for the open phase
//! - **`selector`** — Deterministic active set per phase
//! - **`validator`** — Advisory checks on the live set
//! - **`report`** — Plain-text progress, phase and summary reports
//! - **`clock`** — Injectable time source

pub mod clock;
pub mod controller;
pub mod error;
pub mod gate;
pub mod report;
pub mod selector;
pub mod validator;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{completion_percent, Advance, Progress, RolloutController};
pub use error::{RolloutError, RolloutResult};
pub use gate::GateDecision;
pub use validator::{CheckResult, DataProbe, DirectoryProbe, RolloutValidator, ValidationReport};
