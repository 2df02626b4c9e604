//! Checkpoint module for resumable sweeps.
//!
//! Provides:
//! - `SweepCheckpoint`: next grid index and counters of an interrupted run
//! - `CheckpointManager`: persistence and loading of checkpoint state

mod state;

pub use state::*;
