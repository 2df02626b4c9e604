//! handsweep - Joint-space sweep dataset generator for a hand/finger touch rig.
//!
//! ## Architecture
//!
//! The generator walks every point of a six-DOF joint grid and talks to the
//! rig only through small traits:
//! - **Joint Manager**: get/set joint values, update listeners
//! - **Validity Check**: accept or reject the current configuration
//! - **Stream Data Generator**: CSV line, image name and encoded image
//! - **Dataset Panel**: parameter space in, total and progress out
//! - **Completion Sink**: final run summary
//!
//! ## Flow
//!
//! Panel → Grid → [push joints → validity → sample → CSV + image] → Completion
//!
//! Each accepted sample lands on disk atomically (image and CSV line, or
//! neither). Runs are cancellable between grid points and resumable from a
//! checkpoint in the output folder.

pub mod checkpoint;
pub mod models;
pub mod output;
pub mod rig;
pub mod sweep;

// Re-exports for convenience
pub use checkpoint::{CheckpointManager, SweepCheckpoint};
pub use models::{Config, Dof, ParameterSpace, Range, Result, RunSummary, SweepError};
pub use output::SampleWriter;
pub use rig::{
    ClearanceCheck, ConsolePanel, LogCompletion, Rig, SimulatedHand, StickFigureStream,
};
pub use sweep::{CancelHandle, DatasetGenerator, GeneratorSettings, GridIterator};
