//! Collaborators of the sweep driver.
//!
//! The driver only talks to the rig through the traits below. The concrete
//! types in this module are deterministic stand-ins: a simulated planar hand,
//! a clearance-based validity rule, a stick-figure PNG stream and a console
//! panel. The real rig plugs in by implementing the same traits.

mod hand;
mod panel;
mod stream;

pub use hand::*;
pub use panel::*;
pub use stream::*;

use crate::models::{Dof, ParameterSpace, Result, RunSummary, SampleData};

/// Callback fired after a joint value changes.
pub type JointListener = Box<dyn FnMut(Dof, f64) + Send>;

/// Get/set access to the joints of the rig.
pub trait JointManager {
    /// Current value of a joint.
    fn get(&self, dof: Dof) -> f64;

    /// Move a joint. Implementations notify their listeners.
    fn set(&mut self, dof: Dof, value: f64);

    /// Register an update listener. The sweep itself never listens.
    fn add_update_listener(&mut self, listener: JointListener);
}

/// Whether the current joint configuration may be captured.
pub trait ValidityCheck {
    fn is_valid(&self, joints: &dyn JointManager) -> bool;
}

/// Produces the CSV header and per-sample payloads.
pub trait StreamDataGenerator {
    /// First line of a new CSV file.
    fn header(&self) -> String;

    /// Data line, unique image name and encoded image for the current state.
    fn sample(&mut self, joints: &dyn JointManager) -> Result<SampleData>;
}

/// Source of the parameter space and sink for progress counts.
pub trait DatasetPanel {
    /// The space for the next run, or `None` if the panel cannot supply one.
    /// The panel reports its own failure.
    fn pack_parameters(&mut self) -> Option<ParameterSpace>;

    fn report_total(&mut self, total: u64);

    fn report_progress(&mut self, current: u64);
}

/// Receives the final summary of a run.
pub trait CompletionSink {
    fn finished(&mut self, summary: &RunSummary);
}

/// The full set of collaborators a generator drives.
pub struct Rig {
    pub joints: Box<dyn JointManager + Send>,
    pub validity: Box<dyn ValidityCheck + Send>,
    pub stream: Box<dyn StreamDataGenerator + Send>,
    pub panel: Box<dyn DatasetPanel + Send>,
    pub completion: Box<dyn CompletionSink + Send>,
}

impl Rig {
    /// Whether the rig accepts its current configuration.
    pub fn is_valid(&self) -> bool {
        self.validity.is_valid(self.joints.as_ref())
    }

    /// Ask the stream generator for a sample of the current configuration.
    pub fn sample(&mut self) -> Result<SampleData> {
        self.stream.sample(self.joints.as_ref())
    }
}
