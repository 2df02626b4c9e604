//! Sample and run bookkeeping types.

use serde::{Deserialize, Serialize};

/// One accepted grid point as produced by the stream data generator.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    /// CSV line, written verbatim (no trailing newline)
    pub data_line: String,

    /// Image file name, unique within a run
    pub image_name: String,

    /// Encoded image bytes
    pub image: Vec<u8>,
}

/// Counters of a single run.
///
/// Both are monotonically non-decreasing and `valid <= current` always.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Grid points visited so far
    pub current: u64,
    /// Samples accepted by the validity check
    pub valid: u64,
}

impl RunCounters {
    /// Record a visited grid point, returning the new `current`.
    pub fn visit(&mut self) -> u64 {
        self.current += 1;
        self.current
    }

    /// Record an accepted sample.
    pub fn accept(&mut self) {
        debug_assert!(self.valid < self.current);
        self.valid += 1;
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    /// Every grid point was visited
    Completed,
    /// Stopped by a cancellation request
    Cancelled,
}

/// Final report of a run, handed to the completion sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub outcome: RunOutcome,

    /// Grid points visited and samples accepted
    pub counters: RunCounters,

    /// Grid size announced to the panel
    pub total: u64,

    /// Whether samples were written (false for a search run)
    pub wrote_output: bool,

    /// Total runtime in seconds
    pub runtime_secs: f64,

    /// Accepted / visited (0.0 - 1.0)
    pub acceptance_rate: f64,

    /// Grid points per second
    pub points_per_sec: f64,
}

impl RunSummary {
    pub fn new(outcome: RunOutcome, counters: RunCounters, total: u64, wrote_output: bool) -> Self {
        Self {
            outcome,
            counters,
            total,
            wrote_output,
            runtime_secs: 0.0,
            acceptance_rate: 0.0,
            points_per_sec: 0.0,
        }
    }

    /// Calculate derived stats.
    pub fn finalize(&mut self, runtime_secs: f64) {
        self.runtime_secs = runtime_secs;
        if self.counters.current > 0 {
            self.acceptance_rate = self.counters.valid as f64 / self.counters.current as f64;
        }
        if runtime_secs > 0.0 {
            self.points_per_sec = self.counters.current as f64 / runtime_secs;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == RunOutcome::Cancelled
    }
}
