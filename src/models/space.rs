//! Joint parameter space: degrees of freedom and their sweep ranges.
//!
//! The DOF declaration order is the sweep nesting order (gamma1 outermost,
//! beta innermost) and the CSV column order. `Dof` derives `Ord` from that
//! order so a `BTreeMap<Dof, _>` iterates the dimensions outer to inner.

use crate::models::{Result, SweepError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Smallest advance applied to a positive step. Guarantees loop termination
/// for denormal-sized steps.
pub const STEP_FLOOR: f64 = 1e-8;

/// Relative slack applied to the inclusive upper bound so that accumulated
/// rounding (e.g. `0.1 * 30`) does not drop the last grid value.
const INCLUSIVE_TOLERANCE: f64 = 1e-9;

/// Cap on that slack, in steps, so that huge spans never gain a whole step.
const MAX_INCLUSIVE_SLACK: f64 = 1e-3;

/// A degree of freedom of the simulated hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dof {
    /// Thumb base flexion
    Gamma1,
    /// Thumb middle flexion
    Gamma2,
    /// Thumb distal flexion
    Gamma3,
    /// Index proximal flexion
    Alpha1,
    /// Index distal flexion
    Alpha2,
    /// Index abduction
    Beta,
}

impl Dof {
    /// All DOFs in sweep nesting order.
    pub const ALL: [Dof; 6] = [
        Dof::Gamma1,
        Dof::Gamma2,
        Dof::Gamma3,
        Dof::Alpha1,
        Dof::Alpha2,
        Dof::Beta,
    ];

    /// Position in declaration order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Dof::Gamma1 => "gamma1",
            Dof::Gamma2 => "gamma2",
            Dof::Gamma3 => "gamma3",
            Dof::Alpha1 => "alpha1",
            Dof::Alpha2 => "alpha2",
            Dof::Beta => "beta",
        }
    }
}

impl fmt::Display for Dof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive sweep range of one DOF.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    /// Zero holds the DOF fixed at `min`.
    #[serde(default)]
    pub step: f64,
}

impl Range {
    /// Create a validated range.
    pub fn new(dof: Dof, min: f64, max: f64, step: f64) -> Result<Self> {
        let range = Self { min, max, step };
        range.validate(dof)?;
        Ok(range)
    }

    /// A range that holds the DOF at a single value.
    pub fn fixed(value: f64) -> Self {
        Self {
            min: value,
            max: value,
            step: 0.0,
        }
    }

    /// Check `min <= max`, `step >= 0`, that every bound is finite and that
    /// the number of values fits in a `u64`.
    pub fn validate(&self, dof: Dof) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.step.is_finite();
        if !finite
            || self.min > self.max
            || self.step < 0.0
            || self.checked_point_count().is_none()
        {
            return Err(SweepError::InvalidRange {
                dof,
                min: self.min,
                max: self.max,
                step: self.step,
            });
        }
        Ok(())
    }

    /// Whether the DOF takes a single value during the sweep.
    pub fn is_fixed(&self) -> bool {
        self.step <= 0.0 || self.max <= self.min
    }

    /// Advance between consecutive values.
    pub fn effective_step(&self) -> f64 {
        self.step.max(STEP_FLOOR)
    }

    /// Number of values visited along this dimension:
    /// `floor((max - min) / step) + 1`, or 1 for a fixed DOF.
    ///
    /// Saturates at `u64::MAX` for ranges that `validate` rejects.
    pub fn point_count(&self) -> u64 {
        self.checked_point_count().unwrap_or(u64::MAX)
    }

    fn checked_point_count(&self) -> Option<u64> {
        if self.is_fixed() {
            return Some(1);
        }
        let span = (self.max - self.min) / self.effective_step();
        let slack = (span * INCLUSIVE_TOLERANCE).min(MAX_INCLUSIVE_SLACK);
        let steps = (span + slack).floor();
        // `u64::MAX as f64` rounds up to 2^64
        if !(steps < u64::MAX as f64) {
            return None;
        }
        (steps as u64).checked_add(1)
    }

    /// The `k`-th value of the dimension, clamped to `max`.
    pub fn value_at(&self, k: u64) -> f64 {
        if self.is_fixed() {
            return self.min;
        }
        (self.min + k as f64 * self.effective_step()).min(self.max)
    }
}

/// One range per DOF, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Dof, Range>",
    into = "BTreeMap<Dof, Range>"
)]
pub struct ParameterSpace {
    ranges: BTreeMap<Dof, Range>,
}

impl ParameterSpace {
    /// Build a space from a complete DOF → Range map.
    pub fn new(ranges: BTreeMap<Dof, Range>) -> Result<Self> {
        for dof in Dof::ALL {
            let range = ranges.get(&dof).ok_or(SweepError::MissingRange(dof))?;
            range.validate(dof)?;
        }
        Ok(Self { ranges })
    }

    /// Every DOF held at `value`.
    pub fn fixed(value: f64) -> Self {
        Self {
            ranges: Dof::ALL
                .iter()
                .map(|&dof| (dof, Range::fixed(value)))
                .collect(),
        }
    }

    /// Replace the range of one DOF.
    pub fn with(mut self, dof: Dof, range: Range) -> Result<Self> {
        range.validate(dof)?;
        self.ranges.insert(dof, range);
        Ok(self)
    }

    pub fn get(&self, dof: Dof) -> Range {
        self.ranges[&dof]
    }

    /// `(DOF, Range)` pairs, outermost dimension first.
    pub fn dimensions(&self) -> Vec<(Dof, Range)> {
        self.ranges.iter().map(|(&dof, &range)| (dof, range)).collect()
    }

    /// Total number of grid points the sweep visits.
    pub fn total_points(&self) -> u64 {
        self.ranges
            .values()
            .fold(1u64, |acc, r| acc.saturating_mul(r.point_count()))
    }
}

impl TryFrom<BTreeMap<Dof, Range>> for ParameterSpace {
    type Error = SweepError;

    fn try_from(ranges: BTreeMap<Dof, Range>) -> Result<Self> {
        Self::new(ranges)
    }
}

impl From<ParameterSpace> for BTreeMap<Dof, Range> {
    fn from(space: ParameterSpace) -> Self {
        space.ranges
    }
}
