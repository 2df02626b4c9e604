//! Simulated planar hand: joint store, forward kinematics and the
//! clearance-based validity rule.
//!
//! Angles are degrees, positions are image pixels with y pointing down.
//! The thumb chain is driven by gamma1..gamma3, the index chain by alpha1 and
//! alpha2 with beta rotating the index base.

use crate::models::{Dof, RigConfig};
use crate::rig::{JointListener, JointManager, ValidityCheck};
use std::collections::BTreeMap;
use tracing::trace;

/// Rest heading of the thumb (pointing right).
const THUMB_REST_DEG: f64 = 0.0;

/// Rest heading of the index finger (pointing down, toward the thumb).
const INDEX_REST_DEG: f64 = 90.0;

/// Joint store of the simulated hand.
pub struct SimulatedHand {
    values: [f64; 6],
    listeners: Vec<JointListener>,
}

impl SimulatedHand {
    /// A hand with every joint at zero.
    pub fn new() -> Self {
        Self {
            values: [0.0; 6],
            listeners: Vec::new(),
        }
    }
}

impl Default for SimulatedHand {
    fn default() -> Self {
        Self::new()
    }
}

impl JointManager for SimulatedHand {
    fn get(&self, dof: Dof) -> f64 {
        self.values[dof.index()]
    }

    fn set(&mut self, dof: Dof, value: f64) {
        self.values[dof.index()] = value;
        trace!(%dof, value, "joint set");
        for listener in &mut self.listeners {
            listener(dof, value);
        }
    }

    fn add_update_listener(&mut self, listener: JointListener) {
        self.listeners.push(listener);
    }
}

/// Positions of the joints of both fingers, base first.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    pub thumb: Vec<[f64; 2]>,
    pub index: Vec<[f64; 2]>,
}

impl HandPose {
    /// Smallest distance between any thumb segment and any index segment.
    pub fn clearance(&self) -> f64 {
        let mut best = f64::INFINITY;
        for a in self.thumb.windows(2) {
            for b in self.index.windows(2) {
                best = best.min(segment_distance(a[0], a[1], b[0], b[1]));
            }
        }
        best
    }

    pub fn thumb_tip(&self) -> [f64; 2] {
        self.thumb[self.thumb.len() - 1]
    }

    pub fn index_tip(&self) -> [f64; 2] {
        self.index[self.index.len() - 1]
    }
}

/// Forward kinematics of the planar hand.
#[derive(Debug, Clone)]
pub struct HandGeometry {
    thumb_base: [f64; 2],
    thumb_segments: [f64; 3],
    index_base: [f64; 2],
    index_segments: [f64; 2],
}

impl HandGeometry {
    pub fn from_config(rig: &RigConfig) -> Self {
        Self {
            thumb_base: rig.thumb_base,
            thumb_segments: rig.thumb_segments,
            index_base: rig.index_base,
            index_segments: rig.index_segments,
        }
    }

    /// Pose of the hand for the current joint values.
    pub fn pose(&self, joints: &dyn JointManager) -> HandPose {
        let thumb_angles = [
            joints.get(Dof::Gamma1),
            joints.get(Dof::Gamma2),
            joints.get(Dof::Gamma3),
        ];
        let index_angles = [
            joints.get(Dof::Beta) + joints.get(Dof::Alpha1),
            joints.get(Dof::Alpha2),
        ];

        HandPose {
            thumb: chain(self.thumb_base, THUMB_REST_DEG, &self.thumb_segments, &thumb_angles),
            index: chain(self.index_base, INDEX_REST_DEG, &self.index_segments, &index_angles),
        }
    }
}

/// Walk a serial chain where each joint angle is relative to its parent.
fn chain(base: [f64; 2], rest_deg: f64, lengths: &[f64], angles: &[f64]) -> Vec<[f64; 2]> {
    let mut points = Vec::with_capacity(lengths.len() + 1);
    let mut heading = rest_deg;
    let mut at = base;
    points.push(at);
    for (len, angle) in lengths.iter().zip(angles) {
        heading += angle;
        let rad = heading.to_radians();
        at = [at[0] + len * rad.cos(), at[1] + len * rad.sin()];
        points.push(at);
    }
    points
}

fn point_segment_distance(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 > 0.0 {
        ((ap[0] * ab[0] + ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let closest = [a[0] + t * ab[0], a[1] + t * ab[1]];
    ((p[0] - closest[0]).powi(2) + (p[1] - closest[1]).powi(2)).sqrt()
}

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

fn segment_distance(a0: [f64; 2], a1: [f64; 2], b0: [f64; 2], b1: [f64; 2]) -> f64 {
    let d1 = cross(b0, b1, a0);
    let d2 = cross(b0, b1, a1);
    let d3 = cross(a0, a1, b0);
    let d4 = cross(a0, a1, b1);
    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return 0.0;
    }
    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}

/// Accepts a configuration when every joint is within its limit and the two
/// fingers keep at least `min_clearance` between them.
#[derive(Debug, Clone)]
pub struct ClearanceCheck {
    geometry: HandGeometry,
    min_clearance: f64,
    joint_limits: BTreeMap<Dof, [f64; 2]>,
}

impl ClearanceCheck {
    pub fn from_config(rig: &RigConfig) -> Self {
        Self {
            geometry: HandGeometry::from_config(rig),
            min_clearance: rig.min_clearance,
            joint_limits: rig.joint_limits.clone(),
        }
    }

    fn within_limits(&self, joints: &dyn JointManager) -> bool {
        self.joint_limits.iter().all(|(&dof, &[lo, hi])| {
            let value = joints.get(dof);
            value >= lo && value <= hi
        })
    }
}

impl ValidityCheck for ClearanceCheck {
    fn is_valid(&self, joints: &dyn JointManager) -> bool {
        self.within_limits(joints)
            && self.geometry.pose(joints).clearance() >= self.min_clearance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_listeners_notified_on_set() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut hand = SimulatedHand::new();
        let sink = Arc::clone(&seen);
        hand.add_update_listener(Box::new(move |dof, value| {
            sink.lock().unwrap().push((dof, value));
        }));

        hand.set(Dof::Alpha1, 12.5);
        hand.set(Dof::Beta, -3.0);

        assert_eq!(hand.get(Dof::Alpha1), 12.5);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(Dof::Alpha1, 12.5), (Dof::Beta, -3.0)]
        );
    }

    #[test]
    fn test_rest_pose() {
        let geometry = HandGeometry::from_config(&RigConfig::default());
        let pose = geometry.pose(&SimulatedHand::new());
        let thumb_tip = pose.thumb_tip();
        let index_tip = pose.index_tip();
        assert!((thumb_tip[0] - 110.0).abs() < 1e-9);
        assert!((thumb_tip[1] - 100.0).abs() < 1e-9);
        assert!((index_tip[0] - 60.0).abs() < 1e-9);
        assert!((index_tip[1] - 83.0).abs() < 1e-9);
        assert!((pose.clearance() - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossing_fingers_are_invalid() {
        let rig = RigConfig {
            index_segments: [50.0, 40.0],
            ..RigConfig::default()
        };
        let check = ClearanceCheck::from_config(&rig);
        assert!(!check.is_valid(&SimulatedHand::new()));

        // Abducting the index away from the thumb clears the overlap
        let mut hand = SimulatedHand::new();
        hand.set(Dof::Beta, 90.0);
        assert!(check.is_valid(&hand));
    }

    #[test]
    fn test_joint_limits() {
        let mut rig = RigConfig::default();
        rig.joint_limits.insert(Dof::Alpha1, [0.0, 10.0]);
        let check = ClearanceCheck::from_config(&rig);

        let mut hand = SimulatedHand::new();
        assert!(check.is_valid(&hand));
        hand.set(Dof::Alpha1, 20.0);
        assert!(!check.is_valid(&hand));
    }

    #[test]
    fn test_segment_distance() {
        assert_eq!(segment_distance([0.0, 0.0], [2.0, 2.0], [0.0, 2.0], [2.0, 0.0]), 0.0);
        let d = segment_distance([0.0, 0.0], [10.0, 0.0], [5.0, 3.0], [5.0, 8.0]);
        assert!((d - 3.0).abs() < 1e-12);
    }
}
