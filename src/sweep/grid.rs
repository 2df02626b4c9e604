//! Odometer over a list of `(Dof, Range)` dimensions.
//!
//! The last dimension turns fastest. When it runs past its `max` it resets to
//! `min` and carries into the dimension before it, exactly like nested loops
//! written outer to inner. Values are computed as `min + k * step` from the
//! per-dimension digit, so rounding never accumulates along a dimension.

use crate::models::{Dof, Range};

/// One full assignment of the swept dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    /// Zero-based linear index in enumeration order
    pub index: u64,

    /// Value of every dimension, outermost first
    pub assignments: Vec<(Dof, f64)>,

    /// First dimension whose value differs from the previous point
    pub first_changed: usize,
}

impl GridPoint {
    /// Dimensions that must be pushed to the rig, outer to inner.
    pub fn changed(&self) -> &[(Dof, f64)] {
        &self.assignments[self.first_changed..]
    }

    pub fn value(&self, dof: Dof) -> Option<f64> {
        self.assignments
            .iter()
            .find(|(d, _)| *d == dof)
            .map(|(_, v)| *v)
    }
}

/// Iterator over every grid point of a parameter space.
#[derive(Debug, Clone)]
pub struct GridIterator {
    dims: Vec<(Dof, Range)>,
    counts: Vec<u64>,
    digits: Vec<u64>,
    next_index: u64,
    total: u64,
    first_changed: usize,
}

impl GridIterator {
    pub fn new(dims: Vec<(Dof, Range)>) -> Self {
        Self::starting_at(dims, 0)
    }

    /// Start at linear index `index`, as if `index` points had been consumed.
    ///
    /// The first point yielded reports every dimension as changed.
    pub fn starting_at(dims: Vec<(Dof, Range)>, index: u64) -> Self {
        let counts: Vec<u64> = dims.iter().map(|(_, r)| r.point_count()).collect();
        let total = counts.iter().fold(1u64, |acc, &c| acc.saturating_mul(c));

        // Mixed-radix decomposition, innermost digit first
        let mut digits = vec![0u64; dims.len()];
        let mut rest = index.min(total);
        for (digit, &count) in digits.iter_mut().zip(&counts).rev() {
            *digit = rest % count;
            rest /= count;
        }

        Self {
            dims,
            counts,
            digits,
            next_index: index.min(total),
            total,
            first_changed: 0,
        }
    }

    fn advance(&mut self) {
        self.next_index += 1;
        for i in (0..self.digits.len()).rev() {
            self.digits[i] += 1;
            if self.digits[i] < self.counts[i] {
                self.first_changed = i;
                return;
            }
            self.digits[i] = 0;
        }
        self.first_changed = 0;
    }
}

impl Iterator for GridIterator {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        if self.next_index >= self.total {
            return None;
        }

        let assignments = self
            .dims
            .iter()
            .zip(&self.digits)
            .map(|(&(dof, range), &k)| (dof, range.value_at(k)))
            .collect();
        let point = GridPoint {
            index: self.next_index,
            assignments,
            first_changed: self.first_changed,
        };

        self.advance();
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next_index;
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParameterSpace;

    fn beta_space() -> ParameterSpace {
        ParameterSpace::fixed(0.0)
            .with(Dof::Beta, Range::new(Dof::Beta, 0.0, 10.0, 5.0).unwrap())
            .unwrap()
    }

    #[test]
    fn test_single_dimension_sweep() {
        let points: Vec<GridPoint> = GridIterator::new(beta_space().dimensions()).collect();
        assert_eq!(points.len(), 3);
        let betas: Vec<f64> = points.iter().map(|p| p.value(Dof::Beta).unwrap()).collect();
        assert_eq!(betas, vec![0.0, 5.0, 10.0]);

        // First point pushes everything, later ones only beta
        assert_eq!(points[0].changed().len(), 6);
        assert_eq!(points[1].changed(), &[(Dof::Beta, 5.0)]);
    }

    #[test]
    fn test_all_fixed_visits_once() {
        let space = ParameterSpace::fixed(3.0)
            .with(Dof::Alpha1, Range::new(Dof::Alpha1, 1.0, 1.0, 7.0).unwrap())
            .unwrap();
        let points: Vec<GridPoint> = GridIterator::new(space.dimensions()).collect();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value(Dof::Alpha1), Some(1.0));
        assert_eq!(points[0].value(Dof::Gamma3), Some(3.0));
    }

    #[test]
    fn test_outer_dimension_carries() {
        let dims = vec![
            (Dof::Gamma1, Range::new(Dof::Gamma1, 0.0, 1.0, 1.0).unwrap()),
            (Dof::Beta, Range::new(Dof::Beta, 0.0, 2.0, 1.0).unwrap()),
        ];
        let points: Vec<GridPoint> = GridIterator::new(dims).collect();
        let pairs: Vec<(f64, f64)> = points
            .iter()
            .map(|p| (p.assignments[0].1, p.assignments[1].1))
            .collect();
        assert_eq!(
            pairs,
            vec![(0.0, 0.0), (0.0, 1.0), (0.0, 2.0), (1.0, 0.0), (1.0, 1.0), (1.0, 2.0)]
        );

        // Carry re-pushes the outer dimension before the inner one
        assert_eq!(points[3].first_changed, 0);
        assert_eq!(points[3].changed(), &[(Dof::Gamma1, 1.0), (Dof::Beta, 0.0)]);
        assert_eq!(points[4].first_changed, 1);
    }

    #[test]
    fn test_starting_at_matches_skip() {
        let space = ParameterSpace::fixed(0.0)
            .with(Dof::Gamma2, Range::new(Dof::Gamma2, 0.0, 2.0, 1.0).unwrap())
            .unwrap()
            .with(Dof::Alpha2, Range::new(Dof::Alpha2, -1.0, 1.0, 0.5).unwrap())
            .unwrap();
        let full: Vec<GridPoint> = GridIterator::new(space.dimensions()).collect();
        assert_eq!(full.len(), 15);

        let resumed: Vec<GridPoint> = GridIterator::starting_at(space.dimensions(), 7).collect();
        assert_eq!(resumed.len(), 8);
        for (a, b) in resumed.iter().zip(&full[7..]) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.assignments, b.assignments);
        }
        assert_eq!(resumed[0].first_changed, 0);
    }

    #[test]
    fn test_starting_past_end_is_empty() {
        let mut grid = GridIterator::starting_at(beta_space().dimensions(), 99);
        assert_eq!(grid.size_hint(), (0, Some(0)));
        assert!(grid.next().is_none());
    }

    #[test]
    fn test_oversized_dimension_does_not_panic() {
        let huge = Range {
            min: 0.0,
            max: 1e12,
            step: 1e-8,
        };
        let dims = vec![(Dof::Gamma1, huge), (Dof::Beta, huge)];
        let mut grid = GridIterator::starting_at(dims, 5);
        let point = grid.next().unwrap();
        assert_eq!(point.index, 5);
        assert_eq!(point.value(Dof::Gamma1), Some(0.0));
        assert!(point.value(Dof::Beta).unwrap() > 0.0);
    }

    #[test]
    fn test_indices_are_sequential() {
        let grid = GridIterator::new(beta_space().dimensions());
        assert_eq!(grid.size_hint(), (3, Some(3)));
        let indices: Vec<u64> = grid.map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
