use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Run-scoped identifier of a point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoiId(pub u64);

impl std::fmt::Display for PoiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "poi-{}", self.0)
    }
}

/// Direction of a power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Rising,
    Reduction,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Rising => Direction::Reduction,
            Direction::Reduction => Direction::Rising,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Rising => write!(f, "Rising"),
            Direction::Reduction => write!(f, "Reduction"),
        }
    }
}

/// Signed active/reactive power delta.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerVector {
    pub p: f64,
    pub q: f64,
}

impl PowerVector {
    pub const ZERO: PowerVector = PowerVector { p: 0.0, q: 0.0 };

    pub fn new(p: f64, q: f64) -> Self {
        Self { p, q }
    }

    /// Euclidean length over (active, reactive).
    pub fn norm(&self) -> f64 {
        (self.p * self.p + self.q * self.q).sqrt()
    }

    /// Percentage Euclidean distance from `self` to `other`, relative to `self`.
    ///
    /// `100 * |self - other| / norm(self)`. A zero reference yields `0.0` when
    /// `other` is also zero and `f64::INFINITY` otherwise.
    pub fn pct_dist(&self, other: &PowerVector) -> f64 {
        let diff = (*self - *other).norm();
        let reference = self.norm();
        if reference <= f64::EPSILON {
            return if diff <= f64::EPSILON { 0.0 } else { f64::INFINITY };
        }
        100.0 * diff / reference
    }
}

impl Add for PowerVector {
    type Output = PowerVector;

    fn add(self, rhs: PowerVector) -> PowerVector {
        PowerVector::new(self.p + rhs.p, self.q + rhs.q)
    }
}

impl Sub for PowerVector {
    type Output = PowerVector;

    fn sub(self, rhs: PowerVector) -> PowerVector {
        PowerVector::new(self.p - rhs.p, self.q - rhs.q)
    }
}

impl Neg for PowerVector {
    type Output = PowerVector;

    fn neg(self) -> PowerVector {
        PowerVector::new(-self.p, -self.q)
    }
}

impl Sum for PowerVector {
    fn sum<I: Iterator<Item = PowerVector>>(iter: I) -> PowerVector {
        iter.fold(PowerVector::ZERO, |acc, v| acc + v)
    }
}

impl<'a> Sum<&'a PowerVector> for PowerVector {
    fn sum<I: Iterator<Item = &'a PowerVector>>(iter: I) -> PowerVector {
        iter.fold(PowerVector::ZERO, |acc, v| acc + *v)
    }
}

/// An atomic power transition inside an event.
///
/// `minute` is the offset of the first sample at the new power level,
/// relative to the event start. `origin` is only set on synthesized split
/// endpoints and names the real point they stand in for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: PoiId,
    pub minute: usize,
    pub direction: Direction,
    pub p_diff: f64,
    pub q_diff: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<PoiId>,
}

impl PointOfInterest {
    pub fn new(id: PoiId, minute: usize, direction: Direction, p_diff: f64, q_diff: f64) -> Self {
        Self {
            id,
            minute,
            direction,
            p_diff,
            q_diff,
            origin: None,
        }
    }

    /// A stand-in for `origin` at `origin.minute` carrying `vector`.
    pub fn synthesized(id: PoiId, origin: &PointOfInterest, vector: PowerVector) -> Self {
        Self {
            id,
            minute: origin.minute,
            direction: origin.direction,
            p_diff: vector.p,
            q_diff: vector.q,
            origin: Some(origin.id),
        }
    }

    pub fn vector(&self) -> PowerVector {
        PowerVector::new(self.p_diff, self.q_diff)
    }

    pub fn negated(&self) -> PowerVector {
        -self.vector()
    }

    pub fn magnitude(&self) -> f64 {
        self.p_diff.abs()
    }

    pub fn norm(&self) -> f64 {
        self.vector().norm()
    }

    pub fn is_rising(&self) -> bool {
        self.direction == Direction::Rising
    }

    pub fn is_synthesized(&self) -> bool {
        self.origin.is_some()
    }

    /// `pct_dist` with this point as the reference vector.
    pub fn pct_dist(&self, other: &PowerVector) -> f64 {
        self.vector().pct_dist(other)
    }

    /// How far `other` is from cancelling this point out.
    pub fn balance_dist(&self, other: &PointOfInterest) -> f64 {
        self.pct_dist(&other.negated())
    }
}

/// Sort points chronologically; equal minutes keep creation order.
pub fn sort_chronologically(points: &mut [PointOfInterest]) {
    points.sort_by_key(|p| (p.minute, p.id));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poi(id: u64, minute: usize, p: f64, q: f64) -> PointOfInterest {
        let dir = if p >= 0.0 { Direction::Rising } else { Direction::Reduction };
        PointOfInterest::new(PoiId(id), minute, dir, p, q)
    }

    #[test]
    fn norm_is_euclidean() {
        assert!((PowerVector::new(3.0, 4.0).norm() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn pct_dist_matches_definition() {
        let a = PowerVector::new(1000.0, 200.0);
        let b = PowerVector::new(900.0, 200.0);
        let expected = 100.0 * 100.0 / a.norm();
        assert!((a.pct_dist(&b) - expected).abs() < 1e-9);
    }

    #[test]
    fn pct_dist_is_relative_to_reference() {
        let a = PowerVector::new(1000.0, 0.0);
        let b = PowerVector::new(500.0, 0.0);
        assert!((a.pct_dist(&b) - 50.0).abs() < 1e-9);
        assert!((b.pct_dist(&a) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn pct_dist_zero_reference() {
        assert_eq!(PowerVector::ZERO.pct_dist(&PowerVector::ZERO), 0.0);
        assert!(PowerVector::ZERO.pct_dist(&PowerVector::new(1.0, 0.0)).is_infinite());
    }

    #[test]
    fn balance_dist_of_mirror_pair_is_zero() {
        let on = poi(1, 3, 1000.0, 200.0);
        let off = poi(2, 9, -1000.0, -200.0);
        assert!(on.balance_dist(&off) < 1e-12);
        assert!(off.balance_dist(&on) < 1e-12);
    }

    #[test]
    fn synthesized_point_keeps_origin_minute() {
        let on = poi(1, 3, 1000.0, 200.0);
        let split = PointOfInterest::synthesized(PoiId(7), &on, PowerVector::new(500.0, 100.0));
        assert_eq!(split.minute, 3);
        assert_eq!(split.direction, Direction::Rising);
        assert_eq!(split.origin, Some(PoiId(1)));
        assert!(split.is_synthesized());
    }

    #[test]
    fn sort_breaks_ties_by_creation_order() {
        let mut points = vec![poi(5, 2, -10.0, 0.0), poi(3, 2, 10.0, 0.0), poi(1, 1, 5.0, 0.0)];
        sort_chronologically(&mut points);
        let ids: Vec<u64> = points.iter().map(|p| p.id.0).collect();
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn vector_sum() {
        let total: PowerVector = [PowerVector::new(1.0, 2.0), PowerVector::new(3.0, -1.0)]
            .iter()
            .sum();
        assert_eq!(total, PowerVector::new(4.0, 1.0));
    }
}
