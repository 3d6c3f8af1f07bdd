use serde::Serialize;

use disagg_core::{IdSequence, MatchKind, MatchedPair, PointOfInterest};

use super::bitset::PointSet;
use super::candidates::Candidate;
use super::solver::Coverage;
use crate::shapes::split_pairs;

/// A solved (or unsolvable) formulation for one cluster.
#[derive(Debug, Clone)]
pub struct Solution {
    pub coverage: Coverage,
    pub selected: Vec<Candidate>,
    /// Cluster indices no selected candidate covers, ascending.
    pub remaining: Vec<usize>,
    /// Lower is better; infinite when nothing could be solved.
    pub normalized_distance: f64,
}

impl Solution {
    /// Everything left unmatched.
    pub fn unsolved(points: usize, coverage: Coverage) -> Self {
        Self {
            coverage,
            selected: Vec::new(),
            remaining: (0..points).collect(),
            normalized_distance: f64::INFINITY,
        }
    }

    /// Score `selected` against the cluster.
    ///
    /// Each candidate contributes its inverse weight spread over its members;
    /// every uncovered point adds `penalty` per watt of active power.
    pub fn scored(
        points: &[PointOfInterest],
        selected: Vec<Candidate>,
        coverage: Coverage,
        penalty: f64,
    ) -> Self {
        let covered = selected
            .iter()
            .fold(PointSet::new(), |acc, c| acc.union(&c.members));
        let remaining: Vec<usize> = (0..points.len()).filter(|&i| !covered.contains(i)).collect();

        let matched: f64 = selected.iter().map(|c| (1.0 / c.weight) / c.point_count() as f64).sum();
        let unmatched: f64 = remaining.iter().map(|&i| points[i].magnitude()).sum();

        Self {
            coverage,
            selected,
            remaining,
            normalized_distance: matched + penalty * unmatched,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.normalized_distance.is_finite()
    }

    /// Turn the selection into final pairs plus the unmatched points.
    pub fn expand(
        &self,
        points: &[PointOfInterest],
        ids: &mut IdSequence,
    ) -> (Vec<MatchedPair>, Vec<PointOfInterest>) {
        let mut pairs = Vec::new();
        for candidate in &self.selected {
            let counterparts: Vec<&PointOfInterest> =
                candidate.counterparts.iter().map(|&i| &points[i]).collect();
            pairs.extend(split_pairs(
                &points[candidate.anchor],
                &counterparts,
                MatchKind::Combinatorial,
                ids,
            ));
        }
        let unmatched = self.remaining.iter().map(|&i| points[i].clone()).collect();
        (pairs, unmatched)
    }
}

/// Summary of which formulation won for a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Arbitration {
    /// Partial covered everything on its own.
    PartialComplete,
    PartialKept,
    FullAccepted,
    /// The event budget ran out before the full formulation was tried.
    OutOfTime,
    Unsolved,
}
