use std::ops::Range;

use disagg_core::{Direction, IdSequence, MatchKind, MatchedPair, PointOfInterest, PowerVector};

use super::{MatchStage, StageOutcome};

/// Collapses a balanced burst of closely spaced points into a single pair.
///
/// Motor-driven appliances produce many small steps in a short span. When
/// the burst opens with a rise, closes with a reduction and sums to roughly
/// zero, it is reported as one cycle between synthesized endpoints carrying
/// the aggregate rise and aggregate reduction.
pub struct DenseClusters {
    max_gap: usize,
    min_points: usize,
    concentration: f64,
    threshold: f64,
}

impl DenseClusters {
    pub fn new(max_gap: usize, min_points: usize, concentration: f64, threshold: f64) -> Self {
        Self {
            max_gap,
            min_points,
            concentration,
            threshold,
        }
    }

    fn runs(&self, points: &[PointOfInterest]) -> Vec<Range<usize>> {
        let mut runs = Vec::new();
        let mut start = 0;
        for i in 1..=points.len() {
            let breaks = i == points.len() || points[i].minute - points[i - 1].minute > self.max_gap;
            if breaks {
                if i > start {
                    runs.push(start..i);
                }
                start = i;
            }
        }
        runs
    }

    /// Aggregate rise and reduction of a run, if the run qualifies.
    fn qualifies(&self, run: &[PointOfInterest]) -> Option<(PowerVector, PowerVector)> {
        let (first, last) = (run.first()?, run.last()?);
        if run.len() < self.min_points
            || first.direction != Direction::Rising
            || last.direction != Direction::Reduction
        {
            return None;
        }

        let span = last.minute - first.minute;
        let density = run.len() as f64 / (span + 1) as f64;
        if density < self.concentration {
            return None;
        }

        let up: PowerVector = run.iter().filter(|p| p.is_rising()).map(|p| p.vector()).sum();
        let down: PowerVector = run.iter().filter(|p| !p.is_rising()).map(|p| p.vector()).sum();
        (up.pct_dist(&-down) < self.threshold).then_some((up, down))
    }
}

impl MatchStage for DenseClusters {
    fn name(&self) -> &str {
        "dense_clusters"
    }

    fn apply(&self, points: Vec<PointOfInterest>, ids: &mut IdSequence) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        let mut cursor = 0;

        for run in self.runs(&points) {
            outcome.remaining.extend_from_slice(&points[cursor..run.start]);
            cursor = run.end;

            let slice = &points[run.clone()];
            match self.qualifies(slice) {
                Some((up, down)) => {
                    let rising = PointOfInterest::synthesized(ids.next_poi_id(), &slice[0], up);
                    let reduction =
                        PointOfInterest::synthesized(ids.next_poi_id(), &slice[slice.len() - 1], down);
                    outcome
                        .pairs
                        .push(MatchedPair::new(rising, reduction, MatchKind::DenseCluster));
                }
                None => outcome.remaining.extend_from_slice(slice),
            }
        }
        outcome.remaining.extend_from_slice(&points[cursor..]);
        outcome
    }
}
