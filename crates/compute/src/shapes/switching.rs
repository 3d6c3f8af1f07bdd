use disagg_core::{Direction, IdSequence, PointOfInterest};

use super::{MatchStage, StageOutcome};

/// Drops a reduction immediately followed by a rise that cancels it.
///
/// Such blips are switching transients, not appliance cycles, so the pair is
/// discarded instead of reported.
pub struct SwitchingPairs {
    threshold: f64,
    max_gap: usize,
}

impl SwitchingPairs {
    pub fn new(threshold: f64, max_gap: usize) -> Self {
        Self { threshold, max_gap }
    }
}

impl MatchStage for SwitchingPairs {
    fn name(&self) -> &str {
        "switching_pairs"
    }

    fn apply(&self, points: Vec<PointOfInterest>, _ids: &mut IdSequence) -> StageOutcome {
        let mut keep = vec![true; points.len()];
        let mut i = 0;
        while i + 1 < points.len() {
            let (down, up) = (&points[i], &points[i + 1]);
            if down.direction == Direction::Reduction
                && up.direction == Direction::Rising
                && up.minute - down.minute <= self.max_gap
                && up.balance_dist(down) < self.threshold
            {
                keep[i] = false;
                keep[i + 1] = false;
                i += 2;
            } else {
                i += 1;
            }
        }

        let mut outcome = StageOutcome::default();
        for (point, kept) in points.into_iter().zip(keep) {
            if kept {
                outcome.remaining.push(point);
            } else {
                outcome.dropped.push(point);
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::test_support::{ids_of, poi};

    fn stage() -> SwitchingPairs {
        SwitchingPairs::new(20.0, 1)
    }

    #[test]
    fn dip_and_recovery_is_dropped() {
        let points = vec![
            poi(1, 1, 1000.0, 0.0),
            poi(2, 5, -300.0, 0.0),
            poi(3, 6, 290.0, 0.0),
            poi(4, 9, -1000.0, 0.0),
        ];
        let outcome = stage().apply(points, &mut IdSequence::default());
        assert!(outcome.pairs.is_empty());
        assert_eq!(ids_of(&outcome.dropped), vec![2, 3]);
        assert_eq!(ids_of(&outcome.remaining), vec![1, 4]);
    }

    #[test]
    fn rise_then_reduction_is_not_switching() {
        let points = vec![poi(1, 5, 300.0, 0.0), poi(2, 6, -300.0, 0.0)];
        let outcome = stage().apply(points, &mut IdSequence::default());
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.remaining.len(), 2);
    }

    #[test]
    fn distant_or_unbalanced_pairs_are_kept() {
        let points = vec![
            poi(1, 5, -300.0, 0.0),
            poi(2, 9, 300.0, 0.0),
            poi(3, 10, -300.0, 0.0),
            poi(4, 11, 100.0, 0.0),
        ];
        let outcome = stage().apply(points, &mut IdSequence::default());
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.remaining.len(), 4);
    }
}
