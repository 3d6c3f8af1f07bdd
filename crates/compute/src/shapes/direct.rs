use disagg_core::{Direction, IdSequence, MatchKind, MatchedPair, PointOfInterest};

use super::{MatchStage, StageOutcome};

/// Pairs each rise with the first later reduction that mirrors it.
pub struct DirectMatch {
    threshold: f64,
}

impl DirectMatch {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl MatchStage for DirectMatch {
    fn name(&self) -> &str {
        "direct_match"
    }

    fn apply(&self, points: Vec<PointOfInterest>, _ids: &mut IdSequence) -> StageOutcome {
        let n = points.len();
        let mut partner: Vec<Option<usize>> = vec![None; n];
        let mut used = vec![false; n];

        for i in 0..n {
            if used[i] || points[i].direction != Direction::Rising {
                continue;
            }
            let found = (i + 1..n).find(|&j| {
                !used[j]
                    && points[j].direction == Direction::Reduction
                    && points[j].minute > points[i].minute
                    && points[i].balance_dist(&points[j]) < self.threshold
            });
            if let Some(j) = found {
                used[i] = true;
                used[j] = true;
                partner[i] = Some(j);
            }
        }

        let mut slots: Vec<Option<PointOfInterest>> = points.into_iter().map(Some).collect();
        let mut outcome = StageOutcome::default();
        for i in 0..n {
            if let Some(j) = partner[i] {
                if let (Some(rising), Some(reduction)) = (slots[i].take(), slots[j].take()) {
                    outcome.pairs.push(MatchedPair::new(rising, reduction, MatchKind::Direct));
                }
            }
        }
        outcome.remaining = slots.into_iter().flatten().collect();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::test_support::{ids_of, poi};

    #[test]
    fn first_qualifying_reduction_wins() {
        let points = vec![
            poi(1, 1, 1000.0, 100.0),
            poi(2, 4, -1010.0, -100.0),
            poi(3, 7, -1000.0, -100.0),
        ];
        let outcome = DirectMatch::new(5.0).apply(points, &mut IdSequence::default());
        assert_eq!(outcome.pairs.len(), 1);
        assert_eq!(outcome.pairs[0].rising.id.0, 1);
        assert_eq!(outcome.pairs[0].reduction.id.0, 2);
        assert_eq!(ids_of(&outcome.remaining), vec![3]);
    }

    #[test]
    fn reductions_before_the_rise_are_ignored() {
        let points = vec![poi(1, 1, -500.0, 0.0), poi(2, 3, 500.0, 0.0)];
        let outcome = DirectMatch::new(5.0).apply(points, &mut IdSequence::default());
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.remaining.len(), 2);
    }

    #[test]
    fn overlapping_cycles_pair_in_order() {
        let points = vec![
            poi(1, 1, 2000.0, 0.0),
            poi(2, 3, 60.0, 20.0),
            poi(3, 5, -61.0, -20.0),
            poi(4, 9, -1990.0, 0.0),
        ];
        let outcome = DirectMatch::new(5.0).apply(points, &mut IdSequence::default());
        assert_eq!(outcome.pairs.len(), 2);
        assert!(outcome.remaining.is_empty());
        let pairs: Vec<(u64, u64)> = outcome
            .pairs
            .iter()
            .map(|p| (p.rising.id.0, p.reduction.id.0))
            .collect();
        assert_eq!(pairs, vec![(1, 4), (2, 3)]);
    }

    #[test]
    fn loose_match_left_for_later_stages() {
        let points = vec![poi(1, 1, 1000.0, 0.0), poi(2, 5, -900.0, 0.0)];
        let outcome = DirectMatch::new(5.0).apply(points, &mut IdSequence::default());
        assert!(outcome.pairs.is_empty());
    }
}
