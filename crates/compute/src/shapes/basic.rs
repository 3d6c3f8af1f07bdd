use disagg_core::{Direction, IdSequence, MatchKind, MatchedPair, PointOfInterest};

use super::{split_pairs, MatchStage, StageOutcome};

/// Left-to-right scan for chairs, inverted chairs, triangles and rectangles.
///
/// Three-point windows are tried before two-point ones at every position.
/// A matched window is consumed whole and the scan resumes after it.
pub struct BasicShapes {
    chair_threshold: f64,
    rectangle_threshold: f64,
}

impl BasicShapes {
    pub fn new(chair_threshold: f64, rectangle_threshold: f64) -> Self {
        Self {
            chair_threshold,
            rectangle_threshold,
        }
    }

    /// R, D, D: one switch-on released in two steps.
    fn chair(&self, w: &[PointOfInterest], ids: &mut IdSequence) -> Option<Vec<MatchedPair>> {
        let [r, d1, d2] = w else { return None };
        if !matches!(
            (r.direction, d1.direction, d2.direction),
            (Direction::Rising, Direction::Reduction, Direction::Reduction)
        ) {
            return None;
        }
        let released = -(d1.vector() + d2.vector());
        (r.pct_dist(&released) < self.chair_threshold)
            .then(|| split_pairs(r, &[d1, d2], MatchKind::Chair, ids))
    }

    /// R, R, D: two switch-ons released in one step.
    fn inverted_chair(&self, w: &[PointOfInterest], ids: &mut IdSequence) -> Option<Vec<MatchedPair>> {
        let [r1, r2, d] = w else { return None };
        if !matches!(
            (r1.direction, r2.direction, d.direction),
            (Direction::Rising, Direction::Rising, Direction::Reduction)
        ) {
            return None;
        }
        let engaged = r1.vector() + r2.vector();
        (d.negated().pct_dist(&engaged) < self.chair_threshold)
            .then(|| split_pairs(d, &[r1, r2], MatchKind::InvertedChair, ids))
    }

    fn simple(&self, w: &[PointOfInterest]) -> Option<MatchedPair> {
        let [r, d] = w else { return None };
        if r.direction != Direction::Rising
            || d.direction != Direction::Reduction
            || r.balance_dist(d) >= self.rectangle_threshold
        {
            return None;
        }
        let kind = if d.minute - r.minute == 1 {
            MatchKind::Triangle
        } else {
            MatchKind::Rectangle
        };
        Some(MatchedPair::new(r.clone(), d.clone(), kind))
    }
}

impl MatchStage for BasicShapes {
    fn name(&self) -> &str {
        "basic_shapes"
    }

    fn apply(&self, points: Vec<PointOfInterest>, ids: &mut IdSequence) -> StageOutcome {
        let mut outcome = StageOutcome::default();
        let mut i = 0;

        while i < points.len() {
            if let Some(w) = points.get(i..i + 3) {
                if let Some(pairs) = self.chair(w, ids).or_else(|| self.inverted_chair(w, ids)) {
                    outcome.pairs.extend(pairs);
                    i += 3;
                    continue;
                }
            }
            if let Some(pair) = points.get(i..i + 2).and_then(|w| self.simple(w)) {
                outcome.pairs.push(pair);
                i += 2;
                continue;
            }
            outcome.remaining.push(points[i].clone());
            i += 1;
        }
        outcome
    }
}
