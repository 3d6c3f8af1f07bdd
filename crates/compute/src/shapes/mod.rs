//! Geometric matching cascade.
//!
//! An ordered pipeline of [`MatchStage`]s, each taking the chronologically
//! sorted open points and returning the pairs it resolved plus the points it
//! left open. Stages run left to right; every stage only ever removes points.
//!
//! - **SwitchingPairs**: drop reduction-then-rise blips that cancel out.
//! - **DirectMatch**: pair each rise with the first later mirror reduction.
//! - **DenseClusters**: fold balanced bursts of activity into one pair.
//! - **BasicShapes**: chairs, inverted chairs, triangles and rectangles.

pub mod basic;
pub mod dense;
pub mod direct;
pub mod switching;

use serde::Serialize;
use tracing::debug;

use disagg_core::config::ShapeConfig;
use disagg_core::{Direction, Event, IdSequence, MatchKind, MatchedPair, PointOfInterest};

pub use basic::BasicShapes;
pub use dense::DenseClusters;
pub use direct::DirectMatch;
pub use switching::SwitchingPairs;

/// Result of one stage over the open points.
#[derive(Debug, Default)]
pub struct StageOutcome {
    pub pairs: Vec<MatchedPair>,
    /// Points removed without producing a pair.
    pub dropped: Vec<PointOfInterest>,
    /// Still-open points, in chronological order.
    pub remaining: Vec<PointOfInterest>,
}

/// One step of the shape cascade.
pub trait MatchStage: Send + Sync {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &str;

    /// Resolve what this stage can out of `points` (chronologically sorted).
    fn apply(&self, points: Vec<PointOfInterest>, ids: &mut IdSequence) -> StageOutcome;
}

/// Per-stage accounting for one event.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub points_in: usize,
    pub pairs: usize,
    pub dropped: usize,
}

pub struct ShapeMatcher {
    stages: Vec<Box<dyn MatchStage>>,
}

impl ShapeMatcher {
    /// The standard cascade in its fixed order.
    pub fn new(config: &ShapeConfig) -> Self {
        Self {
            stages: vec![
                Box::new(SwitchingPairs::new(config.switching_threshold, config.switching_max_gap)),
                Box::new(DirectMatch::new(config.direct_threshold)),
                Box::new(DenseClusters::new(
                    config.dense_max_gap,
                    config.dense_min_points,
                    config.dense_concentration,
                    config.dense_threshold,
                )),
                Box::new(BasicShapes::new(config.chair_threshold, config.rectangle_threshold)),
            ],
        }
    }

    pub fn with_stages(stages: Vec<Box<dyn MatchStage>>) -> Self {
        Self { stages }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the cascade over the event's open points.
    pub fn run(&self, event: &mut Event, ids: &mut IdSequence) -> Vec<StageReport> {
        let mut points = event.take_open_points();
        let mut reports = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let points_in = points.len();
            let outcome = stage.apply(points, ids);
            debug!(
                event_id = %event.id,
                stage = stage.name(),
                points_in,
                pairs = outcome.pairs.len(),
                dropped = outcome.dropped.len(),
                "shape stage done"
            );
            reports.push(StageReport {
                stage: stage.name().to_string(),
                points_in,
                pairs: outcome.pairs.len(),
                dropped: outcome.dropped.len(),
            });
            event.push_pairs(outcome.pairs);
            points = outcome.remaining;
        }

        event.restore_open_points(points);
        reports
    }
}

/// Pair one anchor with its counterparts.
///
/// A single counterpart pairs directly. Several counterparts each get their
/// own pair against a synthesized stand-in for the anchor, placed at the
/// anchor's minute and carrying that counterpart's negated deltas.
pub(crate) fn split_pairs(
    anchor: &PointOfInterest,
    counterparts: &[&PointOfInterest],
    kind: MatchKind,
    ids: &mut IdSequence,
) -> Vec<MatchedPair> {
    if let [single] = counterparts {
        return vec![ordered_pair(anchor.clone(), (*single).clone(), kind)];
    }
    counterparts
        .iter()
        .map(|cp| {
            let stand_in = PointOfInterest::synthesized(ids.next_poi_id(), anchor, cp.negated());
            ordered_pair(stand_in, (*cp).clone(), kind)
        })
        .collect()
}

fn ordered_pair(a: PointOfInterest, b: PointOfInterest, kind: MatchKind) -> MatchedPair {
    match a.direction {
        Direction::Rising => MatchedPair::new(a, b, kind),
        Direction::Reduction => MatchedPair::new(b, a, kind),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::poi;
    use super::*;
    use disagg_core::{EventId, PoiId};

    fn event_with(points: Vec<PointOfInterest>) -> Event {
        let mut event = Event::new(EventId(1), 0, 60, vec![0.0; 61], vec![0.0; 61]);
        event.restore_open_points(points);
        event
    }

    #[test]
    fn cascade_order_is_fixed() {
        let matcher = ShapeMatcher::new(&ShapeConfig::default());
        assert_eq!(
            matcher.stage_names(),
            vec!["switching_pairs", "direct_match", "dense_clusters", "basic_shapes"]
        );
    }

    #[test]
    fn mirror_pair_is_matched_directly() {
        let mut event = event_with(vec![poi(1, 1, 1000.0, 200.0), poi(2, 4, -1000.0, -200.0)]);
        let mut ids = disagg_core::IdSequence::default();
        ShapeMatcher::new(&ShapeConfig::default()).run(&mut event, &mut ids);
        assert!(event.is_resolved());
        assert_eq!(event.final_pairs.len(), 1);
        assert_eq!(event.final_pairs[0].kind, MatchKind::Direct);
    }

    #[test]
    fn open_count_never_grows_and_pairs_leave_open_sets() {
        let mut event = event_with(vec![
            poi(1, 1, 1000.0, 100.0),
            poi(2, 3, 400.0, 0.0),
            poi(3, 9, -430.0, 0.0),
            poi(4, 12, -250.0, 0.0),
            poi(5, 20, 75.0, 0.0),
            poi(6, 30, -1010.0, -100.0),
        ]);
        let before = event.open_point_count();
        let mut ids = disagg_core::IdSequence::default();
        let reports = ShapeMatcher::new(&ShapeConfig::default()).run(&mut event, &mut ids);
        let mut last = before;
        for report in &reports {
            assert!(report.points_in <= last);
            last = report.points_in;
        }
        assert!(event.open_point_count() <= before);
        assert!(event.overlapping_ids().is_empty());
    }

    #[test]
    fn split_pairs_synthesize_shared_anchor() {
        let mut ids = disagg_core::IdSequence::default();
        for _ in 0..10 {
            ids.next_poi_id();
        }
        let rise = poi(1, 2, 1000.0, 0.0);
        let d1 = poi(2, 5, -500.0, 0.0);
        let d2 = poi(3, 8, -500.0, 0.0);
        let pairs = split_pairs(&rise, &[&d1, &d2], MatchKind::Chair, &mut ids);
        assert_eq!(pairs.len(), 2);
        for (pair, d) in pairs.iter().zip([&d1, &d2]) {
            assert_eq!(pair.rising.origin, Some(PoiId(1)));
            assert_eq!(pair.rising.minute, 2);
            assert_eq!(pair.rising.p_diff, -d.p_diff);
            assert_eq!(pair.reduction.id, d.id);
        }
        assert_ne!(pairs[0].rising.id, pairs[1].rising.id);
    }
}
