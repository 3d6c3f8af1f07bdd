//! Decomposition of large point sets into solver-sized clusters.
//!
//! Clusters come out in time order. Points a cluster could not place (shed
//! because it was oversized, or left unmatched by the solver) ride along into
//! the next cluster. A point rides along at most once and is never shed from
//! the cluster it rode into; a second miss sets it aside for
//! [`ClusterPlanner::finish`].

use std::collections::{HashSet, VecDeque};

use tracing::debug;

use disagg_core::config::{CombinatorialConfig, MAX_CLUSTER_POINTS};
use disagg_core::{sort_chronologically, PoiId, PointOfInterest};

/// A solver-sized slice of the open points.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub points: Vec<PointOfInterest>,
    /// Points handed over by the previous cluster.
    pub carried_in: Vec<PoiId>,
}

pub struct ClusterPlanner {
    max_size: usize,
    cleanup_limit: usize,
    queue: VecDeque<Vec<PointOfInterest>>,
    carry: Vec<PointOfInterest>,
    carried: HashSet<PoiId>,
    leftover: Vec<PointOfInterest>,
}

impl ClusterPlanner {
    pub fn new(mut points: Vec<PointOfInterest>, config: &CombinatorialConfig) -> Self {
        sort_chronologically(&mut points);
        let queue = if points.len() > config.max_cluster_size.min(MAX_CLUSTER_POINTS) {
            split_at_gaps(points, config.cluster_gap)
        } else if points.is_empty() {
            VecDeque::new()
        } else {
            VecDeque::from([points])
        };
        Self {
            max_size: config.max_cluster_size.clamp(2, MAX_CLUSTER_POINTS),
            cleanup_limit: config.cleanup_limit,
            queue,
            carry: Vec::new(),
            carried: HashSet::new(),
            leftover: Vec::new(),
        }
    }

    /// Next cluster to solve, with pending carry merged in.
    pub fn next_cluster(&mut self) -> Option<Cluster> {
        loop {
            let mut points = self.queue.pop_front()?;
            let carried_in: Vec<PoiId> = self.carry.iter().map(|p| p.id).collect();
            points.append(&mut self.carry);
            sort_chronologically(&mut points);

            if points.len() > self.max_size {
                let shed = self.cleanup_limit.min(points.len() - self.max_size);
                let weakest = take_weakest(&mut points, shed, &self.carried);
                debug!(shed = weakest.len(), size = points.len(), "cluster over cap, shedding");
                self.carry_forward(weakest);
            }

            if points.len() > self.max_size {
                let second = points.split_off(points.len() / 2);
                debug!(first = points.len(), second = second.len(), "splitting oversized cluster");
                self.queue.push_front(second);
                self.queue.push_front(points);
                continue;
            }

            return Some(Cluster { points, carried_in });
        }
    }

    /// Hand points the last cluster could not place to the next one.
    pub fn carry_forward(&mut self, points: Vec<PointOfInterest>) {
        for point in points {
            if self.carried.insert(point.id) {
                self.carry.push(point);
            } else {
                self.leftover.push(point);
            }
        }
    }

    pub fn pending_clusters(&self) -> usize {
        self.queue.len()
    }

    /// Everything never placed: leftover, final carry and unsolved clusters.
    pub fn finish(self) -> Vec<PointOfInterest> {
        let mut rest = self.leftover;
        rest.extend(self.carry);
        rest.extend(self.queue.into_iter().flatten());
        sort_chronologically(&mut rest);
        rest
    }
}

fn split_at_gaps(points: Vec<PointOfInterest>, gap: usize) -> VecDeque<Vec<PointOfInterest>> {
    let mut clusters = VecDeque::new();
    let mut current: Vec<PointOfInterest> = Vec::new();
    for point in points {
        if let Some(last) = current.last() {
            if point.minute - last.minute > gap {
                clusters.push_back(std::mem::take(&mut current));
            }
        }
        current.push(point);
    }
    if !current.is_empty() {
        clusters.push_back(current);
    }
    clusters
}

/// Remove up to `n` smallest-magnitude points outside `protected`; ties go to
/// the later point.
fn take_weakest(
    points: &mut Vec<PointOfInterest>,
    n: usize,
    protected: &HashSet<PoiId>,
) -> Vec<PointOfInterest> {
    if n == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..points.len())
        .filter(|&i| !protected.contains(&points[i].id))
        .collect();
    order.sort_by(|&a, &b| {
        points[a]
            .magnitude()
            .total_cmp(&points[b].magnitude())
            .then_with(|| b.cmp(&a))
    });
    let drop: HashSet<usize> = order.into_iter().take(n).collect();

    let mut kept = Vec::with_capacity(points.len());
    let mut weakest = Vec::with_capacity(n);
    for (i, point) in points.drain(..).enumerate() {
        if drop.contains(&i) {
            weakest.push(point);
        } else {
            kept.push(point);
        }
    }
    *points = kept;
    weakest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::test_support::{ids_of, poi};

    fn config(max_cluster_size: usize, cleanup_limit: usize) -> CombinatorialConfig {
        CombinatorialConfig {
            max_cluster_size,
            cleanup_limit,
            ..Default::default()
        }
    }

    #[test]
    fn small_sets_are_one_cluster() {
        let points = vec![poi(1, 0, 100.0, 0.0), poi(2, 90, -100.0, 0.0)];
        let mut planner = ClusterPlanner::new(points, &config(4, 1));
        let cluster = planner.next_cluster().unwrap();
        assert_eq!(ids_of(&cluster.points), vec![1, 2]);
        assert!(planner.next_cluster().is_none());
        assert!(planner.finish().is_empty());
    }

    #[test]
    fn cluster_size_never_exceeds_bitset_width() {
        let points: Vec<PointOfInterest> = (1..=300)
            .map(|k| poi(k, k as usize, if k % 2 == 0 { -100.0 } else { 100.0 }, 0.0))
            .collect();
        let mut planner = ClusterPlanner::new(points, &config(MAX_CLUSTER_POINTS + 50, 0));
        let mut seen = 0;
        while let Some(cluster) = planner.next_cluster() {
            assert!(cluster.points.len() <= MAX_CLUSTER_POINTS);
            seen += cluster.points.len();
        }
        assert_eq!(seen + planner.finish().len(), 300);
    }

    #[test]
    fn large_sets_split_at_quiet_gaps() {
        let points = vec![
            poi(1, 0, 100.0, 0.0),
            poi(2, 2, -100.0, 0.0),
            poi(3, 4, 200.0, 0.0),
            poi(4, 60, 300.0, 0.0),
            poi(5, 62, -300.0, 0.0),
        ];
        let mut planner = ClusterPlanner::new(points, &config(4, 1));
        assert_eq!(planner.pending_clusters(), 2);
        assert_eq!(ids_of(&planner.next_cluster().unwrap().points), vec![1, 2, 3]);
        assert_eq!(ids_of(&planner.next_cluster().unwrap().points), vec![4, 5]);
    }

    #[test]
    fn oversized_cluster_sheds_then_splits() {
        let points: Vec<PointOfInterest> = (1..=9)
            .map(|k| poi(k, k as usize, 100.0 * k as f64, 0.0))
            .collect();
        let mut planner = ClusterPlanner::new(points, &config(4, 1));

        // Nine points shed the weakest (id 1) and split into 2..=5 and 6..=9.
        let first = planner.next_cluster().unwrap();
        assert_eq!(first.carried_in, vec![PoiId(1)]);
        assert_eq!(ids_of(&first.points), vec![1, 3, 4, 5]);

        planner.carry_forward(Vec::new());
        let second = planner.next_cluster().unwrap();
        assert_eq!(second.carried_in, vec![PoiId(2)]);
        assert_eq!(ids_of(&second.points), vec![2, 7, 8, 9]);

        assert!(planner.next_cluster().is_none());
        assert_eq!(ids_of(&planner.finish()), vec![6]);
    }

    #[test]
    fn nothing_is_lost() {
        let points: Vec<PointOfInterest> = (1..=9)
            .map(|k| poi(k, k as usize, 100.0 * k as f64, 0.0))
            .collect();
        let mut planner = ClusterPlanner::new(points, &config(4, 1));
        let mut seen = Vec::new();
        while let Some(cluster) = planner.next_cluster() {
            assert!(cluster.points.len() <= 4);
            // Pretend the solver placed nothing.
            seen.extend(cluster.points.iter().map(|p| p.id.0));
            planner.carry_forward(cluster.points);
        }
        let rest = planner.finish();
        let mut all: HashSet<u64> = rest.iter().map(|p| p.id.0).collect();
        all.extend(seen);
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn weakest_ties_shed_the_later_point() {
        let mut points = vec![poi(1, 0, 100.0, 0.0), poi(2, 1, 50.0, 0.0), poi(3, 2, 50.0, 0.0)];
        let shed = take_weakest(&mut points, 1, &HashSet::new());
        assert_eq!(ids_of(&shed), vec![3]);
        assert_eq!(ids_of(&points), vec![1, 2]);
    }

    #[test]
    fn carried_points_are_not_shed_again() {
        let mut points = vec![poi(1, 0, 100.0, 0.0), poi(2, 1, 50.0, 0.0), poi(3, 2, 60.0, 0.0)];
        let protected: HashSet<PoiId> = [PoiId(2)].into_iter().collect();
        let shed = take_weakest(&mut points, 1, &protected);
        assert_eq!(ids_of(&shed), vec![3]);
    }
}
