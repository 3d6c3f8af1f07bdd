//! Combinatorial matching of whatever the shape cascade left open.
//!
//! Open points are grouped into clusters, each cluster enumerates candidate
//! subsets (one anchor plus the counterparts that cancel it), and a weighted
//! set-packing program picks a conflict-free selection. Two formulations are
//! tried: partial (a point may stay unmatched) and full (every point matched
//! exactly once, with a looser candidate filter). Full wins only when it is
//! not much worse than partial.

pub mod bitset;
pub mod candidates;
pub mod cluster;
pub mod solution;
pub mod solver;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use disagg_core::config::CombinatorialConfig;
use disagg_core::{Event, IdSequence, PointOfInterest};

pub use bitset::PointSet;
pub use candidates::{generate, Candidate};
pub use cluster::{Cluster, ClusterPlanner};
pub use solution::{Arbitration, Solution};
pub use solver::{Coverage, MilpSolver, SetPackingProblem, SetPackingSolver, SolverError};

/// What the combinatorial pass did for one event.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CombinatorialReport {
    pub points_in: usize,
    pub clusters: usize,
    pub pairs: usize,
    pub full_accepted: usize,
    pub unresolved: usize,
    pub budget_exhausted: bool,
}

pub struct CombinatorialMatcher {
    config: CombinatorialConfig,
    solver: Arc<dyn SetPackingSolver>,
}

impl CombinatorialMatcher {
    pub fn new(config: CombinatorialConfig) -> Self {
        Self::with_solver(config, Arc::new(MilpSolver))
    }

    pub fn with_solver(config: CombinatorialConfig, solver: Arc<dyn SetPackingSolver>) -> Self {
        Self { config, solver }
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Match the event's open points; unresolved points return to the open sets.
    pub fn run(&self, event: &mut Event, ids: &mut IdSequence) -> CombinatorialReport {
        let points = event.take_open_points();
        let mut report = CombinatorialReport {
            points_in: points.len(),
            ..Default::default()
        };
        if points.is_empty() {
            return report;
        }

        let started = Instant::now();
        let deadline = (self.config.time_budget_ms > 0)
            .then(|| started + Duration::from_millis(self.config.time_budget_ms));
        let mut planner = ClusterPlanner::new(points, &self.config);

        while let Some(cluster) = planner.next_cluster() {
            if deadline.is_some_and(|d| Instant::now() > d) {
                warn!(
                    event_id = %event.id,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    pending = planner.pending_clusters() + 1,
                    "combinatorial budget exhausted, leaving points unresolved"
                );
                report.budget_exhausted = true;
                planner.carry_forward(cluster.points);
                break;
            }

            let (solution, arbitration) = self.solve_cluster_until(&cluster.points, deadline);
            let (pairs, unmatched) = solution.expand(&cluster.points, ids);
            debug!(
                event_id = %event.id,
                size = cluster.points.len(),
                carried_in = cluster.carried_in.len(),
                pairs = pairs.len(),
                unmatched = unmatched.len(),
                arbitration = ?arbitration,
                distance = solution.normalized_distance,
                "cluster solved"
            );

            report.clusters += 1;
            report.pairs += pairs.len();
            match arbitration {
                Arbitration::FullAccepted => report.full_accepted += 1,
                Arbitration::OutOfTime => report.budget_exhausted = true,
                _ => {}
            }
            event.push_pairs(pairs);
            planner.carry_forward(unmatched);
        }

        let rest = planner.finish();
        report.unresolved = rest.len();
        event.restore_open_points(rest);
        report
    }

    /// Solve partial, then full if partial left points over, and arbitrate.
    pub fn solve_cluster(&self, points: &[PointOfInterest]) -> (Solution, Arbitration) {
        self.solve_cluster_until(points, None)
    }

    /// Like [`solve_cluster`](Self::solve_cluster), but skips the full
    /// formulation once `deadline` has passed.
    fn solve_cluster_until(&self, points: &[PointOfInterest], deadline: Option<Instant>) -> (Solution, Arbitration) {
        let partial = self.solve_formulation(points, Coverage::AtMostOne);
        if partial.is_solved() && partial.remaining.is_empty() {
            return (partial, Arbitration::PartialComplete);
        }
        if deadline.is_some_and(|d| Instant::now() > d) {
            return (partial, Arbitration::OutOfTime);
        }

        let full = self.solve_formulation(points, Coverage::ExactlyOne);
        if full.is_solved()
            && full.normalized_distance <= partial.normalized_distance + self.config.acceptance_margin
        {
            return (full, Arbitration::FullAccepted);
        }
        if partial.is_solved() {
            (partial, Arbitration::PartialKept)
        } else {
            (partial, Arbitration::Unsolved)
        }
    }

    /// Build, solve and score one formulation.
    pub fn solve_formulation(&self, points: &[PointOfInterest], coverage: Coverage) -> Solution {
        let threshold = match coverage {
            Coverage::AtMostOne => self.config.distance_threshold,
            Coverage::ExactlyOne => self.config.full_distance_threshold,
        };
        let candidates = generate(points, &self.config, threshold);
        if candidates.is_empty() {
            return Solution::unsolved(points.len(), coverage);
        }

        let problem = SetPackingProblem {
            incidence: candidates.iter().map(|c| c.members).collect(),
            costs: candidates.iter().map(|c| self.cost(c.weight)).collect(),
            points: points.len(),
            coverage,
        };

        match self.solver.solve(&problem) {
            Ok(Some(picked)) => {
                let selected = picked
                    .into_iter()
                    .filter_map(|k| candidates.get(k).cloned())
                    .collect();
                Solution::scored(points, selected, coverage, self.config.unmatched_penalty)
            }
            Ok(None) => Solution::unsolved(points.len(), coverage),
            Err(e) => {
                warn!(solver = self.solver.name(), error = %e, "set packing failed");
                Solution::unsolved(points.len(), coverage)
            }
        }
    }

    /// Integer objective coefficient for a candidate weight.
    fn cost(&self, weight: f64) -> i64 {
        ((weight * self.config.cost_scale).round() as i64).max(1)
    }
}
