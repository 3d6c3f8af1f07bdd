//! Weighted set packing and the MILP backend that solves it.

use good_lp::solvers::microlp::microlp;
use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel, Variable};
use serde::Serialize;

use super::bitset::PointSet;

#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Solver backend failed: {0}")]
    Backend(String),
    #[error("Malformed problem: {0}")]
    Malformed(String),
}

/// How often each point may be covered by the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Coverage {
    /// Partial: a point may stay uncovered.
    AtMostOne,
    /// Full: every point is covered exactly once.
    ExactlyOne,
}

/// Select candidates maximizing total cost subject to per-point coverage.
#[derive(Debug, Clone)]
pub struct SetPackingProblem {
    pub incidence: Vec<PointSet>,
    pub costs: Vec<i64>,
    pub points: usize,
    pub coverage: Coverage,
}

impl SetPackingProblem {
    /// Points no candidate covers.
    pub fn uncovered(&self) -> Vec<usize> {
        let all = self.incidence.iter().fold(PointSet::new(), |acc, s| acc.union(s));
        (0..self.points).filter(|&i| !all.contains(i)).collect()
    }

    fn check(&self) -> Result<(), SolverError> {
        if self.incidence.len() != self.costs.len() {
            return Err(SolverError::Malformed(format!(
                "{} candidates but {} costs",
                self.incidence.len(),
                self.costs.len()
            )));
        }
        if self.points > PointSet::CAPACITY {
            return Err(SolverError::Malformed(format!(
                "{} points exceed the {} point capacity",
                self.points,
                PointSet::CAPACITY
            )));
        }
        Ok(())
    }
}

/// A backend able to solve [`SetPackingProblem`]s.
pub trait SetPackingSolver: Send + Sync {
    fn name(&self) -> &str;

    /// Indices of the selected candidates, or `None` when infeasible.
    fn solve(&self, problem: &SetPackingProblem) -> Result<Option<Vec<usize>>, SolverError>;
}

/// Binary program over `good_lp`, solved with the pure-Rust microlp backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct MilpSolver;

impl SetPackingSolver for MilpSolver {
    fn name(&self) -> &str {
        "microlp"
    }

    fn solve(&self, problem: &SetPackingProblem) -> Result<Option<Vec<usize>>, SolverError> {
        problem.check()?;
        if problem.incidence.is_empty() {
            return Ok(match problem.coverage {
                Coverage::ExactlyOne if problem.points > 0 => None,
                _ => Some(Vec::new()),
            });
        }
        if problem.coverage == Coverage::ExactlyOne && !problem.uncovered().is_empty() {
            return Ok(None);
        }

        let mut vars = variables!();
        let picks: Vec<Variable> = problem
            .incidence
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();
        let objective: Expression = picks
            .iter()
            .zip(&problem.costs)
            .map(|(&x, &cost)| cost as f64 * x)
            .sum();

        let mut model = vars.maximise(objective).using(microlp);
        for point in 0..problem.points {
            let cover: Vec<Variable> = picks
                .iter()
                .zip(&problem.incidence)
                .filter(|(_, members)| members.contains(point))
                .map(|(&x, _)| x)
                .collect();
            if cover.is_empty() {
                continue;
            }
            let cover: Expression = cover.into_iter().sum();
            model = match problem.coverage {
                Coverage::AtMostOne => model.with(constraint!(cover <= 1.0)),
                Coverage::ExactlyOne => model.with(constraint!(cover == 1.0)),
            };
        }

        match model.solve() {
            Ok(solution) => Ok(Some(
                picks
                    .iter()
                    .enumerate()
                    .filter(|(_, x)| solution.value(**x) > 0.5)
                    .map(|(k, _)| k)
                    .collect(),
            )),
            Err(ResolutionError::Infeasible) => Ok(None),
            Err(e) => Err(SolverError::Backend(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(indices: &[usize]) -> PointSet {
        indices.iter().copied().collect()
    }

    #[test]
    fn packing_prefers_heavier_disjoint_sets() {
        let problem = SetPackingProblem {
            incidence: vec![set(&[0, 1]), set(&[1, 2]), set(&[2, 3])],
            costs: vec![10, 100, 10],
            points: 4,
            coverage: Coverage::AtMostOne,
        };
        let picked = MilpSolver.solve(&problem).unwrap().unwrap();
        assert_eq!(picked, vec![1]);
    }

    #[test]
    fn exact_cover_forces_the_tiling() {
        let problem = SetPackingProblem {
            incidence: vec![set(&[0, 1]), set(&[1, 2]), set(&[2, 3])],
            costs: vec![10, 100, 10],
            points: 4,
            coverage: Coverage::ExactlyOne,
        };
        let picked = MilpSolver.solve(&problem).unwrap().unwrap();
        assert_eq!(picked, vec![0, 2]);
    }

    #[test]
    fn exact_cover_without_a_tiling_is_infeasible() {
        let problem = SetPackingProblem {
            incidence: vec![set(&[0, 1]), set(&[1, 2])],
            costs: vec![10, 10],
            points: 3,
            coverage: Coverage::ExactlyOne,
        };
        assert!(MilpSolver.solve(&problem).unwrap().is_none());
    }

    #[test]
    fn uncovered_point_short_circuits_full_mode() {
        let problem = SetPackingProblem {
            incidence: vec![set(&[0, 1])],
            costs: vec![10],
            points: 3,
            coverage: Coverage::ExactlyOne,
        };
        assert_eq!(problem.uncovered(), vec![2]);
        assert!(MilpSolver.solve(&problem).unwrap().is_none());
    }

    #[test]
    fn mismatched_costs_are_rejected() {
        let problem = SetPackingProblem {
            incidence: vec![set(&[0])],
            costs: vec![],
            points: 1,
            coverage: Coverage::AtMostOne,
        };
        assert!(matches!(MilpSolver.solve(&problem), Err(SolverError::Malformed(_))));
    }
}
