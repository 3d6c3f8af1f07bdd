//! Candidate subsets for the set-packing formulation.
//!
//! Every point takes a turn as anchor. Its counterparts come from the opposite
//! direction on the causal side of it in time (reductions after a rise, rises
//! before a reduction) and may not dwarf it. Subsets of the nearest counterparts
//! are kept when their aggregate cancels the anchor closely enough.

use std::collections::HashMap;

use rayon::prelude::*;

use disagg_core::config::CombinatorialConfig;
use disagg_core::{Direction, PointOfInterest, PowerVector};

use super::bitset::PointSet;

/// One anchor together with the counterparts that balance it.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Cluster index of the anchor.
    pub anchor: usize,
    /// Cluster indices of the counterparts, ascending.
    pub counterparts: Vec<usize>,
    /// Anchor plus counterparts.
    pub members: PointSet,
    pub distance: f64,
    pub weight: f64,
}

impl Candidate {
    /// Anchor plus counterparts.
    pub fn point_count(&self) -> usize {
        self.counterparts.len() + 1
    }
}

/// Generate deduplicated candidates whose distance is below `threshold`,
/// strongest first, capped at `config.max_candidates`.
pub fn generate(points: &[PointOfInterest], config: &CombinatorialConfig, threshold: f64) -> Vec<Candidate> {
    let per_anchor: Vec<Vec<Candidate>> = (0..points.len())
        .into_par_iter()
        .map(|anchor| anchor_candidates(points, anchor, config, threshold))
        .collect();

    let mut best: HashMap<PointSet, Candidate> = HashMap::new();
    for candidate in per_anchor.into_iter().flatten() {
        match best.get(&candidate.members) {
            Some(existing) if existing.weight >= candidate.weight => {}
            _ => {
                best.insert(candidate.members, candidate);
            }
        }
    }

    let mut candidates: Vec<Candidate> = best.into_values().collect();
    candidates.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.members.cmp(&b.members)));
    candidates.truncate(config.max_candidates);
    candidates
}

/// Counterparts an anchor may pair with, nearest in time first.
pub fn eligible_counterparts(points: &[PointOfInterest], anchor: usize, config: &CombinatorialConfig) -> Vec<usize> {
    let a = &points[anchor];
    let limit = a.magnitude() * (1.0 + config.pairing_tolerance / 100.0);

    let mut eligible: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.direction == a.direction.opposite() && p.magnitude() <= limit)
        .filter(|(_, p)| match a.direction {
            Direction::Rising => p.minute > a.minute,
            Direction::Reduction => p.minute < a.minute,
        })
        .map(|(i, _)| i)
        .collect();

    eligible.sort_by_key(|&i| (points[i].minute.abs_diff(a.minute), i));
    eligible.truncate(config.max_eligible);
    eligible.sort_unstable();
    eligible
}

fn anchor_candidates(
    points: &[PointOfInterest],
    anchor: usize,
    config: &CombinatorialConfig,
    threshold: f64,
) -> Vec<Candidate> {
    let eligible = eligible_counterparts(points, anchor, config);
    let a = &points[anchor];
    let mut out = Vec::new();
    let mut previous_best = f64::INFINITY;

    for size in 1..=config.max_subset_size.min(eligible.len()) {
        let mut size_best = f64::INFINITY;
        for_each_combination(eligible.len(), size, |combo| {
            let counterparts: Vec<usize> = combo.iter().map(|&k| eligible[k]).collect();
            let aggregate: PowerVector = counterparts.iter().map(|&i| points[i].vector()).sum();
            let distance = a.pct_dist(&-aggregate);
            size_best = size_best.min(distance);
            if distance < threshold {
                let members = counterparts.iter().copied().chain([anchor]).collect();
                out.push(Candidate {
                    anchor,
                    counterparts,
                    members,
                    distance,
                    weight: 1.0 / (distance + config.epsilon),
                });
            }
        });
        if size > 1 && size_best >= previous_best {
            break;
        }
        previous_best = previous_best.min(size_best);
    }
    out
}

/// Visit every `k`-combination of `0..n` in lexicographic order.
fn for_each_combination(n: usize, k: usize, mut visit: impl FnMut(&[usize])) {
    if k == 0 || k > n {
        return;
    }
    let mut combo: Vec<usize> = (0..k).collect();
    loop {
        visit(&combo);
        let Some(pos) = (0..k).rev().find(|&i| combo[i] < n - k + i) else {
            return;
        };
        combo[pos] += 1;
        for i in pos + 1..k {
            combo[i] = combo[i - 1] + 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::test_support::poi;

    #[test]
    fn combinations_are_lexicographic() {
        let mut seen = Vec::new();
        for_each_combination(4, 2, |c| seen.push(c.to_vec()));
        assert_eq!(
            seen,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        let mut count = 0;
        for_each_combination(3, 4, |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn eligibility_respects_time_and_size() {
        let points = vec![
            poi(1, 0, -200.0, 0.0),
            poi(2, 2, 1000.0, 0.0),
            poi(3, 5, -500.0, 0.0),
            poi(4, 7, -1200.0, 0.0),
            poi(5, 9, -500.0, 0.0),
        ];
        let config = CombinatorialConfig::default();
        assert_eq!(eligible_counterparts(&points, 1, &config), vec![2, 4]);
        // A reduction looks back for rises no larger than itself plus tolerance.
        assert_eq!(eligible_counterparts(&points, 3, &config), vec![1]);
        assert!(eligible_counterparts(&points, 2, &config).is_empty());
        assert!(eligible_counterparts(&points, 0, &config).is_empty());
    }

    #[test]
    fn nearest_counterparts_win_the_cut() {
        let mut points = vec![poi(1, 0, 1000.0, 0.0)];
        for k in 0..5 {
            points.push(poi(2 + k, 10 - k as usize, -100.0, 0.0));
        }
        let config = CombinatorialConfig {
            max_eligible: 2,
            ..Default::default()
        };
        let eligible = eligible_counterparts(&points, 0, &config);
        let minutes: Vec<usize> = eligible.iter().map(|&i| points[i].minute).collect();
        assert_eq!(minutes.len(), 2);
        assert!(minutes.contains(&6) && minutes.contains(&7));
    }

    #[test]
    fn two_halves_form_a_candidate() {
        let points = vec![
            poi(1, 1, 1000.0, 0.0),
            poi(2, 4, -500.0, 0.0),
            poi(3, 8, -500.0, 0.0),
        ];
        let config = CombinatorialConfig::default();
        let candidates = generate(&points, &config, config.distance_threshold);
        let best = &candidates[0];
        assert_eq!(best.anchor, 0);
        assert_eq!(best.counterparts, vec![1, 2]);
        assert_eq!(best.point_count(), 3);
        assert!(best.distance < 1e-9);
        assert!(best.weight > 99.0);
    }

    #[test]
    fn duplicate_member_sets_keep_the_heavier() {
        let points = vec![poi(1, 1, 1000.0, 0.0), poi(2, 4, -950.0, 0.0)];
        let config = CombinatorialConfig::default();
        let candidates = generate(&points, &config, config.distance_threshold);
        assert_eq!(candidates.len(), 1);
        // Anchored on the reduction the reference is smaller, so the distance is larger.
        assert!((candidates[0].distance - 5.0).abs() < 1e-9);
        assert_eq!(candidates[0].anchor, 0);
    }

    #[test]
    fn candidate_cap_keeps_the_strongest() {
        let points = vec![
            poi(1, 1, 1000.0, 0.0),
            poi(2, 2, -990.0, 0.0),
            poi(3, 3, -900.0, 0.0),
            poi(4, 4, -850.0, 0.0),
        ];
        let config = CombinatorialConfig {
            max_candidates: 1,
            ..Default::default()
        };
        let candidates = generate(&points, &config, config.distance_threshold);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].counterparts, vec![1]);
    }
}
