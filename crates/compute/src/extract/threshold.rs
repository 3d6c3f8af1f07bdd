//! Noise threshold: fixed, or tuned so the surviving points still explain the curve.

use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use disagg_core::config::ExtractionConfig;
use disagg_core::{Event, PointOfInterest, PowerVector};

/// Reactive sums below this many var are treated as balanced noise.
const REACTIVE_FLOOR: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ThresholdMode {
    Fixed(f64),
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThresholdSource {
    Fixed,
    Tuned,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdTuning {
    pub threshold: f64,
    pub source: ThresholdSource,
    pub candidates_evaluated: usize,
}

/// Piecewise-constant active power rebuilt from point deltas.
pub fn reconstruct_curve<'a>(points: impl IntoIterator<Item = &'a PointOfInterest>, len: usize) -> Vec<f64> {
    let mut deltas = vec![0.0; len];
    for point in points {
        if point.minute < len {
            deltas[point.minute] += point.p_diff;
        }
    }
    let mut level = 0.0;
    deltas
        .into_iter()
        .map(|d| {
            level += d;
            level
        })
        .collect()
}

/// Percentage error between the cumulative sums of a reconstruction and the curve.
pub fn reconstruction_error(reconstructed: &[f64], normalized: &[f64]) -> f64 {
    let truth: f64 = normalized.iter().sum();
    let rebuilt: f64 = reconstructed.iter().sum();
    let diff = (rebuilt - truth).abs();
    if truth.abs() <= f64::EPSILON {
        return if diff <= f64::EPSILON { 0.0 } else { f64::INFINITY };
    }
    100.0 * diff / truth.abs()
}

/// Percentage imbalance of active and reactive power between the two directions.
pub fn imbalance(rising: &[&PointOfInterest], reduction: &[&PointOfInterest]) -> (f64, f64) {
    let up: PowerVector = rising.iter().map(|p| p.vector()).sum();
    let down: PowerVector = reduction.iter().map(|p| p.negated()).sum();

    let p_ref = up.p.abs().max(down.p.abs());
    let p_pct = if p_ref <= f64::EPSILON {
        0.0
    } else {
        100.0 * (up.p - down.p).abs() / p_ref
    };

    let q_ref = up.q.abs().max(down.q.abs());
    let q_pct = if q_ref < REACTIVE_FLOOR {
        0.0
    } else {
        100.0 * (up.q - down.q).abs() / q_ref
    };

    (p_pct, q_pct)
}

/// Search for the largest threshold whose survivors stay balanced and still
/// rebuild the curve; fall back to the configured default otherwise.
pub fn tune_noise_threshold(
    rising: &[PointOfInterest],
    reduction: &[PointOfInterest],
    normalized_p: &[f64],
    config: &ExtractionConfig,
) -> ThresholdTuning {
    let fallback = ThresholdTuning {
        threshold: config.fallback_noise_threshold,
        source: ThresholdSource::Fallback,
        candidates_evaluated: 0,
    };

    let mut magnitudes: Vec<f64> = rising
        .iter()
        .chain(reduction.iter())
        .map(PointOfInterest::magnitude)
        .collect();
    if magnitudes.is_empty() {
        return fallback;
    }
    magnitudes.sort_by(f64::total_cmp);
    let smallest = magnitudes[0];
    let largest = magnitudes[magnitudes.len() - 1];
    let mut step = smallest / 2.0;
    if step <= f64::EPSILON {
        return fallback;
    }

    // Over the cap the grid gets coarser; it always ends at the largest magnitude.
    let mut count = ((largest - smallest) / step).floor() as usize + 1;
    let cap = config.max_threshold_candidates.max(2);
    if count > cap {
        count = cap;
        step = (largest - smallest) / (cap - 1) as f64;
    }
    let candidate_at = |k: usize| {
        if count > 1 && k == count - 1 && step > smallest / 2.0 {
            largest
        } else {
            smallest + k as f64 * step
        }
    };
    let total = rising.len() + reduction.len();

    let accepted = (0..count)
        .into_par_iter()
        .filter(|&k| accepts(candidate_at(k), rising, reduction, total, normalized_p, config))
        .max();

    match accepted {
        Some(k) => {
            let threshold = candidate_at(k);
            debug!(threshold, candidates = count, "noise threshold tuned");
            ThresholdTuning {
                threshold,
                source: ThresholdSource::Tuned,
                candidates_evaluated: count,
            }
        }
        None => ThresholdTuning {
            candidates_evaluated: count,
            ..fallback
        },
    }
}

fn accepts(
    candidate: f64,
    rising: &[PointOfInterest],
    reduction: &[PointOfInterest],
    total: usize,
    normalized_p: &[f64],
    config: &ExtractionConfig,
) -> bool {
    let kept_rising: Vec<&PointOfInterest> = rising.iter().filter(|p| p.magnitude() >= candidate).collect();
    let kept_reduction: Vec<&PointOfInterest> =
        reduction.iter().filter(|p| p.magnitude() >= candidate).collect();
    if kept_rising.len() + kept_reduction.len() == total {
        return false;
    }

    let (p_pct, q_pct) = imbalance(&kept_rising, &kept_reduction);
    if p_pct >= config.balance_limit || q_pct >= config.balance_limit {
        return false;
    }

    let curve = reconstruct_curve(
        kept_rising.iter().chain(kept_reduction.iter()).copied(),
        normalized_p.len(),
    );
    reconstruction_error(&curve, normalized_p) < config.reconstruction_limit
}

/// Drop every open point below `threshold`; returns how many were removed.
///
/// Re-applying the same threshold removes nothing.
pub fn apply_noise_threshold(event: &mut Event, threshold: f64) -> usize {
    let before = event.open_point_count();
    event.rising_points.retain(|p| p.magnitude() >= threshold);
    event.reduction_points.retain(|p| p.magnitude() >= threshold);
    event.noise_threshold = Some(threshold);
    before - event.open_point_count()
}
