//! Point-of-interest extraction.
//!
//! Turns an event's raw power arrays into classified rising/reduction points:
//!
//! 1. Normalize both curves to start (and nominally end) at zero.
//! 2. Mark significant steps from the percentage derivative of active power.
//! 3. Build points from runs of marked steps, widening each change window over
//!    slow ramps.
//! 4. Drop noise points below a fixed or auto-tuned threshold.

pub mod derivative;
pub mod threshold;

use serde::Serialize;
use tracing::debug;

use disagg_core::config::ExtractionConfig;
use disagg_core::{sort_chronologically, Event, IdSequence};

use self::derivative::{marker_runs, markers, normalize, percentage_derivative, PointBuilder};

pub use self::threshold::{
    apply_noise_threshold, reconstruct_curve, reconstruction_error, tune_noise_threshold,
    ThresholdMode, ThresholdSource, ThresholdTuning,
};

/// What one extraction pass did to an event.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub dropped: usize,
    pub tuning: ThresholdTuning,
}

/// Populate `rising_points`/`reduction_points` of `event`, replacing any
/// previous contents, and apply the noise threshold.
pub fn extract(
    event: &mut Event,
    config: &ExtractionConfig,
    mode: ThresholdMode,
    ids: &mut IdSequence,
) -> ExtractionReport {
    let p = normalize(&event.active_power);
    let q = normalize(&event.reactive_power);
    let marks = markers(&percentage_derivative(&p), config.derivative_limit);

    let mut builder = PointBuilder::new(&p, &q, &marks, config, ids);
    for run in marker_runs(&marks) {
        builder.dispatch(run);
    }
    let mut rising = builder.rising;
    let mut reduction = builder.reduction;
    sort_chronologically(&mut rising);
    sort_chronologically(&mut reduction);
    let extracted = rising.len() + reduction.len();

    let tuning = match mode {
        ThresholdMode::Fixed(threshold) => ThresholdTuning {
            threshold,
            source: ThresholdSource::Fixed,
            candidates_evaluated: 0,
        },
        ThresholdMode::Auto => tune_noise_threshold(&rising, &reduction, &p, config),
    };

    event.rising_points = rising;
    event.reduction_points = reduction;
    let dropped = apply_noise_threshold(event, tuning.threshold);

    debug!(
        event_id = %event.id,
        extracted,
        dropped,
        threshold = tuning.threshold,
        source = ?tuning.source,
        "points extracted"
    );

    ExtractionReport {
        extracted,
        dropped,
        tuning,
    }
}
