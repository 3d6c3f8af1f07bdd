use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::combinatorial::CombinatorialReport;
use crate::extract::{ExtractionReport, ThresholdSource};
use crate::shapes::StageReport;

/// Counts for one shape stage, summed over every event of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageCounters {
    pub points_in: u64,
    pub pairs: u64,
    pub dropped: u64,
}

/// Run metrics, updated incrementally as each event moves through the stages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetrics {
    /// Input length in samples.
    pub samples: usize,
    pub events: u64,
    /// Events whose open sets were emptied.
    pub events_resolved: u64,

    // Extraction
    pub points_extracted: u64,
    pub points_dropped_as_noise: u64,
    pub thresholds_tuned: u64,
    pub thresholds_fallback: u64,

    // Shape cascade, keyed by stage name.
    pub shape_stages: BTreeMap<String, StageCounters>,

    // Combinatorial
    pub clusters_solved: u64,
    pub combinatorial_pairs: u64,
    pub full_formulations_accepted: u64,
    pub budget_exhaustions: u64,

    pub final_pairs: u64,
    pub unresolved_points: u64,

    // Wall-clock per phase, in milliseconds.
    pub segment_ms: f64,
    pub extract_ms: f64,
    pub shapes_ms: f64,
    pub combinatorial_ms: f64,
    pub total_ms: f64,
}

fn ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

impl RunMetrics {
    pub fn record_segmentation(&mut self, samples: usize, events: usize, elapsed: Duration) {
        self.samples = samples;
        self.events = events as u64;
        self.segment_ms += ms(elapsed);
    }

    pub fn record_extraction(&mut self, report: &ExtractionReport, elapsed: Duration) {
        self.points_extracted += report.extracted as u64;
        self.points_dropped_as_noise += report.dropped as u64;
        match report.tuning.source {
            ThresholdSource::Tuned => self.thresholds_tuned += 1,
            ThresholdSource::Fallback => self.thresholds_fallback += 1,
            ThresholdSource::Fixed => {}
        }
        self.extract_ms += ms(elapsed);
    }

    pub fn record_shapes(&mut self, reports: &[StageReport], elapsed: Duration) {
        for report in reports {
            let counters = self.shape_stages.entry(report.stage.clone()).or_default();
            counters.points_in += report.points_in as u64;
            counters.pairs += report.pairs as u64;
            counters.dropped += report.dropped as u64;
        }
        self.shapes_ms += ms(elapsed);
    }

    pub fn record_combinatorial(&mut self, report: &CombinatorialReport, elapsed: Duration) {
        self.clusters_solved += report.clusters as u64;
        self.combinatorial_pairs += report.pairs as u64;
        self.full_formulations_accepted += report.full_accepted as u64;
        if report.budget_exhausted {
            self.budget_exhaustions += 1;
        }
        self.combinatorial_ms += ms(elapsed);
    }

    /// Record the final state of one event.
    pub fn record_event(&mut self, pairs: usize, unresolved: usize) {
        self.final_pairs += pairs as u64;
        self.unresolved_points += unresolved as u64;
        if unresolved == 0 {
            self.events_resolved += 1;
        }
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.total_ms = ms(elapsed);
    }
}
