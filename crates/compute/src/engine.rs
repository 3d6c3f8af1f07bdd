use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use disagg_core::{DisaggConfig, Event, EventSummary, PowerSeries, Result, RunContext};

use crate::combinatorial::{CombinatorialMatcher, CombinatorialReport, SetPackingSolver};
use crate::extract::{extract, ExtractionReport, ThresholdMode};
use crate::metrics::RunMetrics;
use crate::segment::segment;
use crate::shapes::{ShapeMatcher, StageReport};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub events: Vec<EventSummary>,
    pub metrics: RunMetrics,
}

/// Stage reports for a single event.
#[derive(Debug, Clone, Serialize)]
pub struct EventOutcome {
    pub extraction: ExtractionReport,
    pub shapes: Vec<StageReport>,
    pub combinatorial: CombinatorialReport,
    #[serde(skip)]
    pub timings: PhaseTimings,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimings {
    pub extract: Duration,
    pub shapes: Duration,
    pub combinatorial: Duration,
}

/// Segment, extract and match a whole series.
pub struct DisaggEngine {
    config: DisaggConfig,
    threshold_mode: ThresholdMode,
    shapes: ShapeMatcher,
    combinatorial: CombinatorialMatcher,
}

impl DisaggEngine {
    /// Build an engine with the default MILP backend; rejects an invalid config.
    pub fn new(config: DisaggConfig) -> Result<Self> {
        config.validate()?;
        let combinatorial = CombinatorialMatcher::new(config.combinatorial.clone());
        Ok(Self::assemble(config, combinatorial))
    }

    pub fn with_solver(config: DisaggConfig, solver: Arc<dyn SetPackingSolver>) -> Result<Self> {
        config.validate()?;
        let combinatorial = CombinatorialMatcher::with_solver(config.combinatorial.clone(), solver);
        Ok(Self::assemble(config, combinatorial))
    }

    fn assemble(config: DisaggConfig, combinatorial: CombinatorialMatcher) -> Self {
        Self {
            shapes: ShapeMatcher::new(&config.shapes),
            config,
            threshold_mode: ThresholdMode::Auto,
            combinatorial,
        }
    }

    /// Use a fixed noise threshold instead of tuning one per event.
    pub fn with_threshold_mode(mut self, mode: ThresholdMode) -> Self {
        self.threshold_mode = mode;
        self
    }

    pub fn config(&self) -> &DisaggConfig {
        &self.config
    }

    pub fn run(&self, series: &PowerSeries) -> RunReport {
        let start = Instant::now();
        let mut ctx = RunContext::new();
        let mut metrics = RunMetrics::default();

        info!(
            run_id = %ctx.run_id,
            samples = series.len(),
            solver = self.combinatorial.solver_name(),
            "Starting disaggregation run"
        );

        let seg_start = Instant::now();
        let mut events = segment(series, &self.config.segmentation, &mut ctx);
        metrics.record_segmentation(series.len(), events.len(), seg_start.elapsed());
        info!(events = events.len(), "Segmentation done in {:.1}ms", seg_start.elapsed().as_secs_f64() * 1000.0);

        let mut summaries = Vec::with_capacity(events.len());
        for event in &mut events {
            let outcome = self.process_event(event, &mut ctx);
            metrics.record_event(event.final_pairs.len(), event.open_point_count());
            record_outcome(&mut metrics, &outcome);
            summaries.push(event.summary());
        }

        metrics.finish(start.elapsed());
        info!(
            run_id = %ctx.run_id,
            events = metrics.events,
            pairs = metrics.final_pairs,
            unresolved = metrics.unresolved_points,
            "Run complete in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        RunReport {
            run_id: ctx.run_id,
            started_at: ctx.started_at,
            events: summaries,
            metrics,
        }
    }

    /// Extract points, then run the shape cascade and the combinatorial matcher.
    pub fn process_event(&self, event: &mut Event, ctx: &mut RunContext) -> EventOutcome {
        let mut timings = PhaseTimings::default();

        let t = Instant::now();
        let extraction = extract(event, &self.config.extraction, self.threshold_mode, &mut ctx.ids);
        timings.extract = t.elapsed();

        let t = Instant::now();
        let shapes = self.shapes.run(event, &mut ctx.ids);
        timings.shapes = t.elapsed();

        let t = Instant::now();
        let combinatorial = self.combinatorial.run(event, &mut ctx.ids);
        timings.combinatorial = t.elapsed();

        debug!(
            event_id = %event.id,
            samples = event.len(),
            pairs = event.final_pairs.len(),
            unresolved = event.open_point_count(),
            extract_ms = timings.extract.as_secs_f64() * 1000.0,
            combinatorial_ms = timings.combinatorial.as_secs_f64() * 1000.0,
            "event processed"
        );

        EventOutcome {
            extraction,
            shapes,
            combinatorial,
            timings,
        }
    }
}

fn record_outcome(metrics: &mut RunMetrics, outcome: &EventOutcome) {
    metrics.record_extraction(&outcome.extraction, outcome.timings.extract);
    metrics.record_shapes(&outcome.shapes, outcome.timings.shapes);
    metrics.record_combinatorial(&outcome.combinatorial, outcome.timings.combinatorial);
}

#[cfg(test)]
mod tests {
    use super::*;
    use disagg_core::MatchKind;

    fn block_series() -> PowerSeries {
        PowerSeries::new(
            vec![0.0, 0.0, 1000.0, 1000.0, 1000.0, 0.0, 0.0],
            vec![0.0, 0.0, 200.0, 200.0, 200.0, 0.0, 0.0],
        )
        .unwrap()
    }

    #[test]
    fn single_block_yields_one_direct_pair() {
        let report = DisaggEngine::new(DisaggConfig::default()).unwrap().run(&block_series());
        assert_eq!(report.events.len(), 1);
        let summary = &report.events[0];
        assert_eq!(summary.pairs.len(), 1);
        assert_eq!(summary.pairs[0].kind, MatchKind::Direct);
        assert!(summary.unresolved.is_empty());
        assert_eq!(report.metrics.events, 1);
        assert_eq!(report.metrics.events_resolved, 1);
        assert_eq!(report.metrics.final_pairs, 1);
    }

    #[test]
    fn flat_series_has_no_events() {
        let series = PowerSeries::new(vec![50.0; 3], vec![0.0; 3]).unwrap();
        let report = DisaggEngine::new(DisaggConfig::default()).unwrap().run(&series);
        assert!(report.events.is_empty());
        assert_eq!(report.metrics.samples, 3);
    }

    #[test]
    fn fixed_threshold_is_reported_per_event() {
        let engine = DisaggEngine::new(DisaggConfig::default()).unwrap().with_threshold_mode(ThresholdMode::Fixed(50.0));
        let report = engine.run(&block_series());
        assert_eq!(report.events[0].noise_threshold, Some(50.0));
        assert_eq!(report.metrics.thresholds_tuned + report.metrics.thresholds_fallback, 0);
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let mut config = DisaggConfig::default();
        config.combinatorial.max_cluster_size = disagg_core::config::MAX_CLUSTER_POINTS + 1;
        assert!(matches!(
            DisaggEngine::new(config.clone()),
            Err(disagg_core::DisaggError::InvalidConfig(_))
        ));
        let solver: Arc<dyn SetPackingSolver> = Arc::new(crate::combinatorial::MilpSolver);
        assert!(DisaggEngine::with_solver(config, solver).is_err());
    }

    #[test]
    fn every_shape_stage_is_accounted() {
        let report = DisaggEngine::new(DisaggConfig::default()).unwrap().run(&block_series());
        let stages: Vec<&str> = report.metrics.shape_stages.keys().map(String::as_str).collect();
        assert_eq!(
            stages,
            vec!["basic_shapes", "dense_clusters", "direct_match", "switching_pairs"]
        );
    }
}
