//! Threshold-based event boundary detection over the raw power curve.

use tracing::debug;

use disagg_core::config::SegmentationConfig;
use disagg_core::{Event, PowerSeries, RunContext};

/// `min(active) + offset`, or `None` for an empty series.
pub fn event_threshold(active: &[f64], background_offset: f64) -> Option<f64> {
    if active.is_empty() {
        return None;
    }
    let min = active.iter().copied().fold(f64::INFINITY, f64::min);
    Some(min + background_offset)
}

/// Scan the series and cut it into events.
///
/// An event opens on the sample before the first crossing above threshold and
/// closes on the first sample at or below it, provided nothing within the next
/// `event_time_limit` samples rises back above. Confirmed spans whose mean
/// active power does not exceed the threshold are rejected as noise bursts.
/// An event still open when the series ends is discarded.
pub fn segment(series: &PowerSeries, config: &SegmentationConfig, ctx: &mut RunContext) -> Vec<Event> {
    let active = &series.active;
    let n = active.len();
    let mut events = Vec::new();
    if n < 2 {
        return events;
    }
    let Some(threshold) = event_threshold(active, config.resolved_background_offset()) else {
        return events;
    };
    let above = |i: usize| active[i] > threshold;

    let mut start: Option<usize> = if above(0) { Some(0) } else { None };
    // First sample not yet claimed by a confirmed event.
    let mut next_free = 0;
    let mut i = 1;
    while i < n {
        let Some(s) = start else {
            if above(i) {
                start = Some((i - 1).max(next_free));
            }
            i += 1;
            continue;
        };

        if above(i) {
            i += 1;
            continue;
        }

        // Provisional end: look ahead for a rise that would continue the event.
        let look_end = (i + config.event_time_limit).min(n - 1);
        if let Some(rise) = (i + 1..=look_end).find(|&j| above(j)) {
            i = rise + 1;
            continue;
        }

        let end = i;
        let span = &active[s..=end];
        let mean = span.iter().sum::<f64>() / span.len() as f64;
        if mean > threshold {
            let event = Event::new(
                ctx.ids.next_event_id(),
                s,
                end,
                span.to_vec(),
                series.reactive[s..=end].to_vec(),
            );
            debug!(event_id = %event.id, start = s, end, mean, "event confirmed");
            events.push(event);
        } else {
            debug!(start = s, end, mean, threshold, "span rejected: mean below threshold");
        }
        start = None;
        next_free = end + 1;
        i += 1;
    }

    if let Some(s) = start {
        debug!(start = s, "discarding event still open at series end");
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(offset: f64, limit: usize) -> SegmentationConfig {
        SegmentationConfig {
            background_offset: Some(offset),
            event_time_limit: limit,
            ..Default::default()
        }
    }

    fn run(active: Vec<f64>, offset: f64, limit: usize) -> Vec<Event> {
        let reactive = vec![0.0; active.len()];
        let series = PowerSeries::new(active, reactive).unwrap();
        segment(&series, &config(offset, limit), &mut RunContext::new())
    }

    #[test]
    fn zero_lookahead_events_do_not_share_samples() {
        let events = run(vec![0.0, 1000.0, 0.0, 1000.0, 0.0, 0.0], 30.0, 0);
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start_minute, events[0].end_minute), (0, 2));
        assert_eq!((events[1].start_minute, events[1].end_minute), (3, 4));
    }

    #[test]
    fn flat_curve_has_no_events() {
        assert!(run(vec![50.0, 50.0, 50.0], 30.0, 5).is_empty());
    }

    #[test]
    fn empty_and_single_sample_series() {
        assert!(run(vec![], 30.0, 5).is_empty());
        assert!(run(vec![1000.0], 30.0, 5).is_empty());
    }

    #[test]
    fn single_block_event_boundaries() {
        let series = PowerSeries::new(
            vec![0.0, 0.0, 1000.0, 1000.0, 1000.0, 0.0, 0.0],
            vec![0.0, 0.0, 200.0, 200.0, 200.0, 0.0, 0.0],
        )
        .unwrap();
        let events = segment(&series, &config(30.0, 5), &mut RunContext::new());
        assert_eq!(events.len(), 1);
        let ev = &events[0];
        assert_eq!(ev.start_minute, 1);
        assert_eq!(ev.end_minute, 5);
        assert_eq!(ev.active_power, vec![0.0, 1000.0, 1000.0, 1000.0, 0.0]);
        assert_eq!(ev.reactive_power, vec![0.0, 200.0, 200.0, 200.0, 0.0]);
    }

    #[test]
    fn short_dip_does_not_split_event() {
        let events = run(
            vec![0.0, 1000.0, 1000.0, 10.0, 1000.0, 1000.0, 0.0, 0.0, 0.0],
            30.0,
            3,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_minute, 0);
        assert_eq!(events[0].end_minute, 6);
    }

    #[test]
    fn long_gap_splits_events() {
        let mut active = vec![0.0, 800.0, 800.0];
        active.extend(std::iter::repeat(0.0).take(6));
        active.extend([500.0, 500.0, 0.0, 0.0]);
        let events = run(active, 30.0, 3);
        assert_eq!(events.len(), 2);
        assert!(events[0].end_minute < events[1].start_minute);
        assert!(events[0].id < events[1].id);
    }

    #[test]
    fn open_event_at_series_end_discarded() {
        assert!(run(vec![0.0, 0.0, 1000.0, 1000.0], 30.0, 5).is_empty());
    }

    #[test]
    fn low_mean_burst_rejected() {
        // 40W blip over a 0W floor: above 30W threshold, but span mean is ~13W.
        assert!(run(vec![0.0, 0.0, 40.0, 0.0, 0.0], 30.0, 1).is_empty());
    }

    #[test]
    fn series_starting_high_opens_at_zero() {
        // Floor is 0W (last samples), so the first samples are above threshold.
        let events = run(vec![900.0, 900.0, 0.0, 0.0, 0.0], 30.0, 2);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start_minute, 0);
        assert_eq!(events[0].end_minute, 2);
    }

    #[test]
    fn events_never_have_length_one() {
        let events = run(vec![0.0, 1000.0, 0.0, 0.0, 1000.0, 0.0, 0.0], 30.0, 1);
        assert!(!events.is_empty());
        for ev in events {
            assert!(ev.start_minute < ev.end_minute);
            assert!(ev.len() >= 2);
        }
    }
}
