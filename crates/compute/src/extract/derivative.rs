//! Derivative signal, step markers, and point construction from marked runs.

use disagg_core::config::ExtractionConfig;
use disagg_core::{Direction, IdSequence, PointOfInterest};

/// Shift a curve so it starts at zero and force its last sample to zero.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let mut out: Vec<f64> = values.iter().map(|v| v - first).collect();
    if let Some(last) = out.last_mut() {
        *last = 0.0;
    }
    out
}

/// Percentage change per step: `(x[i+1] - x[i]) / |x[i]| * 100`.
///
/// Zero to zero is 0; a step out of an exact zero is ±∞ with the sign of the
/// step. The divisor is taken by magnitude so the sign always follows the
/// step, also below the event's starting level.
pub fn percentage_derivative(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            if a == 0.0 {
                if b == 0.0 {
                    0.0
                } else if b > 0.0 {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }
            } else {
                (b - a) / a.abs() * 100.0
            }
        })
        .collect()
}

/// `+1`/`-1` for steps beyond `limit` percent, `0` otherwise.
pub fn markers(derivative: &[f64], limit: f64) -> Vec<i8> {
    derivative
        .iter()
        .map(|&d| {
            if d > limit {
                1
            } else if d < -limit {
                -1
            } else {
                0
            }
        })
        .collect()
}

/// A maximal run of nonzero markers, as inclusive step indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerRun {
    Individual(usize),
    Group { start: usize, end: usize },
}

pub fn marker_runs(markers: &[i8]) -> Vec<MarkerRun> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < markers.len() {
        if markers[i] == 0 {
            i += 1;
            continue;
        }
        let start = i;
        while i + 1 < markers.len() && markers[i + 1] != 0 {
            i += 1;
        }
        runs.push(if start == i {
            MarkerRun::Individual(start)
        } else {
            MarkerRun::Group { start, end: i }
        });
        i += 1;
    }
    runs
}

/// Builds classified points from the runs of one normalized event.
///
/// `floor` is the end of the last emitted change window; later windows never
/// extend back past it, so no step is counted twice.
pub(crate) struct PointBuilder<'a> {
    p: &'a [f64],
    q: &'a [f64],
    markers: &'a [i8],
    config: &'a ExtractionConfig,
    ids: &'a mut IdSequence,
    floor: usize,
    pub rising: Vec<PointOfInterest>,
    pub reduction: Vec<PointOfInterest>,
}

impl<'a> PointBuilder<'a> {
    pub fn new(
        p: &'a [f64],
        q: &'a [f64],
        markers: &'a [i8],
        config: &'a ExtractionConfig,
        ids: &'a mut IdSequence,
    ) -> Self {
        Self {
            p,
            q,
            markers,
            config,
            ids,
            floor: 0,
            rising: Vec::new(),
            reduction: Vec::new(),
        }
    }

    pub fn dispatch(&mut self, run: MarkerRun) {
        match run {
            MarkerRun::Individual(i) => self.emit_window(i, i),
            MarkerRun::Group { start, end } => {
                let len = (end - start + 1) as i64;
                let sum: i64 = self.markers[start..=end].iter().map(|&m| m as i64).sum();
                if sum == len || sum == -len {
                    self.same_sign_group(start, end);
                } else {
                    self.mixed_group(start, end);
                }
            }
        }
    }

    /// Consume same-signed steps two at a time; an odd leftover stands alone.
    fn same_sign_group(&mut self, start: usize, end: usize) {
        let mut k = start;
        while k <= end {
            let last = (k + 1).min(end);
            self.emit_window(k, last);
            k = last + 1;
        }
    }

    /// Split at sign changes and dispatch each sub-run.
    fn mixed_group(&mut self, start: usize, end: usize) {
        let mut sub_start = start;
        for k in start + 1..=end + 1 {
            if k > end || self.markers[k] != self.markers[sub_start] {
                let run = if sub_start == k - 1 {
                    MarkerRun::Individual(sub_start)
                } else {
                    MarkerRun::Group {
                        start: sub_start,
                        end: k - 1,
                    }
                };
                self.dispatch(run);
                sub_start = k;
            }
        }
    }

    fn same_direction(&self, step: usize, sign: i8) -> bool {
        let d = self.p[step + 1] - self.p[step];
        d * sign as f64 > 0.0
    }

    /// Emit one point covering marked steps `first..=last`, widened over
    /// adjacent unmarked same-direction steps up to the ramp limits.
    fn emit_window(&mut self, first: usize, last: usize) {
        let sign = self.markers[first];
        let n = self.p.len();

        let mut begin = first;
        while begin > self.floor
            && first - (begin - 1) <= self.config.ramp_back_limit
            && self.markers[begin - 1] == 0
            && self.same_direction(begin - 1, sign)
        {
            begin -= 1;
        }

        let mut end = last + 1;
        while end < n - 1
            && end - (last + 1) < self.config.ramp_forward_limit
            && self.markers[end] == 0
            && self.same_direction(end, sign)
        {
            end += 1;
        }

        let p_diff = self.p[end] - self.p[begin];
        let q_diff = self.q[end] - self.q[begin];
        let direction = if sign > 0 {
            Direction::Rising
        } else {
            Direction::Reduction
        };
        let point = PointOfInterest::new(self.ids.next_poi_id(), first + 1, direction, p_diff, q_diff);
        match direction {
            Direction::Rising => self.rising.push(point),
            Direction::Reduction => self.reduction.push(point),
        }
        self.floor = end;
    }
}
