use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{DisaggError, Result};

/// One whole-installation measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub index: i64,
    pub active: f64,
    pub reactive: f64,
}

/// Two dense, aligned power arrays at a uniform sample rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerSeries {
    pub active: Vec<f64>,
    pub reactive: Vec<f64>,
}

impl PowerSeries {
    pub fn new(active: Vec<f64>, reactive: Vec<f64>) -> Result<Self> {
        if active.len() != reactive.len() {
            return Err(DisaggError::InputMismatch {
                active: active.len(),
                reactive: reactive.len(),
            });
        }
        if let Some(pos) = active
            .iter()
            .zip(reactive.iter())
            .position(|(p, q)| !p.is_finite() || !q.is_finite())
        {
            return Err(DisaggError::InvalidSample {
                index: pos as i64,
                reason: "non-finite power value".to_string(),
            });
        }
        Ok(Self { active, reactive })
    }

    /// Build a series from timestamped triples.
    ///
    /// Samples are ordered by index; a repeated index keeps the last sample
    /// seen. Gaps are not interpolated.
    pub fn from_samples(samples: &[PowerSample]) -> Result<Self> {
        let mut by_index: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
        for sample in samples {
            if !sample.active.is_finite() || !sample.reactive.is_finite() {
                return Err(DisaggError::InvalidSample {
                    index: sample.index,
                    reason: "non-finite power value".to_string(),
                });
            }
            by_index.insert(sample.index, (sample.active, sample.reactive));
        }

        let (active, reactive) = by_index.into_values().unzip();
        Ok(Self { active, reactive })
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
