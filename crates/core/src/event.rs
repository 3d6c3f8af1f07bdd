use serde::{Deserialize, Serialize};

use crate::context::EventId;
use crate::poi::{sort_chronologically, Direction, PoiId, PointOfInterest};

/// How a final pair was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Direct,
    DenseCluster,
    Chair,
    InvertedChair,
    Triangle,
    Rectangle,
    Combinatorial,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Direct => write!(f, "Direct"),
            MatchKind::DenseCluster => write!(f, "DenseCluster"),
            MatchKind::Chair => write!(f, "Chair"),
            MatchKind::InvertedChair => write!(f, "InvertedChair"),
            MatchKind::Triangle => write!(f, "Triangle"),
            MatchKind::Rectangle => write!(f, "Rectangle"),
            MatchKind::Combinatorial => write!(f, "Combinatorial"),
        }
    }
}

/// A switch-on/switch-off pair representing one appliance cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub rising: PointOfInterest,
    pub reduction: PointOfInterest,
    pub kind: MatchKind,
}

impl MatchedPair {
    pub fn new(rising: PointOfInterest, reduction: PointOfInterest, kind: MatchKind) -> Self {
        debug_assert_eq!(rising.direction, Direction::Rising);
        debug_assert_eq!(reduction.direction, Direction::Reduction);
        Self {
            rising,
            reduction,
            kind,
        }
    }

    /// Minutes between switch-on and switch-off.
    pub fn duration(&self) -> usize {
        self.reduction.minute.saturating_sub(self.rising.minute)
    }

    pub fn contains(&self, id: PoiId) -> bool {
        self.rising.id == id || self.reduction.id == id
    }
}

/// A contiguous window where aggregate power exceeds the background threshold.
///
/// Owns its points for its whole lifetime. Open points live in
/// `rising_points`/`reduction_points` until a matching stage moves them into
/// `final_pairs` (or drops them as noise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub start_minute: usize,
    pub end_minute: usize,
    pub active_power: Vec<f64>,
    pub reactive_power: Vec<f64>,
    pub rising_points: Vec<PointOfInterest>,
    pub reduction_points: Vec<PointOfInterest>,
    pub final_pairs: Vec<MatchedPair>,
    /// Noise threshold applied by the extractor, if extraction ran.
    pub noise_threshold: Option<f64>,
}

impl Event {
    pub fn new(
        id: EventId,
        start_minute: usize,
        end_minute: usize,
        active_power: Vec<f64>,
        reactive_power: Vec<f64>,
    ) -> Self {
        Self {
            id,
            start_minute,
            end_minute,
            active_power,
            reactive_power,
            rising_points: Vec::new(),
            reduction_points: Vec::new(),
            final_pairs: Vec::new(),
            noise_threshold: None,
        }
    }

    pub fn len(&self) -> usize {
        self.active_power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_power.is_empty()
    }

    pub fn open_point_count(&self) -> usize {
        self.rising_points.len() + self.reduction_points.len()
    }

    /// Both open sets consumed.
    pub fn is_resolved(&self) -> bool {
        self.rising_points.is_empty() && self.reduction_points.is_empty()
    }

    /// Remove and return every open point, sorted chronologically.
    pub fn take_open_points(&mut self) -> Vec<PointOfInterest> {
        let mut points: Vec<PointOfInterest> = self
            .rising_points
            .drain(..)
            .chain(self.reduction_points.drain(..))
            .collect();
        sort_chronologically(&mut points);
        points
    }

    /// Put points back into the open sets by direction, keeping time order.
    pub fn restore_open_points(&mut self, points: Vec<PointOfInterest>) {
        for point in points {
            match point.direction {
                Direction::Rising => self.rising_points.push(point),
                Direction::Reduction => self.reduction_points.push(point),
            }
        }
        sort_chronologically(&mut self.rising_points);
        sort_chronologically(&mut self.reduction_points);
    }

    pub fn push_pairs(&mut self, pairs: impl IntoIterator<Item = MatchedPair>) {
        self.final_pairs.extend(pairs);
    }

    /// Every open point id that also appears in a final pair.
    pub fn overlapping_ids(&self) -> Vec<PoiId> {
        self.rising_points
            .iter()
            .chain(self.reduction_points.iter())
            .filter(|p| self.final_pairs.iter().any(|pair| pair.contains(p.id)))
            .map(|p| p.id)
            .collect()
    }

    pub fn summary(&self) -> EventSummary {
        let mut unresolved: Vec<PointOfInterest> = self
            .rising_points
            .iter()
            .chain(self.reduction_points.iter())
            .cloned()
            .collect();
        sort_chronologically(&mut unresolved);
        EventSummary {
            event_id: self.id,
            start_minute: self.start_minute,
            end_minute: self.end_minute,
            noise_threshold: self.noise_threshold,
            pairs: self.final_pairs.clone(),
            unresolved,
        }
    }
}

/// Per-event output handed to downstream appliance identification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub event_id: EventId,
    /// Offset of the event in the input series; point minutes are relative to it.
    pub start_minute: usize,
    pub end_minute: usize,
    pub noise_threshold: Option<f64>,
    pub pairs: Vec<MatchedPair>,
    pub unresolved: Vec<PointOfInterest>,
}

impl EventSummary {
    /// Absolute series index of a point minute.
    pub fn absolute_minute(&self, minute: usize) -> usize {
        self.start_minute + minute
    }
}
