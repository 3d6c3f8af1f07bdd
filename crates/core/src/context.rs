use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poi::PoiId;

/// Run-scoped identifier of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "event-{}", self.0)
    }
}

/// Monotonic id counters for one processing run. Both start at 1.
#[derive(Debug, Clone)]
pub struct IdSequence {
    next_event: u64,
    next_poi: u64,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self {
            next_event: 1,
            next_poi: 1,
        }
    }
}

impl IdSequence {
    pub fn next_event_id(&mut self) -> EventId {
        let id = EventId(self.next_event);
        self.next_event += 1;
        id
    }

    pub fn next_poi_id(&mut self) -> PoiId {
        let id = PoiId(self.next_poi);
        self.next_poi += 1;
        id
    }

    pub fn events_issued(&self) -> u64 {
        self.next_event - 1
    }

    pub fn pois_issued(&self) -> u64 {
        self.next_poi - 1
    }
}

/// State owned by a single processing run and threaded through every stage.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ids: IdSequence,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ids: IdSequence::default(),
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
