// Key event types
// Press/release events, the ordered event stream and cleaning markers

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::keys::KeyId;

/// Whether a key went down or up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Press,
    Release,
}

impl Direction {
    pub fn is_press(self) -> bool {
        self == Direction::Press
    }

    /// Parse the `is_down` column of an event log
    pub fn from_flag(s: &str) -> Option<Self> {
        match s.trim() {
            "1" | "True" | "true" => Some(Direction::Press),
            "0" | "False" | "false" => Some(Direction::Release),
            _ => None,
        }
    }

    pub fn as_flag(self) -> &'static str {
        match self {
            Direction::Press => "1",
            Direction::Release => "0",
        }
    }
}

/// A single press or release of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Milliseconds, non-decreasing across a stream
    pub timestamp_ms: i64,

    pub direction: Direction,

    pub key: KeyId,
}

impl KeyEvent {
    pub fn press(timestamp_ms: i64, key: KeyId) -> Self {
        KeyEvent {
            timestamp_ms,
            direction: Direction::Press,
            key,
        }
    }

    pub fn release(timestamp_ms: i64, key: KeyId) -> Self {
        KeyEvent {
            timestamp_ms,
            direction: Direction::Release,
            key,
        }
    }
}

/// Stream indices of events whose successor was dropped during cleaning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedMarkers(BTreeSet<usize>);

impl RemovedMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, index: usize) {
        self.0.insert(index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<usize> for RemovedMarkers {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        RemovedMarkers(iter.into_iter().collect())
    }
}

/// Time-ordered events of one recording session
#[derive(Debug, Clone, Default)]
pub struct EventStream {
    pub events: Vec<KeyEvent>,

    /// Events after which the cleaner removed something
    pub removed: RemovedMarkers,
}

impl EventStream {
    pub fn new(events: Vec<KeyEvent>) -> Self {
        EventStream {
            events,
            removed: RemovedMarkers::new(),
        }
    }

    pub fn with_removed(events: Vec<KeyEvent>, removed: RemovedMarkers) -> Self {
        EventStream { events, removed }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the last event, if any
    pub fn last_index(&self) -> Option<usize> {
        self.events.len().checked_sub(1)
    }
}
