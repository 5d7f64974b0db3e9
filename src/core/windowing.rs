//! Time-aligned event snapshots.
//!
//! A snapshot is the immutable input of one analysis tick: the events of all
//! three sources that fall inside the same wall-clock window.

use crate::collector::types::{EventSource, KeyboardEvent, PointerEvent, WindowEvent};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A source whose capture was degraded while the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedSource {
    pub source: EventSource,
    pub reason: String,
}

/// All events of one analysis window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Start time of the window
    pub start: DateTime<Utc>,
    /// End time of the window (the shared "now")
    pub end: DateTime<Utc>,
    pub keyboard_events: Vec<KeyboardEvent>,
    pub pointer_events: Vec<PointerEvent>,
    pub window_events: Vec<WindowEvent>,
    /// Sources that were not fully live
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_sources: Vec<DegradedSource>,
}

impl EventSnapshot {
    /// Create an empty snapshot ending at `end`.
    pub fn new(end: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            start: end - duration,
            end,
            keyboard_events: Vec::new(),
            pointer_events: Vec::new(),
            window_events: Vec::new(),
            degraded_sources: Vec::new(),
        }
    }

    /// Build a snapshot from loose event lists, keeping only in-window events
    /// and ordering each list by timestamp.
    pub fn from_events(
        end: DateTime<Utc>,
        duration: Duration,
        mut keyboard_events: Vec<KeyboardEvent>,
        mut pointer_events: Vec<PointerEvent>,
        mut window_events: Vec<WindowEvent>,
    ) -> Self {
        let mut snapshot = Self::new(end, duration);
        let (start, end) = (snapshot.start, snapshot.end);
        keyboard_events.retain(|e| e.timestamp >= start && e.timestamp <= end);
        pointer_events.retain(|e| e.timestamp >= start && e.timestamp <= end);
        window_events.retain(|e| e.timestamp >= start && e.timestamp <= end);
        keyboard_events.sort_by_key(|e| e.timestamp);
        pointer_events.sort_by_key(|e| e.timestamp);
        window_events.sort_by_key(|e| e.timestamp);
        snapshot.keyboard_events = keyboard_events;
        snapshot.pointer_events = pointer_events;
        snapshot.window_events = window_events;
        snapshot
    }

    /// Check if a timestamp falls within this window.
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }

    /// Check if the window has any events.
    pub fn is_empty(&self) -> bool {
        self.event_count() == 0
    }

    /// Total number of events across all sources.
    pub fn event_count(&self) -> usize {
        self.keyboard_events.len() + self.pointer_events.len() + self.window_events.len()
    }

    /// Get the duration of this window in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyAction;

    #[test]
    fn test_snapshot_bounds() {
        let end = Utc::now();
        let snapshot = EventSnapshot::new(end, Duration::seconds(60));

        assert_eq!(snapshot.start, end - Duration::seconds(60));
        assert_eq!(snapshot.duration_secs(), 60.0);
        assert!(snapshot.is_empty());
        assert!(snapshot.contains(end));
        assert!(snapshot.contains(snapshot.start));
        assert!(!snapshot.contains(end + Duration::milliseconds(1)));
    }

    #[test]
    fn test_from_events_filters_and_sorts() {
        let end = Utc::now();
        let keys = vec![
            KeyboardEvent::at(end - Duration::seconds(1), "b", KeyAction::Press),
            KeyboardEvent::at(end - Duration::seconds(2), "a", KeyAction::Press),
            KeyboardEvent::at(end - Duration::seconds(90), "old", KeyAction::Press),
        ];
        let snapshot =
            EventSnapshot::from_events(end, Duration::seconds(60), keys, Vec::new(), Vec::new());

        assert_eq!(snapshot.event_count(), 2);
        assert_eq!(snapshot.keyboard_events[0].key.as_str(), "a");
        assert_eq!(snapshot.keyboard_events[1].key.as_str(), "b");
    }
}
