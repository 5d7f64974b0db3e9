//! Bounded, thread-safe event store.
//!
//! Each capture source owns one store. Writers append under a short critical
//! section; readers get a copied, time-ordered slice of the buffer so they can
//! iterate while capture continues.

use crate::collector::types::{EventSource, Timestamped};
use crate::config::ConfigError;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Fixed-capacity ring of events, oldest evicted first.
#[derive(Debug)]
pub struct EventStore<E> {
    source: EventSource,
    capacity: usize,
    retention: Option<chrono::Duration>,
    events: Mutex<VecDeque<E>>,
    recorded: AtomicU64,
    evicted: AtomicU64,
}

impl<E: Timestamped + Clone> EventStore<E> {
    /// Create a store. A zero capacity is a configuration error.
    pub fn new(
        source: EventSource,
        capacity: usize,
        retention: Option<Duration>,
    ) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroCapacity { channel: source });
        }
        if retention.is_some_and(|r| r.is_zero()) {
            return Err(ConfigError::ZeroDuration("retention_secs"));
        }

        Ok(Self {
            source,
            capacity,
            retention: retention.map(|r| chrono::Duration::milliseconds(r.as_millis() as i64)),
            events: Mutex::new(VecDeque::with_capacity(capacity)),
            recorded: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        })
    }

    /// Append an event, evicting the oldest one when the store is full.
    pub fn record(&self, event: E) {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        events.push_back(event);
        self.recorded.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy out every event with a timestamp in `[start, end]`, ordered by
    /// timestamp (insertion order breaks ties).
    ///
    /// An inverted range yields an empty result. The retention horizon is
    /// enforced here, relative to `end`.
    pub fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<E> {
        if start > end {
            return Vec::new();
        }

        let mut matched: Vec<E> = {
            let mut events = self.lock();
            // A horizon before the earliest representable time prunes nothing
            let horizon = self.retention.and_then(|r| end.checked_sub_signed(r));
            if let Some(horizon) = horizon {
                let before = events.len();
                events.retain(|e| e.timestamp() >= horizon);
                let pruned = (before - events.len()) as u64;
                if pruned > 0 {
                    self.evicted.fetch_add(pruned, Ordering::Relaxed);
                }
            }
            events
                .iter()
                .filter(|e| {
                    let ts = e.timestamp();
                    ts >= start && ts <= end
                })
                .cloned()
                .collect()
        };

        // Stable sort keeps insertion order for equal timestamps.
        matched.sort_by_key(|e| e.timestamp());
        matched
    }

    /// Copy out the whole buffer in timestamp order.
    pub fn all(&self) -> Vec<E> {
        let mut events: Vec<E> = self.lock().iter().cloned().collect();
        events.sort_by_key(|e| e.timestamp());
        events
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn source(&self) -> EventSource {
        self.source
    }

    /// Drop every buffered event.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Counters for this store.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            source: self.source,
            size: self.size(),
            capacity: self.capacity,
            recorded: self.recorded.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<E>> {
        // A producer that panicked mid-append leaves the deque intact.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time counters of one store.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreStats {
    pub source: EventSource,
    pub size: usize,
    pub capacity: usize,
    /// Events ever recorded
    pub recorded: u64,
    /// Events dropped by capacity or retention
    pub evicted: u64,
}
