//! Collection orchestrator.
//!
//! Owns one [`EventStore`] per source, hands out writer handles ([`EventSink`])
//! to capture hooks and answers time-aligned snapshot queries for the analysis
//! consumer.

use crate::collector::store::{EventStore, StoreStats};
use crate::collector::types::{
    EventSource, KeyboardEvent, PointerEvent, SensorEvent, Timestamped, WindowEvent,
};
use crate::config::{ConfigError, StoreConfig};
use crate::core::windowing::{DegradedSource, EventSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Errors that can occur while attaching capture hooks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("capture hook unavailable: {0}")]
    HookUnavailable(String),
    #[error("input monitoring permission denied: {0}")]
    PermissionDenied(String),
}

/// Live status of one capture source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SourceStatus {
    Live,
    Stopped,
    Degraded(String),
}

#[derive(Debug, Default)]
struct SourceState {
    accepting: AtomicBool,
    degraded: Mutex<Option<String>>,
}

impl SourceState {
    fn status(&self) -> SourceStatus {
        let degraded = self
            .degraded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match degraded {
            Some(reason) => SourceStatus::Degraded(reason),
            None if self.accepting.load(Ordering::Acquire) => SourceStatus::Live,
            None => SourceStatus::Stopped,
        }
    }

    fn set_degraded(&self, reason: Option<String>) {
        *self.degraded.lock().unwrap_or_else(PoisonError::into_inner) = reason;
    }
}

/// Writer handle for one source's store.
///
/// This is the only way events enter a store. It is cheap to clone and safe to
/// call from any hook thread.
#[derive(Debug)]
pub struct EventSink<E> {
    source: EventSource,
    store: Arc<EventStore<E>>,
    state: Arc<SourceState>,
}

impl<E> Clone for EventSink<E> {
    fn clone(&self) -> Self {
        Self {
            source: self.source,
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
        }
    }
}

impl<E: Timestamped + Clone> EventSink<E> {
    /// Record an event. Returns false (and drops the event) while capture is
    /// stopped.
    pub fn push(&self, event: E) -> bool {
        if !self.state.accepting.load(Ordering::Acquire) {
            return false;
        }
        self.store.record(event);
        true
    }

    /// Whether pushes are currently accepted.
    pub fn is_open(&self) -> bool {
        self.state.accepting.load(Ordering::Acquire)
    }

    /// Flag this source as degraded (hook detached, permission revoked...).
    pub fn report_degraded(&self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(source = %self.source, %reason, "capture degraded");
        self.state.set_degraded(Some(reason));
    }

    pub fn source(&self) -> EventSource {
        self.source
    }
}

/// The set of sinks handed to a capture hook.
#[derive(Debug, Clone)]
pub struct CaptureSinks {
    pub keyboard: EventSink<KeyboardEvent>,
    pub pointer: EventSink<PointerEvent>,
    pub window: EventSink<WindowEvent>,
}

impl CaptureSinks {
    /// Route a mixed-stream event to its source's sink.
    pub fn route(&self, event: SensorEvent) -> bool {
        match event {
            SensorEvent::Keyboard(e) => self.keyboard.push(e),
            SensorEvent::Pointer(e) => self.pointer.push(e),
            SensorEvent::Window(e) => self.window.push(e),
        }
    }

    pub fn report_degraded(&self, source: EventSource, reason: impl Into<String>) {
        match source {
            EventSource::Keyboard => self.keyboard.report_degraded(reason),
            EventSource::Pointer => self.pointer.report_degraded(reason),
            EventSource::Window => self.window.report_degraded(reason),
        }
    }
}

/// An input hook layer feeding one or more sources.
pub trait CaptureHook: Send {
    fn name(&self) -> &str;

    /// Sources this hook produces.
    fn sources(&self) -> &[EventSource];

    /// Begin delivering events into `sinks`.
    fn attach(&mut self, sinks: CaptureSinks) -> Result<(), CaptureError>;

    /// Stop delivering events. Must not block indefinitely.
    fn detach(&mut self);
}

/// Per-source capture status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureHealth {
    pub keyboard: SourceStatus,
    pub pointer: SourceStatus,
    pub window: SourceStatus,
}

impl CaptureHealth {
    pub fn get(&self, source: EventSource) -> &SourceStatus {
        match source {
            EventSource::Keyboard => &self.keyboard,
            EventSource::Pointer => &self.pointer,
            EventSource::Window => &self.window,
        }
    }

    pub fn degraded(&self) -> Vec<DegradedSource> {
        EventSource::ALL
            .into_iter()
            .filter_map(|source| match self.get(source) {
                SourceStatus::Degraded(reason) => Some(DegradedSource {
                    source,
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Counters of all three stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStats {
    pub keyboard: StoreStats,
    pub pointer: StoreStats,
    pub window: StoreStats,
}

impl CollectorStats {
    pub fn total_recorded(&self) -> u64 {
        self.keyboard.recorded + self.pointer.recorded + self.window.recorded
    }
}

/// Owns the three stores and the hooks that feed them.
pub struct Collector {
    keyboard: Arc<EventStore<KeyboardEvent>>,
    pointer: Arc<EventStore<PointerEvent>>,
    window: Arc<EventStore<WindowEvent>>,
    keyboard_state: Arc<SourceState>,
    pointer_state: Arc<SourceState>,
    window_state: Arc<SourceState>,
    hooks: Vec<Box<dyn CaptureHook>>,
    running: bool,
}

impl Collector {
    /// Create a collector with empty stores sized from `config`.
    pub fn new(config: &StoreConfig) -> Result<Self, ConfigError> {
        let retention = config.retention();
        Ok(Self {
            keyboard: Arc::new(EventStore::new(
                EventSource::Keyboard,
                config.keyboard_capacity,
                retention,
            )?),
            pointer: Arc::new(EventStore::new(
                EventSource::Pointer,
                config.pointer_capacity,
                retention,
            )?),
            window: Arc::new(EventStore::new(
                EventSource::Window,
                config.window_capacity,
                retention,
            )?),
            keyboard_state: Arc::default(),
            pointer_state: Arc::default(),
            window_state: Arc::default(),
            hooks: Vec::new(),
            running: false,
        })
    }

    /// Register a hook; it is attached on the next `start()`.
    pub fn add_hook(&mut self, hook: Box<dyn CaptureHook>) {
        self.hooks.push(hook);
    }

    pub fn with_hook(mut self, hook: impl CaptureHook + 'static) -> Self {
        self.add_hook(Box::new(hook));
        self
    }

    /// Writer handles for all three stores.
    pub fn sinks(&self) -> CaptureSinks {
        CaptureSinks {
            keyboard: EventSink {
                source: EventSource::Keyboard,
                store: Arc::clone(&self.keyboard),
                state: Arc::clone(&self.keyboard_state),
            },
            pointer: EventSink {
                source: EventSource::Pointer,
                store: Arc::clone(&self.pointer),
                state: Arc::clone(&self.pointer_state),
            },
            window: EventSink {
                source: EventSource::Window,
                store: Arc::clone(&self.window),
                state: Arc::clone(&self.window_state),
            },
        }
    }

    /// Open the sinks and attach every hook.
    ///
    /// A hook that fails to attach degrades its sources; the collector keeps
    /// running on whatever remains.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.running {
            return Err(CaptureError::AlreadyRunning);
        }

        for state in self.states() {
            state.set_degraded(None);
            state.accepting.store(true, Ordering::Release);
        }

        let sinks = self.sinks();
        for hook in &mut self.hooks {
            match hook.attach(sinks.clone()) {
                Ok(()) => info!(hook = hook.name(), "capture hook attached"),
                Err(e) => {
                    for &source in hook.sources() {
                        sinks.report_degraded(source, format!("{}: {e}", hook.name()));
                    }
                }
            }
        }

        self.running = true;
        info!(hooks = self.hooks.len(), "collection started");
        Ok(())
    }

    /// Stop accepting events and detach hooks. Recorded events stay queryable.
    pub fn stop(&mut self) {
        for state in self.states() {
            state.accepting.store(false, Ordering::Release);
        }
        for hook in &mut self.hooks {
            hook.detach();
        }
        if self.running {
            info!("collection stopped");
        }
        self.running = false;
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Snapshot the trailing `window` ending now.
    pub fn snapshot(&self, window: Duration) -> EventSnapshot {
        self.snapshot_at(Utc::now(), window)
    }

    /// Snapshot `[now - window, now]` from all three stores against one
    /// reference instant.
    pub fn snapshot_at(&self, now: DateTime<Utc>, window: Duration) -> EventSnapshot {
        let window = chrono::Duration::milliseconds(window.as_millis() as i64);
        let mut snapshot = EventSnapshot::new(now, window);
        snapshot.keyboard_events = self.keyboard.query(snapshot.start, now);
        snapshot.pointer_events = self.pointer.query(snapshot.start, now);
        snapshot.window_events = self.window.query(snapshot.start, now);
        snapshot.degraded_sources = self.health().degraded();

        debug!(
            keyboard = snapshot.keyboard_events.len(),
            pointer = snapshot.pointer_events.len(),
            window = snapshot.window_events.len(),
            "snapshot taken"
        );
        snapshot
    }

    pub fn health(&self) -> CaptureHealth {
        CaptureHealth {
            keyboard: self.keyboard_state.status(),
            pointer: self.pointer_state.status(),
            window: self.window_state.status(),
        }
    }

    pub fn stats(&self) -> CollectorStats {
        CollectorStats {
            keyboard: self.keyboard.stats(),
            pointer: self.pointer.stats(),
            window: self.window.stats(),
        }
    }

    /// Empty all three stores.
    pub fn clear_all(&self) {
        self.keyboard.clear();
        self.pointer.clear();
        self.window.clear();
        debug!("all stores cleared");
    }

    fn states(&self) -> [&Arc<SourceState>; 3] {
        [&self.keyboard_state, &self.pointer_state, &self.window_state]
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.stop();
    }
}
