//! Event collection.
//!
//! Capture hooks push events through [`EventSink`]s into bounded per-source
//! stores owned by the [`Collector`]; the analysis side only ever sees copied
//! snapshots.

pub mod channel;
pub mod orchestrator;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use channel::{channel_hook, ChannelHook, DEFAULT_CHANNEL_CAPACITY};
pub use orchestrator::{
    CaptureError, CaptureHealth, CaptureHook, CaptureSinks, Collector, CollectorStats, EventSink,
    SourceStatus,
};
pub use store::{EventStore, StoreStats};
pub use types::{
    EventSource, KeyAction, KeyId, KeyboardEvent, PointerButton, PointerEvent, PointerKind,
    SensorEvent, Timestamped, WindowEvent,
};
