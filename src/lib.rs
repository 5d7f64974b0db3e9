//! Synheart Activity Sentinel - detection of scripted versus human input.
//!
//! The sentinel watches keyboard, pointer and window-focus activity, turns
//! each trailing window into a fixed-schema feature vector and judges it with
//! threshold rules (optionally blended with an external scorer). Every tick
//! yields an explainable [`DecisionReport`].
//!
//! # Privacy Guarantees
//!
//! - **No typed text**: Keys are recorded as symbolic identities, never as text
//! - **Bounded retention**: Stores are capacity-bounded and age out old events
//! - **No raw export**: Only reports and feature vectors leave the process
//! - **Transparency**: Every observation and decision is counted and auditable
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                    Synheart Activity Sentinel                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │ Capture     │──▶│ Event       │──▶│  Snapshot   │            │
//! │  │ hooks       │   │ stores      │   │ (window)    │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │                                             │                    │
//! │                                             ▼                    │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐            │
//! │  │  Decision   │◀──│ Rules  (+   │◀──│  Features   │            │
//! │  │  report     │   │ scorer)     │   │ (31 values) │            │
//! │  └─────────────┘   └─────────────┘   └─────────────┘            │
//! │         │                                                        │
//! │         ▼                                                        │
//! │  ┌─────────────┐                                                 │
//! │  │Transparency │                                                 │
//! │  │    Log      │                                                 │
//! │  └─────────────┘                                                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use synheart_activity_sentinel::{
//!     collector::Collector, config::StoreConfig, detection::Detector,
//!     detection::RuleThresholds, detection::ScoringPolicy, simulate::Scenario,
//! };
//!
//! let mut collector = Collector::new(&StoreConfig::default())?;
//! collector.start()?;
//!
//! let sinks = collector.sinks();
//! let now = chrono::Utc::now();
//! for event in Scenario::KeyRepeater.generate(now, chrono::Duration::seconds(60), 7) {
//!     sinks.route(event);
//! }
//!
//! let detector = Detector::new("USER_001", &RuleThresholds::default(), ScoringPolicy::RulesOnly)?;
//! let report = detector.analyze(&collector.snapshot_at(now, std::time::Duration::from_secs(60)));
//! println!("{}", report.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod detection;
pub mod monitor;
pub mod simulate;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use collector::{CaptureError, CaptureHook, Collector, SensorEvent};
pub use config::{Config, ConfigError, StoreConfig};
pub use core::{compute_features, EventSnapshot, Feature, FeatureVector};
pub use detection::{
    ConfidenceLevel, Decision, DecisionReport, Detector, RuleEngine, RuleThresholds, Scorer,
    ScoringPolicy,
};
pub use monitor::{Monitor, MonitorHandle};
pub use simulate::Scenario;
pub use transparency::{SharedTransparencyLog, TransparencyLog, TransparencyStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Monitoring declaration that can be displayed to users.
pub const PRIVACY_DECLARATION: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║      SYNHEART ACTIVITY SENTINEL - MONITORING DECLARATION         ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This sentinel checks whether input activity looks automated.    ║
║                                                                  ║
║  ✓ WHAT WE OBSERVE:                                              ║
║    • Key identities and press/release timing                     ║
║    • Pointer positions, clicks and scrolls                       ║
║    • Which application has focus                                 ║
║                                                                  ║
║  ✗ WHAT WE NEVER CAPTURE:                                        ║
║    • The text you type (no passwords, messages, etc.)            ║
║    • Window contents or screenshots                              ║
║                                                                  ║
║  Events live in bounded memory stores and age out after the      ║
║  retention period. Only decision reports leave the process.      ║
║                                                                  ║
║  You can view monitoring statistics anytime with:                ║
║    activity-sentinel status                                      ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
