//! Transparency module for the activity sentinel.
//!
//! Tracks what the sentinel observed and decided so users can see exactly
//! how much monitoring took place.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, SharedTransparencyLog, TransparencyLog,
    TransparencyStats,
};
