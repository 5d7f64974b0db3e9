//! Core feature pipeline.
//!
//! This module contains:
//! - Event snapshots for one analysis window
//! - Keyboard, pointer and temporal feature extractors
//! - Aggregation into the fixed-schema feature vector

pub mod features;
pub mod keyboard;
pub mod pointer;
pub mod stats;
pub mod temporal;
pub mod windowing;

// Re-export commonly used types
pub use features::{
    aggregate, compute_features, Extractor, ExtractorFailure, Feature, FeatureExtraction,
    FeatureVector, UnknownFeature, FEATURE_SCHEMA_VERSION,
};
pub use keyboard::{compute_keyboard_features, KeyboardFeatures};
pub use pointer::{compute_pointer_features, PointerFeatures};
pub use temporal::{compute_temporal_features, TemporalFeatures};
pub use windowing::{DegradedSource, EventSnapshot};
