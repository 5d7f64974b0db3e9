//! Behavioral detection.
//!
//! Turns a feature vector into an explainable decision: ordered threshold
//! rules, an optional external scorer and the resulting report.

pub mod detector;
pub mod engine;
pub mod report;
pub mod rules;
pub mod scorer;

// Re-export commonly used types
pub use detector::Detector;
pub use engine::{RuleEngine, RuleOutcome};
pub use report::{ConfidenceLevel, Decision, DecisionReport, DegradedMarker, Verdict};
pub use rules::{Comparison, Rule, RuleId, RuleThresholds, RuleViolation};
pub use scorer::{FnScorer, Scorer, ScorerError, ScoringPolicy};
