//! Decision reports.
//!
//! A report is the output of one analysis tick. It is built once and exposes
//! read-only accessors; its serialized field names are a compatibility
//! contract for downstream consumers.

use crate::collector::types::EventSource;
use crate::core::features::{Extractor, FeatureVector};
use crate::detection::rules::RuleViolation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Probability at which confidence becomes MEDIUM.
pub const MEDIUM_CONFIDENCE: f64 = 0.5;

/// Probability at which confidence becomes HIGH.
pub const HIGH_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_CONFIDENCE {
            ConfidenceLevel::High
        } else if probability >= MEDIUM_CONFIDENCE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for a window, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Genuine,
    Suspicious,
    FakeLow,
    FakeMedium,
    FakeHigh,
}

impl Decision {
    /// The FAKE tier matching a confidence band.
    pub fn fake(confidence: ConfidenceLevel) -> Self {
        match confidence {
            ConfidenceLevel::Low => Decision::FakeLow,
            ConfidenceLevel::Medium => Decision::FakeMedium,
            ConfidenceLevel::High => Decision::FakeHigh,
        }
    }

    /// Decision from the number of violated rules.
    pub fn from_violations(count: usize, confidence: ConfidenceLevel) -> Self {
        match count {
            0 => Decision::Genuine,
            1 => Decision::Suspicious,
            _ => Decision::fake(confidence),
        }
    }

    pub fn is_fake(&self) -> bool {
        matches!(
            self,
            Decision::FakeLow | Decision::FakeMedium | Decision::FakeHigh
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Genuine => "GENUINE",
            Decision::Suspicious => "SUSPICIOUS",
            Decision::FakeLow => "FAKE_LOW",
            Decision::FakeMedium => "FAKE_MEDIUM",
            Decision::FakeHigh => "FAKE_HIGH",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a report was produced with less than full information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DegradedMarker {
    /// A capture source was not live during the window
    Capture { source: EventSource, reason: String },
    /// An extractor's output was replaced by neutral values
    Extractor { extractor: Extractor, reason: String },
    /// The scorer was consulted but its output was not used
    Scorer { name: String, reason: String },
}

impl fmt::Display for DegradedMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradedMarker::Capture { source, reason } => write!(f, "capture/{source}: {reason}"),
            DegradedMarker::Extractor { extractor, reason } => {
                write!(f, "extractor/{extractor}: {reason}")
            }
            DegradedMarker::Scorer { name, reason } => write!(f, "scorer/{name}: {reason}"),
        }
    }
}

/// Outcome of judging one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub decision: Decision,
    pub probability: f64,
    pub confidence: ConfidenceLevel,
    pub reasons: Vec<String>,
    pub violations: Vec<RuleViolation>,
    pub scorer_probability: Option<f64>,
}

/// The result of one analysis tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionReport {
    report_id: Uuid,
    subject_id: String,
    timestamp: DateTime<Utc>,
    window_seconds: f64,
    decision: Decision,
    probability: f64,
    confidence: ConfidenceLevel,
    reasons: Vec<String>,
    violations: Vec<RuleViolation>,
    scorer_probability: Option<f64>,
    degraded: Vec<DegradedMarker>,
    features: FeatureVector,
}

impl DecisionReport {
    pub fn new(
        subject_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        window_seconds: f64,
        verdict: Verdict,
        features: FeatureVector,
        degraded: Vec<DegradedMarker>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            timestamp,
            window_seconds,
            decision: verdict.decision,
            probability: verdict.probability,
            confidence: verdict.confidence,
            reasons: verdict.reasons,
            violations: verdict.violations,
            scorer_probability: verdict.scorer_probability,
            degraded,
            features,
        }
    }

    pub fn report_id(&self) -> Uuid {
        self.report_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// End of the analysed window.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn confidence(&self) -> ConfidenceLevel {
        self.confidence
    }

    /// Explanations in rule order.
    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    pub fn violations(&self) -> &[RuleViolation] {
        &self.violations
    }

    pub fn scorer_probability(&self) -> Option<f64> {
        self.scorer_probability
    }

    pub fn degraded(&self) -> &[DegradedMarker] {
        &self.degraded
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    pub fn features(&self) -> &FeatureVector {
        &self.features
    }

    /// One-line summary for logs and the console.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "[{}] {} {} p={:.2} ({})",
            self.timestamp.format("%H:%M:%S"),
            self.subject_id,
            self.decision,
            self.probability,
            self.confidence
        );
        if !self.reasons.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.reasons.join("; "));
        }
        if self.is_degraded() {
            line.push_str(&format!(" | degraded: {}", self.degraded.len()));
        }
        line
    }
}
