//! Behavioral rules.
//!
//! Each rule reads one measure from the feature vector and compares it with a
//! configurable threshold. Rules are stateless; the same vector always yields
//! the same violations.

use crate::config::ConfigError;
use crate::core::features::{Feature, FeatureVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest severity a violated rule can carry.
pub const MIN_SEVERITY: f64 = 0.01;

/// Identity of a rule, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    ExcessiveKeyRepetition,
    LinearMouseMovement,
    ShortcutAbuse,
    ActivitySpike,
    LowBehavioralEntropy,
    HighMouseJitter,
    PeriodicBehavior,
    LowInputDiversity,
}

impl RuleId {
    pub const ALL: [RuleId; 8] = [
        RuleId::ExcessiveKeyRepetition,
        RuleId::LinearMouseMovement,
        RuleId::ShortcutAbuse,
        RuleId::ActivitySpike,
        RuleId::LowBehavioralEntropy,
        RuleId::HighMouseJitter,
        RuleId::PeriodicBehavior,
        RuleId::LowInputDiversity,
    ];

    /// Human-readable name used in report reasons.
    pub fn name(self) -> &'static str {
        match self {
            RuleId::ExcessiveKeyRepetition => "Excessive key repetition",
            RuleId::LinearMouseMovement => "Linear mouse movement",
            RuleId::ShortcutAbuse => "Shortcut abuse",
            RuleId::ActivitySpike => "Suspicious activity spike",
            RuleId::LowBehavioralEntropy => "Very low behavioral entropy",
            RuleId::HighMouseJitter => "High mouse jitter",
            RuleId::PeriodicBehavior => "Periodic behavior",
            RuleId::LowInputDiversity => "Low input diversity",
        }
    }

    /// Stable snake_case key, matching the serialized form.
    pub fn key(self) -> &'static str {
        match self {
            RuleId::ExcessiveKeyRepetition => "excessive_key_repetition",
            RuleId::LinearMouseMovement => "linear_mouse_movement",
            RuleId::ShortcutAbuse => "shortcut_abuse",
            RuleId::ActivitySpike => "activity_spike",
            RuleId::LowBehavioralEntropy => "low_behavioral_entropy",
            RuleId::HighMouseJitter => "high_mouse_jitter",
            RuleId::PeriodicBehavior => "periodic_behavior",
            RuleId::LowInputDiversity => "low_input_diversity",
        }
    }

    fn comparison(self) -> Comparison {
        match self {
            RuleId::LinearMouseMovement
            | RuleId::LowBehavioralEntropy
            | RuleId::LowInputDiversity => Comparison::Below,
            _ => Comparison::Above,
        }
    }

    /// The value this rule judges.
    pub fn measure(self, features: &FeatureVector) -> f64 {
        match self {
            RuleId::ExcessiveKeyRepetition => features[Feature::RepeatKeyRatio],
            RuleId::LinearMouseMovement => features[Feature::MouseCurvature],
            RuleId::ShortcutAbuse => features[Feature::ShortcutAbuseScore],
            RuleId::ActivitySpike => features[Feature::ActivitySpikeScore],
            RuleId::LowBehavioralEntropy => {
                (features[Feature::KeystrokeEntropy] + features[Feature::MouseEntropy]) / 2.0
            }
            RuleId::HighMouseJitter => features[Feature::MouseJitterScore],
            RuleId::PeriodicBehavior => features[Feature::PeriodicBehaviorScore],
            RuleId::LowInputDiversity => features[Feature::InputDiversityScore],
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which side of the threshold is suspicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Violated when the measure exceeds the threshold
    Above,
    /// Violated when the measure falls short of the threshold
    Below,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Above => ">",
            Comparison::Below => "<",
        }
    }
}

/// Rule thresholds. All values are on the [0, 1] scale of their measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub max_repeat_key_ratio: f64,
    pub min_mouse_curvature: f64,
    pub max_shortcut_abuse: f64,
    pub max_activity_spike: f64,
    pub min_behavioral_entropy: f64,
    pub max_mouse_jitter: f64,
    pub max_periodic_behavior: f64,
    pub min_input_diversity: f64,
    /// Windows with fewer events are not judged at all
    pub min_events_for_analysis: u32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            max_repeat_key_ratio: 0.7,
            min_mouse_curvature: 0.05,
            max_shortcut_abuse: 0.5,
            max_activity_spike: 0.8,
            min_behavioral_entropy: 0.1,
            max_mouse_jitter: 0.7,
            max_periodic_behavior: 0.8,
            min_input_diversity: 0.4,
            min_events_for_analysis: 5,
        }
    }
}

impl RuleThresholds {
    pub fn threshold(&self, rule: RuleId) -> f64 {
        match rule {
            RuleId::ExcessiveKeyRepetition => self.max_repeat_key_ratio,
            RuleId::LinearMouseMovement => self.min_mouse_curvature,
            RuleId::ShortcutAbuse => self.max_shortcut_abuse,
            RuleId::ActivitySpike => self.max_activity_spike,
            RuleId::LowBehavioralEntropy => self.min_behavioral_entropy,
            RuleId::HighMouseJitter => self.max_mouse_jitter,
            RuleId::PeriodicBehavior => self.max_periodic_behavior,
            RuleId::LowInputDiversity => self.min_input_diversity,
        }
    }

    /// Every threshold must be finite and within [0, 1].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for rule in RuleId::ALL {
            let value = self.threshold(rule);
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold {
                    rule: rule.key(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Build the rule set in evaluation order.
    pub fn rules(&self) -> Vec<Rule> {
        RuleId::ALL
            .iter()
            .map(|&id| Rule::new(id, self.threshold(id)))
            .collect()
    }
}

/// One threshold rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    id: RuleId,
    threshold: f64,
}

impl Rule {
    pub fn new(id: RuleId, threshold: f64) -> Self {
        Self { id, threshold }
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn comparison(&self) -> Comparison {
        self.id.comparison()
    }

    /// Check the rule against a vector.
    pub fn evaluate(&self, features: &FeatureVector) -> Option<RuleViolation> {
        let value = self.id.measure(features);
        let (violated, raw_severity) = match self.comparison() {
            Comparison::Above => (value > self.threshold, value),
            Comparison::Below => (value < self.threshold, 1.0 - value),
        };

        violated.then(|| RuleViolation {
            rule: self.id,
            value,
            severity: clamp_severity(raw_severity),
        })
    }
}

fn clamp_severity(value: f64) -> f64 {
    if value.is_nan() {
        MIN_SEVERITY
    } else {
        value.clamp(MIN_SEVERITY, 1.0)
    }
}

/// A violated rule with the measured value and its severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: RuleId,
    pub value: f64,
    pub severity: f64,
}

impl RuleViolation {
    /// Report reason, e.g. `"Excessive key repetition (0.95)"`.
    pub fn reason(&self) -> String {
        format!("{} ({:.2})", self.rule.name(), self.value)
    }
}
