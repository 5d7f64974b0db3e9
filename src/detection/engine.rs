//! Rule evaluation.

use crate::config::ConfigError;
use crate::core::features::{Feature, FeatureVector};
use crate::detection::report::{ConfidenceLevel, Decision};
use crate::detection::rules::{Rule, RuleThresholds, RuleViolation};
use statrs::statistics::Statistics;

/// Result of running every rule over one vector.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    /// Violations in rule order
    pub violations: Vec<RuleViolation>,
    /// Mean severity of the violations (0 when there are none)
    pub probability: f64,
    pub confidence: ConfidenceLevel,
    pub decision: Decision,
    /// True when the window had too few events to be judged
    pub skipped: bool,
}

impl RuleOutcome {
    fn genuine(skipped: bool) -> Self {
        Self {
            violations: Vec::new(),
            probability: 0.0,
            confidence: ConfidenceLevel::Low,
            decision: Decision::Genuine,
            skipped,
        }
    }

    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(RuleViolation::reason).collect()
    }
}

/// Ordered rule set with its sparse-window guard.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    min_events: u32,
}

impl RuleEngine {
    /// Build the engine, rejecting invalid thresholds.
    pub fn new(thresholds: &RuleThresholds) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        Ok(Self {
            rules: thresholds.rules(),
            min_events: thresholds.min_events_for_analysis,
        })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn min_events(&self) -> u32 {
        self.min_events
    }

    pub fn evaluate(&self, features: &FeatureVector) -> RuleOutcome {
        if features[Feature::TotalEvents] < f64::from(self.min_events) {
            return RuleOutcome::genuine(true);
        }

        let violations: Vec<RuleViolation> = self
            .rules
            .iter()
            .filter_map(|rule| rule.evaluate(features))
            .collect();

        if violations.is_empty() {
            return RuleOutcome::genuine(false);
        }

        let probability = violations.iter().map(|v| v.severity).mean().clamp(0.0, 1.0);
        let confidence = ConfidenceLevel::from_probability(probability);

        RuleOutcome {
            decision: Decision::from_violations(violations.len(), confidence),
            violations,
            probability,
            confidence,
            skipped: false,
        }
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        let thresholds = RuleThresholds::default();
        Self {
            rules: thresholds.rules(),
            min_events: thresholds.min_events_for_analysis,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::rules::RuleId;

    /// A vector that trips no rule.
    fn clean_vector() -> FeatureVector {
        let mut vector = FeatureVector::neutral(60.0);
        vector.set(Feature::TotalEvents, 200.0);
        vector.set(Feature::MouseCurvature, 0.6);
        vector.set(Feature::KeystrokeEntropy, 0.9);
        vector.set(Feature::MouseEntropy, 0.7);
        vector.set(Feature::InputDiversityScore, 0.85);
        vector
    }

    #[test]
    fn test_zero_violations_is_genuine() {
        let outcome = RuleEngine::default().evaluate(&clean_vector());
        assert_eq!(outcome.decision, Decision::Genuine);
        assert_eq!(outcome.probability, 0.0);
        assert!(outcome.violations.is_empty());
        assert!(!outcome.skipped);
    }

    #[test]
    fn test_one_violation_is_suspicious() {
        let mut vector = clean_vector();
        vector.set(Feature::RepeatKeyRatio, 0.9);

        let outcome = RuleEngine::default().evaluate(&vector);
        assert_eq!(outcome.decision, Decision::Suspicious);
        assert!((outcome.probability - 0.9).abs() < 1e-9);
        assert_eq!(outcome.reasons(), vec!["Excessive key repetition (0.90)"]);
    }

    #[test]
    fn test_two_violations_is_fake_with_mean_probability() {
        let mut vector = clean_vector();
        vector.set(Feature::RepeatKeyRatio, 0.9);
        vector.set(Feature::PeriodicBehaviorScore, 0.85);

        let outcome = RuleEngine::default().evaluate(&vector);
        assert!((outcome.probability - 0.875).abs() < 1e-9);
        assert_eq!(outcome.confidence, ConfidenceLevel::High);
        assert_eq!(outcome.decision, Decision::FakeHigh);
    }

    #[test]
    fn test_three_violations_use_mean_severity() {
        let mut thresholds = RuleThresholds::default();
        thresholds.max_shortcut_abuse = 0.0;
        let mut vector = clean_vector();
        vector.set(Feature::MouseCurvature, 0.04);
        vector.set(Feature::ShortcutAbuseScore, 0.05);
        vector.set(Feature::InputDiversityScore, 0.39);

        let outcome = RuleEngine::new(&thresholds).unwrap().evaluate(&vector);
        let ids: Vec<RuleId> = outcome.violations.iter().map(|v| v.rule).collect();
        assert_eq!(
            ids,
            vec![
                RuleId::LinearMouseMovement,
                RuleId::ShortcutAbuse,
                RuleId::LowInputDiversity
            ]
        );
        // (0.96 + 0.05 + 0.61) / 3 = 0.54
        assert!((outcome.probability - 0.54).abs() < 1e-9);
        assert_eq!(outcome.decision, Decision::FakeMedium);
    }

    #[test]
    fn test_low_mean_severity_gives_fake_low() {
        let mut thresholds = RuleThresholds::default();
        thresholds.max_shortcut_abuse = 0.0;
        thresholds.max_mouse_jitter = 0.0;
        let mut vector = clean_vector();
        vector.set(Feature::ShortcutAbuseScore, 0.1);
        vector.set(Feature::MouseJitterScore, 0.2);

        let outcome = RuleEngine::new(&thresholds).unwrap().evaluate(&vector);
        assert_eq!(outcome.violations.len(), 2);
        assert_eq!(outcome.confidence, ConfidenceLevel::Low);
        assert_eq!(outcome.decision, Decision::FakeLow);
    }

    #[test]
    fn test_sparse_window_is_not_judged() {
        // An empty window would trip the entropy and diversity rules
        let mut vector = FeatureVector::neutral(60.0);
        vector.set(Feature::TotalEvents, 4.0);

        let outcome = RuleEngine::default().evaluate(&vector);
        assert!(outcome.skipped);
        assert_eq!(outcome.decision, Decision::Genuine);

        vector.set(Feature::TotalEvents, 5.0);
        let outcome = RuleEngine::default().evaluate(&vector);
        assert!(!outcome.skipped);
        assert!(outcome.decision.is_fake());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let thresholds = RuleThresholds {
            max_periodic_behavior: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            RuleEngine::new(&thresholds),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }
}
