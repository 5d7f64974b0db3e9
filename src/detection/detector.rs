//! Snapshot-to-report detection.
//!
//! The detector ties the pieces together for one tick: extract features,
//! run the rules, optionally consult a scorer and stamp a [`DecisionReport`].

use crate::config::{Config, ConfigError};
use crate::core::features::{compute_features, FeatureExtraction, FeatureVector};
use crate::core::stats::unit;
use crate::core::windowing::EventSnapshot;
use crate::detection::engine::RuleEngine;
use crate::detection::report::{ConfidenceLevel, Decision, DecisionReport, DegradedMarker, Verdict};
use crate::detection::rules::RuleThresholds;
use crate::detection::scorer::{Scorer, ScoringPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

/// Final probability at which a contributing scorer escalates to FAKE.
pub const SCORER_FAKE_PROBABILITY: f64 = 0.5;

/// Final probability at which a contributing scorer escalates to SUSPICIOUS.
pub const SCORER_SUSPICIOUS_PROBABILITY: f64 = 0.3;

pub struct Detector {
    engine: RuleEngine,
    policy: ScoringPolicy,
    scorer: Option<Arc<dyn Scorer>>,
    subject_id: String,
}

impl Detector {
    pub fn new(
        subject_id: impl Into<String>,
        thresholds: &RuleThresholds,
        policy: ScoringPolicy,
    ) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            engine: RuleEngine::new(thresholds)?,
            policy,
            scorer: None,
            subject_id: subject_id.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.subject_id.clone(), &config.rules, config.scoring)
    }

    /// Attach an external scorer. It is only consulted when the policy is not
    /// [`ScoringPolicy::RulesOnly`].
    pub fn with_scorer(mut self, scorer: Arc<dyn Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn policy(&self) -> ScoringPolicy {
        self.policy
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    /// Extract features from a snapshot and judge them.
    pub fn analyze(&self, snapshot: &EventSnapshot) -> DecisionReport {
        let extraction = compute_features(snapshot);
        self.report(snapshot, extraction)
    }

    /// Judge an already computed extraction of `snapshot`.
    pub fn report(&self, snapshot: &EventSnapshot, extraction: FeatureExtraction) -> DecisionReport {
        let mut degraded: Vec<DegradedMarker> = snapshot
            .degraded_sources
            .iter()
            .map(|d| DegradedMarker::Capture {
                source: d.source,
                reason: d.reason.clone(),
            })
            .collect();
        degraded.extend(extraction.failures.iter().map(|f| DegradedMarker::Extractor {
            extractor: f.extractor,
            reason: f.reason.clone(),
        }));

        let verdict = self.judge(&extraction.vector, &mut degraded);
        debug!(
            decision = %verdict.decision,
            probability = verdict.probability,
            violations = verdict.violations.len(),
            "window judged"
        );

        DecisionReport::new(
            self.subject_id.clone(),
            snapshot.end,
            snapshot.duration_secs(),
            verdict,
            extraction.vector,
            degraded,
        )
    }

    /// Run the rules and, when the policy asks for it, the scorer.
    ///
    /// Scorer problems are pushed onto `degraded` and the rule verdict stands.
    pub fn judge(&self, features: &FeatureVector, degraded: &mut Vec<DegradedMarker>) -> Verdict {
        let outcome = self.engine.evaluate(features);
        let rule_verdict = Verdict {
            decision: outcome.decision,
            probability: outcome.probability,
            confidence: outcome.confidence,
            reasons: outcome.reasons(),
            violations: outcome.violations.clone(),
            scorer_probability: None,
        };

        if outcome.skipped || !self.policy.uses_scorer() {
            return rule_verdict;
        }
        let Some(scorer) = &self.scorer else {
            return rule_verdict;
        };

        let score = match scorer.score(features) {
            Ok(score) if score.is_finite() => unit(score),
            Ok(score) => {
                warn!(scorer = scorer.name(), score, "scorer returned a non-finite probability");
                degraded.push(DegradedMarker::Scorer {
                    name: scorer.name().to_string(),
                    reason: format!("non-finite probability {score}"),
                });
                return rule_verdict;
            }
            Err(e) => {
                warn!(scorer = scorer.name(), error = %e, "scorer failed, using rules only");
                degraded.push(DegradedMarker::Scorer {
                    name: scorer.name().to_string(),
                    reason: e.to_string(),
                });
                return rule_verdict;
            }
        };

        let probability = unit(self.policy.combine(outcome.probability, score));
        let confidence = ConfidenceLevel::from_probability(probability);
        let from_rules = Decision::from_violations(outcome.violations.len(), confidence);
        let from_scorer = if probability >= SCORER_FAKE_PROBABILITY {
            Decision::fake(confidence)
        } else if probability >= SCORER_SUSPICIOUS_PROBABILITY {
            Decision::Suspicious
        } else {
            Decision::Genuine
        };

        let mut reasons = rule_verdict.reasons;
        if from_scorer > from_rules {
            reasons.push(format!("Scorer {} ({score:.2})", scorer.name()));
        }

        Verdict {
            decision: from_rules.max(from_scorer),
            probability,
            confidence,
            reasons,
            violations: rule_verdict.violations,
            scorer_probability: Some(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::Feature;
    use crate::detection::scorer::{FnScorer, ScorerError};

    fn clean_vector() -> FeatureVector {
        let mut vector = FeatureVector::neutral(60.0);
        vector.set(Feature::TotalEvents, 300.0);
        vector.set(Feature::MouseCurvature, 0.6);
        vector.set(Feature::KeystrokeEntropy, 0.9);
        vector.set(Feature::MouseEntropy, 0.7);
        vector.set(Feature::InputDiversityScore, 0.85);
        vector
    }

    fn detector(policy: ScoringPolicy, score: Result<f64, ScorerError>) -> Detector {
        Detector::new("test", &RuleThresholds::default(), policy)
            .unwrap()
            .with_scorer(Arc::new(FnScorer::new("fixed", move |_: &FeatureVector| {
                score.clone()
            })))
    }

    #[test]
    fn test_rules_only_ignores_scorer() {
        let detector = detector(ScoringPolicy::RulesOnly, Ok(0.99));
        let mut degraded = Vec::new();
        let verdict = detector.judge(&clean_vector(), &mut degraded);
        assert_eq!(verdict.decision, Decision::Genuine);
        assert_eq!(verdict.scorer_probability, None);
        assert!(degraded.is_empty());
    }

    #[test]
    fn test_substitute_escalates_to_fake() {
        let detector = detector(ScoringPolicy::Substitute, Ok(0.85));
        let mut degraded = Vec::new();
        let verdict = detector.judge(&clean_vector(), &mut degraded);
        assert_eq!(verdict.decision, Decision::FakeHigh);
        assert_eq!(verdict.probability, 0.85);
        assert_eq!(verdict.scorer_probability, Some(0.85));
        assert_eq!(verdict.reasons, vec!["Scorer fixed (0.85)"]);
    }

    #[test]
    fn test_blend_escalates_to_suspicious() {
        let detector = detector(ScoringPolicy::Blend { scorer_weight: 0.5 }, Ok(0.7));
        let mut degraded = Vec::new();
        // Rules see nothing, blend gives 0.35
        let verdict = detector.judge(&clean_vector(), &mut degraded);
        assert_eq!(verdict.decision, Decision::Suspicious);
        assert!((verdict.probability - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_scorer_never_deescalates() {
        let detector = detector(ScoringPolicy::Blend { scorer_weight: 0.5 }, Ok(0.0));
        let mut vector = clean_vector();
        vector.set(Feature::RepeatKeyRatio, 0.9);
        vector.set(Feature::PeriodicBehaviorScore, 0.9);

        let verdict = detector.judge(&vector, &mut Vec::new());
        // Two violations keep it FAKE; the tier follows the blended 0.45
        assert_eq!(verdict.decision, Decision::FakeLow);
        assert_eq!(verdict.reasons.len(), 2);
    }

    #[test]
    fn test_scorer_error_falls_back_to_rules() {
        let detector = detector(
            ScoringPolicy::Substitute,
            Err(ScorerError::Unavailable("model not loaded".to_string())),
        );
        let mut degraded = Vec::new();
        let verdict = detector.judge(&clean_vector(), &mut degraded);
        assert_eq!(verdict.decision, Decision::Genuine);
        assert_eq!(verdict.scorer_probability, None);
        assert_eq!(degraded.len(), 1);
        assert!(matches!(&degraded[0], DegradedMarker::Scorer { name, .. } if name == "fixed"));
    }

    #[test]
    fn test_non_finite_score_is_absent() {
        let detector = detector(ScoringPolicy::Substitute, Ok(f64::NAN));
        let mut degraded = Vec::new();
        let verdict = detector.judge(&clean_vector(), &mut degraded);
        assert_eq!(verdict.decision, Decision::Genuine);
        assert_eq!(degraded.len(), 1);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let result = Detector::new(
            "test",
            &RuleThresholds::default(),
            ScoringPolicy::Blend { scorer_weight: -1.0 },
        );
        assert!(matches!(result, Err(ConfigError::InvalidScorerWeight(_))));
    }

    #[test]
    fn test_report_carries_degraded_capture() {
        use crate::collector::types::EventSource;
        use crate::core::windowing::DegradedSource;
        use chrono::{Duration, Utc};

        let mut snapshot = EventSnapshot::new(Utc::now(), Duration::seconds(60));
        snapshot.degraded_sources.push(DegradedSource {
            source: EventSource::Pointer,
            reason: "permission denied".to_string(),
        });

        let detector = Detector::new("subject", &RuleThresholds::default(), ScoringPolicy::RulesOnly)
            .unwrap();
        let report = detector.analyze(&snapshot);
        assert_eq!(report.decision(), Decision::Genuine);
        assert_eq!(report.subject_id(), "subject");
        assert_eq!(report.window_seconds(), 60.0);
        assert_eq!(
            report.degraded(),
            &[DegradedMarker::Capture {
                source: EventSource::Pointer,
                reason: "permission denied".to_string()
            }]
        );
    }
}
