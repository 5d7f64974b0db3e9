//! External scorer boundary.
//!
//! A scorer is any model that maps a feature vector to a probability of
//! automated activity. The detector treats it as optional: errors and
//! non-finite outputs fall back to the rules alone.

use crate::config::ConfigError;
use crate::core::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Errors a scorer may return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScorerError {
    #[error("scorer unavailable: {0}")]
    Unavailable(String),
    #[error("scoring failed: {0}")]
    Failed(String),
}

/// A probability model over feature vectors.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    /// Probability in [0, 1] that the window is automated.
    fn score(&self, features: &FeatureVector) -> Result<f64, ScorerError>;
}

/// Adapts a closure into a [`Scorer`].
pub struct FnScorer<F> {
    name: String,
    score_fn: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&FeatureVector) -> Result<f64, ScorerError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, score_fn: F) -> Self {
        Self {
            name: name.into(),
            score_fn,
        }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&FeatureVector) -> Result<f64, ScorerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &FeatureVector) -> Result<f64, ScorerError> {
        (self.score_fn)(features)
    }
}

/// How a scorer probability combines with the rule probability.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// Ignore any scorer
    #[default]
    RulesOnly,
    /// `(1 - w) * rules + w * scorer`
    Blend { scorer_weight: f64 },
    /// Use the scorer probability instead of the rule probability
    Substitute,
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let ScoringPolicy::Blend { scorer_weight } = *self {
            if !scorer_weight.is_finite() || !(0.0..=1.0).contains(&scorer_weight) {
                return Err(ConfigError::InvalidScorerWeight(scorer_weight));
            }
        }
        Ok(())
    }

    pub fn uses_scorer(&self) -> bool {
        !matches!(self, ScoringPolicy::RulesOnly)
    }

    /// Combine a rule probability with a scorer probability.
    pub fn combine(&self, rule_probability: f64, scorer_probability: f64) -> f64 {
        match *self {
            ScoringPolicy::RulesOnly => rule_probability,
            ScoringPolicy::Blend { scorer_weight } => {
                (1.0 - scorer_weight) * rule_probability + scorer_weight * scorer_probability
            }
            ScoringPolicy::Substitute => scorer_probability,
        }
    }
}
