//! Feature aggregation.
//!
//! The three extractors each produce a partial; this module merges them into
//! one fixed-schema [`FeatureVector`]. The schema is the [`Feature`] enum: its
//! order is the canonical order and every feature is always present.

use crate::core::keyboard::{compute_keyboard_features, KeyboardFeatures};
use crate::core::pointer::{compute_pointer_features, PointerFeatures};
use crate::core::temporal::{compute_temporal_features, TemporalFeatures};
use crate::core::windowing::EventSnapshot;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use std::str::FromStr;
use tracing::warn;

/// Version of the feature schema. Bump when features are added, removed or
/// reordered.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// One named feature of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    // Keyboard
    KeysPerMinute,
    UniqueKeyRatio,
    RepeatKeyRatio,
    MaxConsecutiveRepeats,
    AvgInterKeyDelay,
    StdInterKeyDelay,
    KeystrokeEntropy,
    ShortcutAbuseScore,
    BurstTypingScore,
    // Pointer
    MouseDistance,
    MouseVelocityAvg,
    MouseVelocityStd,
    MouseAccelerationAvg,
    MouseAccelerationStd,
    MouseCurvatureRatio,
    MouseCurvature,
    MouseJitterScore,
    MouseEntropy,
    ClickFrequency,
    MouseIdleRatio,
    // Temporal, context and combined
    IdleSeconds,
    ActiveSeconds,
    ActivitySpikeScore,
    PeriodicBehaviorScore,
    TimeSinceLastActivity,
    WindowSwitchCount,
    ActiveAppDuration,
    UniqueAppsCount,
    InputDiversityScore,
    OverallEntropyScore,
    TotalEvents,
}

impl Feature {
    pub const COUNT: usize = 31;

    /// Every feature in canonical order.
    pub const ALL: [Feature; Feature::COUNT] = [
        Feature::KeysPerMinute,
        Feature::UniqueKeyRatio,
        Feature::RepeatKeyRatio,
        Feature::MaxConsecutiveRepeats,
        Feature::AvgInterKeyDelay,
        Feature::StdInterKeyDelay,
        Feature::KeystrokeEntropy,
        Feature::ShortcutAbuseScore,
        Feature::BurstTypingScore,
        Feature::MouseDistance,
        Feature::MouseVelocityAvg,
        Feature::MouseVelocityStd,
        Feature::MouseAccelerationAvg,
        Feature::MouseAccelerationStd,
        Feature::MouseCurvatureRatio,
        Feature::MouseCurvature,
        Feature::MouseJitterScore,
        Feature::MouseEntropy,
        Feature::ClickFrequency,
        Feature::MouseIdleRatio,
        Feature::IdleSeconds,
        Feature::ActiveSeconds,
        Feature::ActivitySpikeScore,
        Feature::PeriodicBehaviorScore,
        Feature::TimeSinceLastActivity,
        Feature::WindowSwitchCount,
        Feature::ActiveAppDuration,
        Feature::UniqueAppsCount,
        Feature::InputDiversityScore,
        Feature::OverallEntropyScore,
        Feature::TotalEvents,
    ];

    /// Position in the canonical order.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Feature::KeysPerMinute => "keys_per_minute",
            Feature::UniqueKeyRatio => "unique_key_ratio",
            Feature::RepeatKeyRatio => "repeat_key_ratio",
            Feature::MaxConsecutiveRepeats => "max_consecutive_repeats",
            Feature::AvgInterKeyDelay => "avg_inter_key_delay",
            Feature::StdInterKeyDelay => "std_inter_key_delay",
            Feature::KeystrokeEntropy => "keystroke_entropy",
            Feature::ShortcutAbuseScore => "shortcut_abuse_score",
            Feature::BurstTypingScore => "burst_typing_score",
            Feature::MouseDistance => "mouse_distance",
            Feature::MouseVelocityAvg => "mouse_velocity_avg",
            Feature::MouseVelocityStd => "mouse_velocity_std",
            Feature::MouseAccelerationAvg => "mouse_acceleration_avg",
            Feature::MouseAccelerationStd => "mouse_acceleration_std",
            Feature::MouseCurvatureRatio => "mouse_curvature_ratio",
            Feature::MouseCurvature => "mouse_curvature",
            Feature::MouseJitterScore => "mouse_jitter_score",
            Feature::MouseEntropy => "mouse_entropy",
            Feature::ClickFrequency => "click_frequency",
            Feature::MouseIdleRatio => "mouse_idle_ratio",
            Feature::IdleSeconds => "idle_seconds",
            Feature::ActiveSeconds => "active_seconds",
            Feature::ActivitySpikeScore => "activity_spike_score",
            Feature::PeriodicBehaviorScore => "periodic_behavior_score",
            Feature::TimeSinceLastActivity => "time_since_last_activity",
            Feature::WindowSwitchCount => "window_switch_count",
            Feature::ActiveAppDuration => "active_app_duration",
            Feature::UniqueAppsCount => "unique_apps_count",
            Feature::InputDiversityScore => "input_diversity_score",
            Feature::OverallEntropyScore => "overall_entropy_score",
            Feature::TotalEvents => "total_events",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// Fixed-schema feature values, indexed by [`Feature`].
///
/// Serializes as a map in canonical order; deserializing requires every key
/// of the schema and rejects unknown ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; Feature::COUNT],
}

impl FeatureVector {
    /// Build a vector from the three extractor partials.
    pub fn from_parts(
        keyboard: &KeyboardFeatures,
        pointer: &PointerFeatures,
        temporal: &TemporalFeatures,
    ) -> Self {
        let mut vector = Self {
            values: [0.0; Feature::COUNT],
        };

        vector.set(Feature::KeysPerMinute, keyboard.keys_per_minute);
        vector.set(Feature::UniqueKeyRatio, keyboard.unique_key_ratio);
        vector.set(Feature::RepeatKeyRatio, keyboard.repeat_key_ratio);
        vector.set(
            Feature::MaxConsecutiveRepeats,
            f64::from(keyboard.max_consecutive_repeats),
        );
        vector.set(Feature::AvgInterKeyDelay, keyboard.avg_inter_key_delay);
        vector.set(Feature::StdInterKeyDelay, keyboard.std_inter_key_delay);
        vector.set(Feature::KeystrokeEntropy, keyboard.keystroke_entropy);
        vector.set(Feature::ShortcutAbuseScore, keyboard.shortcut_abuse_score);
        vector.set(Feature::BurstTypingScore, keyboard.burst_typing_score);

        vector.set(Feature::MouseDistance, pointer.mouse_distance);
        vector.set(Feature::MouseVelocityAvg, pointer.mouse_velocity_avg);
        vector.set(Feature::MouseVelocityStd, pointer.mouse_velocity_std);
        vector.set(Feature::MouseAccelerationAvg, pointer.mouse_acceleration_avg);
        vector.set(Feature::MouseAccelerationStd, pointer.mouse_acceleration_std);
        vector.set(Feature::MouseCurvatureRatio, pointer.mouse_curvature_ratio);
        vector.set(Feature::MouseCurvature, pointer.mouse_curvature);
        vector.set(Feature::MouseJitterScore, pointer.mouse_jitter_score);
        vector.set(Feature::MouseEntropy, pointer.mouse_entropy);
        vector.set(Feature::ClickFrequency, pointer.click_frequency);
        vector.set(Feature::MouseIdleRatio, pointer.mouse_idle_ratio);

        vector.set(Feature::IdleSeconds, temporal.idle_seconds);
        vector.set(Feature::ActiveSeconds, temporal.active_seconds);
        vector.set(Feature::ActivitySpikeScore, temporal.activity_spike_score);
        vector.set(Feature::PeriodicBehaviorScore, temporal.periodic_behavior_score);
        vector.set(Feature::TimeSinceLastActivity, temporal.time_since_last_activity);
        vector.set(
            Feature::WindowSwitchCount,
            f64::from(temporal.window_switch_count),
        );
        vector.set(Feature::ActiveAppDuration, temporal.active_app_duration);
        vector.set(Feature::UniqueAppsCount, f64::from(temporal.unique_apps_count));
        vector.set(Feature::InputDiversityScore, temporal.input_diversity_score);
        vector.set(Feature::OverallEntropyScore, temporal.overall_entropy_score);
        vector.set(Feature::TotalEvents, f64::from(temporal.total_events));

        vector
    }

    /// The vector of an empty window of `window_secs` seconds.
    pub fn neutral(window_secs: f64) -> Self {
        Self::from_parts(
            &KeyboardFeatures::neutral(),
            &PointerFeatures::neutral(),
            &TemporalFeatures::neutral(window_secs),
        )
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.values[feature.index()] = value;
    }

    /// Values in canonical order.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// `(feature, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        Feature::ALL.iter().map(move |&f| (f, self.get(f)))
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Feature::COUNT))?;
        for (feature, value) in self.iter() {
            map.serialize_entry(feature.name(), &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, f64>::deserialize(deserializer)?;

        if let Some(unknown) = raw.keys().find(|k| k.parse::<Feature>().is_err()) {
            return Err(D::Error::custom(format!("unknown feature `{unknown}`")));
        }

        let mut values = [0.0; Feature::COUNT];
        for feature in Feature::ALL {
            values[feature.index()] = *raw
                .get(feature.name())
                .ok_or_else(|| D::Error::missing_field(feature.name()))?;
        }
        Ok(Self { values })
    }
}

/// The extractor that produced a partial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extractor {
    Keyboard,
    Pointer,
    Temporal,
}

impl fmt::Display for Extractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Extractor::Keyboard => "keyboard",
            Extractor::Pointer => "pointer",
            Extractor::Temporal => "temporal",
        })
    }
}

/// An extractor whose output was replaced by its neutral partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorFailure {
    pub extractor: Extractor,
    pub reason: String,
}

/// Result of one aggregation: the vector plus any substituted extractors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureExtraction {
    pub vector: FeatureVector,
    pub failures: Vec<ExtractorFailure>,
}

impl FeatureExtraction {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Run all extractors over a snapshot and aggregate their output.
pub fn compute_features(snapshot: &EventSnapshot) -> FeatureExtraction {
    let window_secs = snapshot.duration_secs();
    let keyboard = compute_keyboard_features(&snapshot.keyboard_events, window_secs);
    let pointer = compute_pointer_features(&snapshot.pointer_events, window_secs);
    let temporal = compute_temporal_features(snapshot);

    aggregate(keyboard, pointer, temporal, window_secs)
}

/// Merge extractor partials, replacing any partial with non-finite values by
/// that extractor's neutral values.
pub fn aggregate(
    keyboard: KeyboardFeatures,
    pointer: PointerFeatures,
    temporal: TemporalFeatures,
    window_secs: f64,
) -> FeatureExtraction {
    let mut failures = Vec::new();

    let keyboard = checked(keyboard.is_finite(), keyboard, Extractor::Keyboard, &mut failures)
        .unwrap_or_else(KeyboardFeatures::neutral);
    let pointer = checked(pointer.is_finite(), pointer, Extractor::Pointer, &mut failures)
        .unwrap_or_else(PointerFeatures::neutral);
    let temporal = checked(temporal.is_finite(), temporal, Extractor::Temporal, &mut failures)
        .unwrap_or_else(|| TemporalFeatures::neutral(window_secs));

    FeatureExtraction {
        vector: FeatureVector::from_parts(&keyboard, &pointer, &temporal),
        failures,
    }
}

fn checked<T>(
    finite: bool,
    partial: T,
    extractor: Extractor,
    failures: &mut Vec<ExtractorFailure>,
) -> Option<T> {
    if finite {
        return Some(partial);
    }
    warn!(%extractor, "extractor produced non-finite values, using neutral partial");
    failures.push(ExtractorFailure {
        extractor,
        reason: "non-finite output".to_string(),
    });
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::{KeyAction, KeyboardEvent, PointerEvent, WindowEvent};
    use chrono::{DateTime, Duration, Utc};

    fn end() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:01:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn mixed_snapshot() -> EventSnapshot {
        let start = end() - Duration::seconds(60);
        let keys = (0..40)
            .map(|i| {
                KeyboardEvent::at(
                    start + Duration::milliseconds(i * 700),
                    ["q", "w", "e", "r"][i as usize % 4],
                    KeyAction::Press,
                )
            })
            .collect();
        let moves = (0..30)
            .map(|i| {
                PointerEvent::movement_at(
                    start + Duration::milliseconds(30_000 + i * 50),
                    i as f64 * 8.0,
                    (i as f64 * 0.3).sin() * 40.0,
                )
            })
            .collect();
        let windows = vec![WindowEvent::at(start, "Editor", "notes.txt")];
        EventSnapshot::from_events(end(), Duration::seconds(60), keys, moves, windows)
    }

    #[test]
    fn test_schema_order_and_names() {
        assert_eq!(Feature::ALL.len(), Feature::COUNT);
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(feature.name().parse::<Feature>(), Ok(*feature));
        }
        assert!("keystroke_entropy_v2".parse::<Feature>().is_err());
    }

    #[test]
    fn test_serde_names_match_schema() {
        for feature in Feature::ALL {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature.name()));
        }
    }

    #[test]
    fn test_every_feature_present_and_finite() {
        for snapshot in [
            mixed_snapshot(),
            EventSnapshot::new(end(), Duration::seconds(60)),
        ] {
            let extraction = compute_features(&snapshot);
            assert!(extraction.failures.is_empty());

            let json = serde_json::to_value(extraction.vector).unwrap();
            let map = json.as_object().unwrap();
            assert_eq!(map.len(), Feature::COUNT);
            for feature in Feature::ALL {
                let value = map[feature.name()].as_f64().unwrap();
                assert!(value.is_finite(), "{feature} = {value}");
            }
        }
    }

    #[test]
    fn test_empty_window_sentinels() {
        let vector = compute_features(&EventSnapshot::new(end(), Duration::seconds(60))).vector;
        assert_eq!(vector, FeatureVector::neutral(60.0));
        assert_eq!(vector[Feature::MouseCurvatureRatio], 1.0);
        assert_eq!(vector[Feature::MouseCurvature], 0.5);
        assert_eq!(vector[Feature::BurstTypingScore], 0.5);
        assert_eq!(vector[Feature::MouseIdleRatio], 1.0);
        assert_eq!(vector[Feature::IdleSeconds], 60.0);
        assert_eq!(vector[Feature::TimeSinceLastActivity], 60.0);
        assert_eq!(vector[Feature::ActiveAppDuration], 60.0);
        assert_eq!(vector[Feature::TotalEvents], 0.0);
        assert_eq!(vector[Feature::KeystrokeEntropy], 0.0);
    }

    #[test]
    fn test_serialized_map_is_in_canonical_order() {
        let json = serde_json::to_string(&FeatureVector::neutral(60.0)).unwrap();
        let mut last = 0;
        for feature in Feature::ALL {
            let position = json.find(&format!("\"{}\"", feature.name())).unwrap();
            assert!(position >= last);
            last = position;
        }
    }

    #[test]
    fn test_deserialize_roundtrip_and_missing_key() {
        let vector = compute_features(&mixed_snapshot()).vector;
        let json = serde_json::to_value(vector).unwrap();
        let back: FeatureVector = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, vector);

        let mut partial = json.as_object().unwrap().clone();
        partial.remove("mouse_entropy");
        let err = serde_json::from_value::<FeatureVector>(partial.into()).unwrap_err();
        assert!(err.to_string().contains("mouse_entropy"));
    }

    #[test]
    fn test_non_finite_partial_is_replaced() {
        let mut pointer = PointerFeatures::neutral();
        pointer.mouse_velocity_avg = f64::NAN;
        let mut keyboard = KeyboardFeatures::neutral();
        keyboard.keys_per_minute = 90.0;

        let extraction = aggregate(keyboard, pointer, TemporalFeatures::neutral(60.0), 60.0);
        assert!(extraction.is_degraded());
        assert_eq!(extraction.failures.len(), 1);
        assert_eq!(extraction.failures[0].extractor, Extractor::Pointer);
        assert!(extraction.vector.is_finite());
        assert_eq!(extraction.vector[Feature::MouseVelocityAvg], 0.0);
        assert_eq!(extraction.vector[Feature::KeysPerMinute], 90.0);
    }
}
