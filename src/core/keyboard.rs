//! Keyboard feature extraction.
//!
//! Only key presses drive the statistics; releases are used to track which
//! modifiers are held when detecting shortcut combinations.

use crate::collector::types::{KeyId, KeyboardEvent};
use crate::core::stats::{coefficient_of_variation, gaps_secs, mean, normalized_entropy, std_dev, unit};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Keys that form an editing shortcut when pressed with a control modifier
/// (select all, copy, paste, cut, undo).
const CTRL_SHORTCUT_KEYS: [&str; 5] = ["a", "c", "v", "x", "z"];

/// Key that forms an app-switch shortcut with an alt modifier.
const ALT_SHORTCUT_KEY: &str = "tab";

/// Coefficient of variation at which typing counts as fully "bursty".
const BURST_CV_SCALE: f64 = 0.8;

/// Keyboard-derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardFeatures {
    /// Key presses per minute
    pub keys_per_minute: f64,
    /// Distinct keys / presses
    pub unique_key_ratio: f64,
    /// Most frequent key count / presses
    pub repeat_key_ratio: f64,
    /// Longest run of the same key pressed back to back
    pub max_consecutive_repeats: u32,
    /// Mean seconds between presses
    pub avg_inter_key_delay: f64,
    /// Standard deviation of seconds between presses
    pub std_inter_key_delay: f64,
    /// Normalized entropy of pressed keys
    pub keystroke_entropy: f64,
    /// Shortcut combinations / presses
    pub shortcut_abuse_score: f64,
    /// Timing irregularity (0.5 when there is too little data)
    pub burst_typing_score: f64,
}

impl KeyboardFeatures {
    /// Values for a window without usable keyboard data.
    pub fn neutral() -> Self {
        Self {
            keys_per_minute: 0.0,
            unique_key_ratio: 0.0,
            repeat_key_ratio: 0.0,
            max_consecutive_repeats: 0,
            avg_inter_key_delay: 0.0,
            std_inter_key_delay: 0.0,
            keystroke_entropy: 0.0,
            shortcut_abuse_score: 0.0,
            burst_typing_score: 0.5,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.keys_per_minute,
            self.unique_key_ratio,
            self.repeat_key_ratio,
            self.avg_inter_key_delay,
            self.std_inter_key_delay,
            self.keystroke_entropy,
            self.shortcut_abuse_score,
            self.burst_typing_score,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl Default for KeyboardFeatures {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Compute keyboard features from time-ordered events.
pub fn compute_keyboard_features(events: &[KeyboardEvent], window_secs: f64) -> KeyboardFeatures {
    let presses: Vec<&KeyboardEvent> = events.iter().filter(|e| e.is_press()).collect();
    if presses.is_empty() || window_secs <= 0.0 {
        return KeyboardFeatures::neutral();
    }

    let press_count = presses.len() as f64;
    let keys: Vec<&KeyId> = presses.iter().map(|e| &e.key).collect();

    let mut key_counts: HashMap<&KeyId, usize> = HashMap::new();
    for key in &keys {
        *key_counts.entry(*key).or_insert(0) += 1;
    }
    let most_frequent = key_counts.values().copied().max().unwrap_or(0);

    let timestamps: Vec<_> = presses.iter().map(|e| e.timestamp).collect();
    let delays = gaps_secs(&timestamps);

    KeyboardFeatures {
        keys_per_minute: press_count / (window_secs / 60.0),
        unique_key_ratio: key_counts.len() as f64 / press_count,
        repeat_key_ratio: most_frequent as f64 / press_count,
        max_consecutive_repeats: max_consecutive_repeats(&keys),
        avg_inter_key_delay: mean(&delays),
        std_inter_key_delay: std_dev(&delays),
        keystroke_entropy: normalized_entropy(keys.iter().copied()),
        shortcut_abuse_score: unit(count_shortcuts(events) as f64 / press_count),
        burst_typing_score: burst_score(&delays),
    }
}

fn max_consecutive_repeats(keys: &[&KeyId]) -> u32 {
    if keys.is_empty() {
        return 0;
    }

    let mut max_run = 1u32;
    let mut run = 1u32;
    for pair in keys.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            max_run = max_run.max(run);
        } else {
            run = 1;
        }
    }
    max_run
}

/// Count ctrl+{a,c,v,x,z} and alt+tab presses, tracking held modifiers.
fn count_shortcuts(events: &[KeyboardEvent]) -> usize {
    let mut held_ctrl: HashSet<&KeyId> = HashSet::new();
    let mut held_alt: HashSet<&KeyId> = HashSet::new();
    let mut count = 0;

    for event in events {
        let key = &event.key;
        if key.is_ctrl() || key.is_alt() {
            let held = if key.is_ctrl() {
                &mut held_ctrl
            } else {
                &mut held_alt
            };
            if event.is_press() {
                held.insert(key);
            } else {
                held.remove(key);
            }
            continue;
        }

        if !event.is_press() {
            continue;
        }

        let name = key.as_str();
        if (!held_ctrl.is_empty() && CTRL_SHORTCUT_KEYS.contains(&name))
            || (!held_alt.is_empty() && name == ALT_SHORTCUT_KEY)
        {
            count += 1;
        }
    }

    count
}

/// Natural typing alternates bursts and pauses; scripted typing is uniform.
fn burst_score(delays: &[f64]) -> f64 {
    if delays.len() < 3 {
        return 0.5;
    }
    if mean(delays) == 0.0 {
        return 0.0;
    }
    (coefficient_of_variation(delays) / BURST_CV_SCALE).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::KeyAction;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn press(key: &str, offset_ms: i64) -> KeyboardEvent {
        KeyboardEvent::at(base() + Duration::milliseconds(offset_ms), key, KeyAction::Press)
    }

    fn release(key: &str, offset_ms: i64) -> KeyboardEvent {
        KeyboardEvent::at(base() + Duration::milliseconds(offset_ms), key, KeyAction::Release)
    }

    #[test]
    fn test_keyboard_features_empty() {
        let features = compute_keyboard_features(&[], 60.0);
        assert_eq!(features, KeyboardFeatures::neutral());
        assert_eq!(features.keys_per_minute, 0.0);
        assert_eq!(features.keystroke_entropy, 0.0);
    }

    #[test]
    fn test_keyboard_features_basic() {
        let events = vec![
            press("a", 0),
            release("a", 50),
            press("b", 100),
            release("b", 150),
            press("a", 200),
            release("a", 250),
            press("a", 300),
        ];

        let features = compute_keyboard_features(&events, 60.0);
        assert_eq!(features.keys_per_minute, 4.0);
        assert_eq!(features.repeat_key_ratio, 0.75);
        assert_eq!(features.unique_key_ratio, 0.5);
        assert_eq!(features.max_consecutive_repeats, 2);
        assert!((features.avg_inter_key_delay - 0.1).abs() < 1e-9);
        assert!(features.std_inter_key_delay < 1e-9);
        // Uniform timing is the opposite of bursty
        assert!(features.burst_typing_score < 1e-6);
    }

    #[test]
    fn test_shortcut_combinations_counted() {
        let events = vec![
            press("ctrl_l", 0),
            press("c", 10),
            release("c", 20),
            press("v", 30),
            release("ctrl_l", 40),
            press("v", 50),
            press("alt_l", 60),
            press("tab", 70),
        ];

        let features = compute_keyboard_features(&events, 60.0);
        // ctrl+c, ctrl+v, alt+tab over 6 presses
        assert!((features.shortcut_abuse_score - 3.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_typing_has_no_shortcuts() {
        let events: Vec<_> = ["h", "e", "l", "l", "o"]
            .iter()
            .enumerate()
            .map(|(i, k)| press(k, i as i64 * 120))
            .collect();
        let features = compute_keyboard_features(&events, 60.0);
        assert_eq!(features.shortcut_abuse_score, 0.0);
        assert_eq!(features.max_consecutive_repeats, 2);
        assert!(features.keystroke_entropy > 0.9);
    }

    #[test]
    fn test_burst_score_neutral_with_few_delays() {
        let events = vec![press("a", 0), press("b", 100), press("c", 400)];
        let features = compute_keyboard_features(&events, 60.0);
        assert_eq!(features.burst_typing_score, 0.5);
    }
}
