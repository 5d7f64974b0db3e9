//! Pointer feature extraction.
//!
//! Movement is analysed per *run*: a maximal sequence of move events with no
//! gap longer than [`RUN_GAP_SECS`]. Jumps between runs are not traced paths
//! and never contribute to distance, velocity or curvature.

use crate::collector::types::{PointerEvent, PointerKind};
use crate::core::stats::{mean, normalized_entropy, std_dev, unit};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Longest pause (seconds) between two moves of the same run.
pub const RUN_GAP_SECS: f64 = 1.0;

/// Displacements shorter than this (pixels) count as jitter.
pub const JITTER_THRESHOLD_PX: f64 = 5.0;

/// Minimum within-run displacements before jitter is scored.
const MIN_JITTER_SAMPLES: usize = 10;

/// Runs need a straight-line span of at least this many pixels to be scored
/// for curvature.
const MIN_STRAIGHT_SPAN_PX: f64 = 1.0;

/// Path/straight excess at which movement counts as fully natural.
const CURVATURE_SCALE: f64 = 0.5;

const DIRECTION_BINS: usize = 8;

/// Pointer-derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerFeatures {
    /// Total traced distance in pixels
    pub mouse_distance: f64,
    /// Mean speed in pixels per second
    pub mouse_velocity_avg: f64,
    pub mouse_velocity_std: f64,
    /// Mean absolute speed change between consecutive displacements
    pub mouse_acceleration_avg: f64,
    pub mouse_acceleration_std: f64,
    /// Σpath / Σstraight over qualifying runs (1.0 when none qualify)
    pub mouse_curvature_ratio: f64,
    /// Naturalness in [0, 1] derived from the curvature ratio (0.5 when no
    /// run qualifies)
    pub mouse_curvature: f64,
    /// Fraction of tiny displacements
    pub mouse_jitter_score: f64,
    /// Normalized entropy of movement directions
    pub mouse_entropy: f64,
    /// Clicks per minute
    pub click_frequency: f64,
    /// Share of the window not spanned by movement
    pub mouse_idle_ratio: f64,
}

impl PointerFeatures {
    /// Values for a window without usable pointer data.
    pub fn neutral() -> Self {
        Self {
            mouse_distance: 0.0,
            mouse_velocity_avg: 0.0,
            mouse_velocity_std: 0.0,
            mouse_acceleration_avg: 0.0,
            mouse_acceleration_std: 0.0,
            mouse_curvature_ratio: 1.0,
            mouse_curvature: 0.5,
            mouse_jitter_score: 0.0,
            mouse_entropy: 0.0,
            click_frequency: 0.0,
            mouse_idle_ratio: 1.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.mouse_distance,
            self.mouse_velocity_avg,
            self.mouse_velocity_std,
            self.mouse_acceleration_avg,
            self.mouse_acceleration_std,
            self.mouse_curvature_ratio,
            self.mouse_curvature,
            self.mouse_jitter_score,
            self.mouse_entropy,
            self.click_frequency,
            self.mouse_idle_ratio,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl Default for PointerFeatures {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Compute pointer features from time-ordered events.
pub fn compute_pointer_features(events: &[PointerEvent], window_secs: f64) -> PointerFeatures {
    if events.is_empty() || window_secs <= 0.0 {
        return PointerFeatures::neutral();
    }

    let moves: Vec<&PointerEvent> = events.iter().filter(|e| e.kind == PointerKind::Move).collect();
    let clicks = events.iter().filter(|e| e.kind == PointerKind::Click).count();
    let runs = split_runs(&moves);

    let mut distance = 0.0;
    let mut displacements = Vec::new();
    let mut velocities = Vec::new();
    let mut accelerations = Vec::new();
    let mut directions = Vec::new();
    let mut path_sum = 0.0;
    let mut straight_sum = 0.0;

    for run in &runs {
        let mut run_path = 0.0;
        let mut previous_velocity: Option<f64> = None;

        for pair in run.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let step = a.distance_to(b);
            run_path += step;
            displacements.push(step);

            if step > 0.0 {
                directions.push(direction_bin(b.x - a.x, b.y - a.y));
            }

            let dt = secs_between(a, b);
            if dt > 0.0 {
                let velocity = step / dt;
                if let Some(prev) = previous_velocity {
                    accelerations.push((velocity - prev).abs());
                }
                velocities.push(velocity);
                previous_velocity = Some(velocity);
            }
        }

        distance += run_path;

        if run.len() >= 3 {
            let straight = run[0].distance_to(run[run.len() - 1]);
            if straight >= MIN_STRAIGHT_SPAN_PX {
                path_sum += run_path;
                straight_sum += straight;
            }
        }
    }

    let (curvature_ratio, curvature) = if straight_sum > 0.0 {
        let ratio = path_sum / straight_sum;
        (ratio, unit((ratio - 1.0) / CURVATURE_SCALE))
    } else {
        (1.0, 0.5)
    };

    PointerFeatures {
        mouse_distance: distance,
        mouse_velocity_avg: mean(&velocities),
        mouse_velocity_std: std_dev(&velocities),
        mouse_acceleration_avg: mean(&accelerations),
        mouse_acceleration_std: std_dev(&accelerations),
        mouse_curvature_ratio: curvature_ratio,
        mouse_curvature: curvature,
        mouse_jitter_score: jitter_score(&displacements),
        mouse_entropy: normalized_entropy(directions),
        click_frequency: clicks as f64 / (window_secs / 60.0),
        mouse_idle_ratio: idle_ratio(&moves, window_secs),
    }
}

fn split_runs<'a>(moves: &[&'a PointerEvent]) -> Vec<Vec<&'a PointerEvent>> {
    let mut runs: Vec<Vec<&PointerEvent>> = Vec::new();
    let mut current: Vec<&PointerEvent> = Vec::new();

    for &event in moves {
        if let Some(&last) = current.last() {
            if secs_between(last, event) > RUN_GAP_SECS {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(event);
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn secs_between(a: &PointerEvent, b: &PointerEvent) -> f64 {
    (b.timestamp - a.timestamp)
        .num_microseconds()
        .map(|us| us as f64 / 1e6)
        .unwrap_or(f64::MAX)
}

/// Map a displacement onto one of eight 45° sectors.
fn direction_bin(dx: f64, dy: f64) -> usize {
    let angle = dy.atan2(dx).rem_euclid(2.0 * PI);
    ((angle / (2.0 * PI) * DIRECTION_BINS as f64) as usize).min(DIRECTION_BINS - 1)
}

fn jitter_score(displacements: &[f64]) -> f64 {
    if displacements.len() < MIN_JITTER_SAMPLES {
        return 0.0;
    }
    let small = displacements.iter().filter(|&&d| d < JITTER_THRESHOLD_PX).count();
    small as f64 / displacements.len() as f64
}

fn idle_ratio(moves: &[&PointerEvent], window_secs: f64) -> f64 {
    match (moves.first(), moves.last()) {
        (Some(first), Some(last)) if moves.len() >= 2 => {
            let active = secs_between(first, last);
            unit((window_secs - active) / window_secs)
        }
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::PointerButton;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn move_at(offset_ms: i64, x: f64, y: f64) -> PointerEvent {
        PointerEvent::movement_at(base() + Duration::milliseconds(offset_ms), x, y)
    }

    #[test]
    fn test_pointer_features_empty() {
        let features = compute_pointer_features(&[], 60.0);
        assert_eq!(features, PointerFeatures::neutral());
        assert_eq!(features.mouse_curvature_ratio, 1.0);
        assert_eq!(features.mouse_idle_ratio, 1.0);
    }

    #[test]
    fn test_straight_line_has_unit_ratio() {
        let events: Vec<_> = (0..20).map(|i| move_at(i * 20, i as f64 * 10.0, 0.0)).collect();
        let features = compute_pointer_features(&events, 60.0);

        assert!((features.mouse_curvature_ratio - 1.0).abs() < 1e-9);
        assert_eq!(features.mouse_curvature, 0.0);
        assert!((features.mouse_distance - 190.0).abs() < 1e-9);
        // One direction only
        assert_eq!(features.mouse_entropy, 0.0);
        assert_eq!(features.mouse_jitter_score, 0.0);
    }

    #[test]
    fn test_doubled_back_path_has_high_ratio() {
        // Out 100px and back 90px: path 190, straight 10
        let mut events = Vec::new();
        for i in 0..=10 {
            events.push(move_at(i * 20, i as f64 * 10.0, 0.0));
        }
        for i in 1..=9 {
            events.push(move_at(200 + i * 20, 100.0 - i as f64 * 10.0, 0.0));
        }

        let features = compute_pointer_features(&events, 60.0);
        assert!(features.mouse_curvature_ratio > 1.5);
        assert_eq!(features.mouse_curvature, 1.0);
    }

    #[test]
    fn test_runs_split_on_pauses() {
        // Two straight strokes 5s apart; the jump between them is not traced
        let mut events: Vec<_> = (0..5).map(|i| move_at(i * 50, i as f64 * 10.0, 0.0)).collect();
        events.extend((0..5).map(|i| move_at(5000 + i * 50, 500.0, i as f64 * 10.0)));

        let features = compute_pointer_features(&events, 60.0);
        assert!((features.mouse_distance - 80.0).abs() < 1e-9);
        assert!((features.mouse_curvature_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_jitter_detected() {
        let events: Vec<_> = (0..30)
            .map(|i| move_at(i * 30, 100.0 + (i % 2) as f64 * 2.0, 100.0))
            .collect();
        let features = compute_pointer_features(&events, 60.0);
        assert_eq!(features.mouse_jitter_score, 1.0);
    }

    #[test]
    fn test_jitter_needs_enough_samples() {
        let events: Vec<_> = (0..5).map(|i| move_at(i * 30, i as f64, 0.0)).collect();
        let features = compute_pointer_features(&events, 60.0);
        assert_eq!(features.mouse_jitter_score, 0.0);
    }

    #[test]
    fn test_direction_entropy_of_square() {
        // Right, down, left, up: four equally used sectors
        let corners = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)];
        let events: Vec<_> = (0..17)
            .map(|i| {
                let (x, y) = corners[i % 4];
                move_at(i as i64 * 50, x, y)
            })
            .collect();
        let features = compute_pointer_features(&events, 60.0);
        assert!((features.mouse_entropy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_click_frequency_and_idle_ratio() {
        let mut events = vec![move_at(0, 0.0, 0.0), move_at(15_000, 10.0, 0.0)];
        for i in 0..6 {
            events.push(PointerEvent::click_at(
                base() + Duration::seconds(20 + i),
                10.0,
                0.0,
                PointerButton::Left,
            ));
        }

        let features = compute_pointer_features(&events, 30.0);
        assert!((features.click_frequency - 12.0).abs() < 1e-9);
        assert!((features.mouse_idle_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_velocity_of_constant_motion() {
        // 10px every 100ms is 100px/s
        let events: Vec<_> = (0..10).map(|i| move_at(i * 100, i as f64 * 10.0, 0.0)).collect();
        let features = compute_pointer_features(&events, 60.0);
        assert!((features.mouse_velocity_avg - 100.0).abs() < 1e-6);
        assert!(features.mouse_velocity_std < 1e-6);
        assert!(features.mouse_acceleration_avg < 1e-6);
    }
}
