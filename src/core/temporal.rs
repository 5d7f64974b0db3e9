//! Temporal, context and cross-channel features.
//!
//! These look at the whole snapshot at once: when input happened, how it is
//! spread over the window, which apps had focus and how the channels mix.

use crate::collector::types::{PointerEvent, PointerKind};
use crate::core::stats::{coefficient_of_variation, gaps_secs, normalized_entropy, unit};
use crate::core::windowing::EventSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Gaps longer than this (seconds) between significant inputs count as idle.
pub const IDLE_GAP_SECS: f64 = 5.0;

/// Pointer moves shorter than this (pixels) are not significant input.
const SIGNIFICANT_MOVE_PX: f64 = 10.0;

/// Width of the activity histogram buckets in seconds.
pub const SPIKE_BUCKET_SECS: f64 = 10.0;

/// Longer windows widen the buckets instead of adding more.
const MAX_SPIKE_BUCKETS: usize = 8_640;

/// Minimum events before spike and periodicity are scored.
const MIN_RHYTHM_EVENTS: usize = 10;

const SPIKE_CV_SCALE: f64 = 2.0;
const PERIODIC_CV_SCALE: f64 = 0.5;

/// Temporal, context and combined features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporalFeatures {
    pub idle_seconds: f64,
    pub active_seconds: f64,
    /// Unevenness of activity across the window
    pub activity_spike_score: f64,
    /// Regularity of inter-event gaps
    pub periodic_behavior_score: f64,
    pub time_since_last_activity: f64,
    pub window_switch_count: u32,
    /// Mean seconds per focused app
    pub active_app_duration: f64,
    pub unique_apps_count: u32,
    pub input_diversity_score: f64,
    /// Normalized entropy of the event-type mix
    pub overall_entropy_score: f64,
    pub total_events: u32,
}

impl TemporalFeatures {
    /// Values for an empty window of `window_secs` seconds.
    pub fn neutral(window_secs: f64) -> Self {
        let window_secs = window_secs.max(0.0);
        Self {
            idle_seconds: window_secs,
            active_seconds: 0.0,
            activity_spike_score: 0.0,
            periodic_behavior_score: 0.0,
            time_since_last_activity: window_secs,
            window_switch_count: 0,
            active_app_duration: window_secs,
            unique_apps_count: 0,
            input_diversity_score: 0.0,
            overall_entropy_score: 0.0,
            total_events: 0,
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.idle_seconds,
            self.active_seconds,
            self.activity_spike_score,
            self.periodic_behavior_score,
            self.time_since_last_activity,
            self.active_app_duration,
            self.input_diversity_score,
            self.overall_entropy_score,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Event categories used for the overall entropy score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EventKind {
    KeyPress,
    KeyRelease,
    PointerMove,
    PointerClick,
    PointerScroll,
    Focus,
}

/// Compute temporal features for a snapshot.
pub fn compute_temporal_features(snapshot: &EventSnapshot) -> TemporalFeatures {
    let window_secs = snapshot.duration_secs();
    if snapshot.is_empty() || window_secs <= 0.0 {
        return TemporalFeatures::neutral(window_secs);
    }

    let press_times: Vec<DateTime<Utc>> = snapshot
        .keyboard_events
        .iter()
        .filter(|e| e.is_press())
        .map(|e| e.timestamp)
        .collect();

    // Key presses plus every pointer event, in time order
    let mut input_times = press_times.clone();
    input_times.extend(snapshot.pointer_events.iter().map(|e| e.timestamp));
    input_times.sort();

    let idle_seconds = idle_seconds(snapshot, &press_times).min(window_secs);

    let last_activity = snapshot
        .keyboard_events
        .iter()
        .map(|e| e.timestamp)
        .chain(snapshot.pointer_events.iter().map(|e| e.timestamp))
        .chain(snapshot.window_events.iter().map(|e| e.timestamp))
        .max();
    let time_since_last_activity = last_activity
        .map(|t| secs(t, snapshot.end).max(0.0))
        .unwrap_or(window_secs);

    let window_switch_count = snapshot.window_events.len() as u32;
    let unique_apps: HashSet<&str> = snapshot
        .window_events
        .iter()
        .map(|e| e.app_name.as_str())
        .collect();

    TemporalFeatures {
        idle_seconds,
        active_seconds: (window_secs - idle_seconds).max(0.0),
        activity_spike_score: spike_score(&input_times, snapshot.start, window_secs),
        periodic_behavior_score: periodic_score(&input_times),
        time_since_last_activity,
        window_switch_count,
        active_app_duration: window_secs / f64::from(window_switch_count.max(1)),
        unique_apps_count: unique_apps.len() as u32,
        input_diversity_score: input_diversity(press_times.len(), &snapshot.pointer_events),
        overall_entropy_score: normalized_entropy(event_kinds(snapshot)),
        total_events: snapshot.event_count() as u32,
    }
}

fn secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from)
        .num_microseconds()
        .map(|us| us as f64 / 1e6)
        .unwrap_or(f64::MAX)
}

/// Sum of gaps longer than [`IDLE_GAP_SECS`] between significant inputs,
/// including the stretches before the first and after the last one.
fn idle_seconds(snapshot: &EventSnapshot, press_times: &[DateTime<Utc>]) -> f64 {
    let mut marks: Vec<DateTime<Utc>> = press_times.to_vec();

    let mut previous: Option<&PointerEvent> = None;
    for event in &snapshot.pointer_events {
        let significant = match event.kind {
            PointerKind::Move => previous
                .map(|p| p.distance_to(event) > SIGNIFICANT_MOVE_PX)
                .unwrap_or(true),
            PointerKind::Click | PointerKind::Scroll => true,
        };
        if significant {
            marks.push(event.timestamp);
        }
        previous = Some(event);
    }

    marks.push(snapshot.start);
    marks.push(snapshot.end);
    marks.sort();

    gaps_secs(&marks)
        .into_iter()
        .filter(|&gap| gap > IDLE_GAP_SECS)
        .sum()
}

/// `min(CV(bucket counts) / 2, 1)` over fixed buckets from the window start.
fn spike_score(times: &[DateTime<Utc>], start: DateTime<Utc>, window_secs: f64) -> f64 {
    let bucket_count =
        ((window_secs / SPIKE_BUCKET_SECS).ceil() as usize).min(MAX_SPIKE_BUCKETS);
    if times.len() < MIN_RHYTHM_EVENTS || bucket_count < 2 {
        return 0.0;
    }
    let bucket_secs = SPIKE_BUCKET_SECS.max(window_secs / bucket_count as f64);

    let mut counts = vec![0.0; bucket_count];
    for &t in times {
        let index = (secs(start, t).max(0.0) / bucket_secs) as usize;
        counts[index.min(bucket_count - 1)] += 1.0;
    }

    unit(coefficient_of_variation(&counts) / SPIKE_CV_SCALE)
}

/// `max(0, 1 - CV(gaps) / 0.5)`: perfectly regular input scores 1.
fn periodic_score(times: &[DateTime<Utc>]) -> f64 {
    if times.len() < MIN_RHYTHM_EVENTS {
        return 0.0;
    }
    let gaps = gaps_secs(times);
    unit(1.0 - coefficient_of_variation(&gaps) / PERIODIC_CV_SCALE)
}

/// Channel presence scaled by keyboard/pointer balance.
fn input_diversity(key_presses: usize, pointer_events: &[PointerEvent]) -> f64 {
    let moves = pointer_events.iter().any(|e| e.kind == PointerKind::Move);
    let clicks = pointer_events.iter().any(|e| e.kind == PointerKind::Click);
    let present = [key_presses > 0, moves, clicks].iter().filter(|&&p| p).count();
    let presence = present as f64 / 3.0;

    let k = key_presses as f64;
    let p = pointer_events.len() as f64;
    let balance = if k + p > 0.0 { 2.0 * k.min(p) / (k + p) } else { 0.0 };

    presence * (0.5 + 0.5 * balance)
}

fn event_kinds(snapshot: &EventSnapshot) -> Vec<EventKind> {
    let keyboard = snapshot.keyboard_events.iter().map(|e| {
        if e.is_press() {
            EventKind::KeyPress
        } else {
            EventKind::KeyRelease
        }
    });
    let pointer = snapshot.pointer_events.iter().map(|e| match e.kind {
        PointerKind::Move => EventKind::PointerMove,
        PointerKind::Click => EventKind::PointerClick,
        PointerKind::Scroll => EventKind::PointerScroll,
    });
    let focus = snapshot.window_events.iter().map(|_| EventKind::Focus);

    keyboard.chain(pointer).chain(focus).collect()
}
