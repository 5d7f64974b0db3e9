//! Event types recorded by the collectors.
//!
//! Keyboard events carry a symbolic key identity, never the literal text typed.
//! Redaction of sensitive fields (password inputs) happens in the hook layer
//! before an event ever reaches a store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything that can be ordered on the capture timeline.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// The three capture channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Keyboard,
    Pointer,
    Window,
}

impl EventSource {
    pub const ALL: [EventSource; 3] = [EventSource::Keyboard, EventSource::Pointer, EventSource::Window];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Keyboard => "keyboard",
            EventSource::Pointer => "pointer",
            EventSource::Window => "window",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable symbolic key identity (`"a"`, `"ctrl_l"`, `"tab"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Control modifier (`ctrl`, `ctrl_l`, `ctrl_r`, `control`).
    pub fn is_ctrl(&self) -> bool {
        self.0.starts_with("ctrl") || self.0.starts_with("control")
    }

    /// Alt/option modifier.
    pub fn is_alt(&self) -> bool {
        self.0.starts_with("alt") || self.0.starts_with("option")
    }
}

impl From<&str> for KeyId {
    fn from(id: &str) -> Self {
        KeyId::new(id)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Press,
    Release,
}

/// A keyboard event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyboardEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Symbolic key identity
    pub key: KeyId,
    pub action: KeyAction,
}

impl KeyboardEvent {
    pub fn press(key: impl Into<KeyId>) -> Self {
        Self::at(Utc::now(), key, KeyAction::Press)
    }

    pub fn release(key: impl Into<KeyId>) -> Self {
        Self::at(Utc::now(), key, KeyAction::Release)
    }

    pub fn at(timestamp: DateTime<Utc>, key: impl Into<KeyId>, action: KeyAction) -> Self {
        Self {
            timestamp,
            key: key.into(),
            action,
        }
    }

    pub fn is_press(&self) -> bool {
        self.action == KeyAction::Press
    }
}

/// Pointer event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerKind {
    Move,
    Click,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

/// A pointer event in screen coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    pub x: f64,
    pub y: f64,
    pub kind: PointerKind,
    /// Only set for clicks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub button: Option<PointerButton>,
}

impl PointerEvent {
    pub fn movement(x: f64, y: f64) -> Self {
        Self::movement_at(Utc::now(), x, y)
    }

    pub fn movement_at(timestamp: DateTime<Utc>, x: f64, y: f64) -> Self {
        Self {
            timestamp,
            x,
            y,
            kind: PointerKind::Move,
            button: None,
        }
    }

    pub fn click_at(timestamp: DateTime<Utc>, x: f64, y: f64, button: PointerButton) -> Self {
        Self {
            timestamp,
            x,
            y,
            kind: PointerKind::Click,
            button: Some(button),
        }
    }

    pub fn scroll_at(timestamp: DateTime<Utc>, x: f64, y: f64) -> Self {
        Self {
            timestamp,
            x,
            y,
            kind: PointerKind::Scroll,
            button: None,
        }
    }

    /// Euclidean distance to another pointer position.
    pub fn distance_to(&self, other: &PointerEvent) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// A window-focus change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowEvent {
    pub timestamp: DateTime<Utc>,
    pub app_name: String,
    pub window_title: String,
}

impl WindowEvent {
    pub fn at(timestamp: DateTime<Utc>, app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            timestamp,
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

/// Unified event type delivered by capture hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum SensorEvent {
    Keyboard(KeyboardEvent),
    Pointer(PointerEvent),
    Window(WindowEvent),
}

impl SensorEvent {
    pub fn source(&self) -> EventSource {
        match self {
            SensorEvent::Keyboard(_) => EventSource::Keyboard,
            SensorEvent::Pointer(_) => EventSource::Pointer,
            SensorEvent::Window(_) => EventSource::Window,
        }
    }
}

impl Timestamped for KeyboardEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for PointerEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for WindowEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timestamped for SensorEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            SensorEvent::Keyboard(e) => e.timestamp,
            SensorEvent::Pointer(e) => e.timestamp,
            SensorEvent::Window(e) => e.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_normalization() {
        let key = KeyId::new("Ctrl_L");
        assert_eq!(key.as_str(), "ctrl_l");
        assert!(key.is_ctrl());
        assert!(!key.is_alt());
        assert!(KeyId::from("alt_r").is_alt());
    }

    #[test]
    fn test_pointer_distance() {
        let a = PointerEvent::movement(0.0, 0.0);
        let b = PointerEvent::movement(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensor_event_source_and_timestamp() {
        let key = KeyboardEvent::press("a");
        let ts = key.timestamp;
        let event = SensorEvent::Keyboard(key);
        assert_eq!(event.source(), EventSource::Keyboard);
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_sensor_event_serialization_is_tagged() {
        let event = SensorEvent::Window(WindowEvent::at(Utc::now(), "editor", "notes.md"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["source"], "window");
        assert_eq!(json["app_name"], "editor");
    }
}
