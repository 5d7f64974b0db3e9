//! Synthetic activity scenarios.
//!
//! Deterministic event streams for one human-like pattern and the common
//! fake-work tools (key repeaters, mouse movers, shortcut spammers and
//! idle-timeout gamers). Streams are seeded so every run of a scenario
//! produces exactly the same events.

use crate::collector::types::{
    KeyAction, KeyboardEvent, PointerButton, PointerEvent, SensorEvent, Timestamped, WindowEvent,
};
use crate::core::windowing::EventSnapshot;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keys a human-like typist draws from.
const HUMAN_KEYS: [&str; 40] = [
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r",
    "s", "t", "u", "v", "w", "x", "y", "z", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0",
    "space", "enter", "backspace", "comma",
];

const APPS: [&str; 4] = ["Code", "Browser", "Slack", "Mail"];

/// A synthetic activity pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Varied typing, curved pointer strokes with clicks, a few app switches
    Human,
    /// One key pressed at a fixed rate
    KeyRepeater,
    /// Tiny random pointer nudges at a fixed rate
    MouseMover,
    /// Copy/paste shortcuts at a fixed rate
    ShortcutSpammer,
    /// Almost nothing, then a burst right before an idle timeout
    IdleGamer,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Human,
        Scenario::KeyRepeater,
        Scenario::MouseMover,
        Scenario::ShortcutSpammer,
        Scenario::IdleGamer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Human => "human",
            Scenario::KeyRepeater => "key-repeater",
            Scenario::MouseMover => "mouse-mover",
            Scenario::ShortcutSpammer => "shortcut-spammer",
            Scenario::IdleGamer => "idle-gamer",
        }
    }

    pub fn is_automated(&self) -> bool {
        !matches!(self, Scenario::Human)
    }

    /// Generate the scenario's events for the window `[end - window, end]`,
    /// in timestamp order. A window shorter than a millisecond has no events.
    pub fn generate(&self, end: DateTime<Utc>, window: Duration, seed: u64) -> Vec<SensorEvent> {
        if window.num_milliseconds() <= 0 {
            return Vec::new();
        }

        let mut generator = Generator {
            rng: StdRng::seed_from_u64(seed),
            start: end - window,
            window_ms: window.num_milliseconds(),
            events: Vec::new(),
        };

        match self {
            Scenario::Human => generator.human(),
            Scenario::KeyRepeater => generator.key_repeater(),
            Scenario::MouseMover => generator.mouse_mover(),
            Scenario::ShortcutSpammer => generator.shortcut_spammer(),
            Scenario::IdleGamer => generator.idle_gamer(),
        }

        let start = end - window;
        let mut events = generator.events;
        events.retain(|e| e.timestamp() >= start && e.timestamp() <= end);
        events.sort_by_key(|e| e.timestamp());
        events
    }

    /// Generate the scenario straight into a snapshot.
    pub fn snapshot(&self, end: DateTime<Utc>, window: Duration, seed: u64) -> EventSnapshot {
        let mut keyboard = Vec::new();
        let mut pointer = Vec::new();
        let mut windows = Vec::new();
        for event in self.generate(end, window, seed) {
            match event {
                SensorEvent::Keyboard(e) => keyboard.push(e),
                SensorEvent::Pointer(e) => pointer.push(e),
                SensorEvent::Window(e) => windows.push(e),
            }
        }
        EventSnapshot::from_events(end, window, keyboard, pointer, windows)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario '{0}' (expected one of: human, key-repeater, mouse-mover, shortcut-spammer, idle-gamer)")]
pub struct UnknownScenario(pub String);

impl FromStr for Scenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.as_str() == normalized)
            .ok_or_else(|| UnknownScenario(s.to_string()))
    }
}

struct Generator {
    rng: StdRng,
    start: DateTime<Utc>,
    window_ms: i64,
    events: Vec<SensorEvent>,
}

impl Generator {
    fn window_secs(&self) -> f64 {
        self.window_ms as f64 / 1000.0
    }

    fn at(&self, offset_secs: f64) -> DateTime<Utc> {
        self.start + Duration::microseconds((offset_secs * 1e6).round() as i64)
    }

    fn key(&mut self, offset_secs: f64, key: &str, action: KeyAction) {
        let event = KeyboardEvent::at(self.at(offset_secs), key, action);
        self.events.push(SensorEvent::Keyboard(event));
    }

    fn movement(&mut self, offset_secs: f64, x: f64, y: f64) {
        let event = PointerEvent::movement_at(self.at(offset_secs), x, y);
        self.events.push(SensorEvent::Pointer(event));
    }

    fn click(&mut self, offset_secs: f64, x: f64, y: f64) {
        let event = PointerEvent::click_at(self.at(offset_secs), x, y, PointerButton::Left);
        self.events.push(SensorEvent::Pointer(event));
    }

    fn focus(&mut self, offset_secs: f64, app: &str) {
        let event = WindowEvent::at(self.at(offset_secs), app, format!("{app} window"));
        self.events.push(SensorEvent::Window(event));
    }

    /// Every key of [`HUMAN_KEYS`] equally often, irregular gaps with an
    /// occasional thinking pause, and curved pointer strokes ending in a click.
    fn human(&mut self) {
        let mut keys: Vec<&str> = HUMAN_KEYS.iter().flat_map(|k| [*k; 5]).collect();
        keys.shuffle(&mut self.rng);

        let mut t = 0.5;
        for key in keys {
            if t > self.window_secs() - 0.5 {
                break;
            }
            let hold = self.rng.random_range(0.05..0.12);
            self.key(t, key, KeyAction::Press);
            self.key(t + hold, key, KeyAction::Release);

            t += if self.rng.random_bool(0.1) {
                self.rng.random_range(0.5..1.0)
            } else {
                self.rng.random_range(0.08..0.35)
            };
        }

        // Arc strokes: 15 points over 2.4 rad of a 200px radius circle
        let mut t = 2.0;
        while t < self.window_secs() - 2.0 {
            let cx = self.rng.random_range(400.0..1500.0);
            let cy = self.rng.random_range(300.0..800.0);
            let start_angle = self.rng.random_range(0.0..std::f64::consts::TAU);
            let (mut x, mut y) = (0.0, 0.0);

            for i in 0..15 {
                let angle = start_angle + 2.4 * i as f64 / 14.0;
                x = cx + 200.0 * angle.cos();
                y = cy + 200.0 * angle.sin();
                self.movement(t, x, y);
                t += self.rng.random_range(0.04..0.06);
            }
            t += self.rng.random_range(0.1..0.3);
            self.click(t, x, y);

            t += self.rng.random_range(4.0..6.0);
        }

        let switches = if self.window_ms > 0 {
            self.rng.random_range(1..=4)
        } else {
            0
        };
        for _ in 0..switches {
            let offset = self.rng.random_range(0.0..self.window_secs());
            let app = APPS[self.rng.random_range(0..APPS.len())];
            self.focus(offset, app);
        }
    }

    /// One dominant key every 50ms, with a sprinkling of other keys.
    fn key_repeater(&mut self) {
        const INTERVAL_MS: i64 = 50;
        let count = ((self.window_ms - 10_000).max(INTERVAL_MS) / INTERVAL_MS) as usize;

        let mut keys = vec!["a"; count];
        let others = count / 20;
        for (i, slot) in keys.iter_mut().take(others).enumerate() {
            *slot = HUMAN_KEYS[1 + i % 25];
        }
        keys.shuffle(&mut self.rng);

        for (i, key) in keys.into_iter().enumerate() {
            let offset_ms = 5_000 + i as i64 * INTERVAL_MS;
            self.key(offset_ms as f64 / 1000.0, key, KeyAction::Press);
        }
    }

    /// Random sub-5px nudges every 100ms for half the window.
    fn mouse_mover(&mut self) {
        let count = (self.window_ms.max(0) / 2 / 100) as usize;
        let (mut x, mut y) = (500.0, 500.0);
        for i in 0..count {
            x += self.rng.random_range(-3.0..3.0);
            y += self.rng.random_range(-3.0..3.0);
            self.movement(2.0 + i as f64 * 0.1, x, y);
        }
    }

    /// ctrl held, then c and v, on a fixed 300ms beat.
    fn shortcut_spammer(&mut self) {
        let beat = 0.3;
        let cycles = ((self.window_secs() - 2.0).max(0.0) / (3.0 * beat)) as usize;
        for cycle in 0..cycles {
            let t = 1.0 + cycle as f64 * 3.0 * beat;
            self.key(t, "ctrl_l", KeyAction::Press);
            self.key(t + beat, "c", KeyAction::Press);
            self.key(t + beat + 0.05, "c", KeyAction::Release);
            self.key(t + 2.0 * beat, "v", KeyAction::Press);
            self.key(t + 2.0 * beat + 0.05, "v", KeyAction::Release);
            self.key(t + 2.0 * beat + 0.1, "ctrl_l", KeyAction::Release);
        }
    }

    /// A handful of presses early on, then a key and pointer burst near the
    /// end of the window.
    fn idle_gamer(&mut self) {
        let quiet_until = (self.window_secs() * 2.0 / 3.0).max(1.0);
        for _ in 0..5 {
            let t = self.rng.random_range(0.0..quiet_until);
            let key = ["a", "b", "c"][self.rng.random_range(0..3)];
            self.key(t, key, KeyAction::Press);
        }

        let burst_start = (self.window_secs() - 10.0).max(0.0);
        for i in 0..30 {
            let t = burst_start + i as f64 * 0.1;
            let key = HUMAN_KEYS[self.rng.random_range(0..8)];
            self.key(t, key, KeyAction::Press);
            self.movement(t, 500.0 + i as f64 * 5.0, 500.0 + i as f64 * 5.0);
        }
    }
}
