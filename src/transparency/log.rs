//! Monitoring transparency log.
//!
//! Counts what the sentinel has observed and decided, without retaining any
//! event content. The counters can be persisted so `status` can show totals
//! across sessions.

use crate::detection::report::{Decision, DecisionReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Running counters for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Number of keyboard events recorded
    keyboard_events: AtomicU64,
    /// Number of pointer events recorded
    pointer_events: AtomicU64,
    /// Number of window-focus events recorded
    window_events: AtomicU64,
    /// Number of analysis ticks completed
    analyses_completed: AtomicU64,
    genuine_decisions: AtomicU64,
    suspicious_decisions: AtomicU64,
    /// FAKE decisions of any tier
    fake_decisions: AtomicU64,
    /// Reports produced with degraded inputs
    degraded_reports: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl TransparencyLog {
    pub fn new() -> Self {
        Self {
            keyboard_events: AtomicU64::new(0),
            pointer_events: AtomicU64::new(0),
            window_events: AtomicU64::new(0),
            analyses_completed: AtomicU64::new(0),
            genuine_decisions: AtomicU64::new(0),
            suspicious_decisions: AtomicU64::new(0),
            fake_decisions: AtomicU64::new(0),
            degraded_reports: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log backed by a file, picking up previously saved totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!(error = %e, "could not load previous transparency stats");
        }

        log
    }

    pub fn record_keyboard_events(&self, count: u64) {
        self.keyboard_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_pointer_events(&self, count: u64) {
        self.pointer_events.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_window_events(&self, count: u64) {
        self.window_events.fetch_add(count, Ordering::Relaxed);
    }

    /// Count a finished analysis and its outcome.
    pub fn record_report(&self, report: &DecisionReport) {
        self.analyses_completed.fetch_add(1, Ordering::Relaxed);
        let counter = match report.decision() {
            Decision::Genuine => &self.genuine_decisions,
            Decision::Suspicious => &self.suspicious_decisions,
            Decision::FakeLow | Decision::FakeMedium | Decision::FakeHigh => &self.fake_decisions,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        if report.is_degraded() {
            self.degraded_reports.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            keyboard_events: self.keyboard_events.load(Ordering::Relaxed),
            pointer_events: self.pointer_events.load(Ordering::Relaxed),
            window_events: self.window_events.load(Ordering::Relaxed),
            analyses_completed: self.analyses_completed.load(Ordering::Relaxed),
            genuine_decisions: self.genuine_decisions.load(Ordering::Relaxed),
            suspicious_decisions: self.suspicious_decisions.load(Ordering::Relaxed),
            fake_decisions: self.fake_decisions.load(Ordering::Relaxed),
            degraded_reports: self.degraded_reports.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Keyboard events observed: {}\n\
             - Pointer events observed: {}\n\
             - Window events observed: {}\n\
             - Analyses completed: {}\n\
             - Decisions: {} genuine, {} suspicious, {} fake\n\
             - Degraded reports: {}\n\
             - Session duration: {} seconds\n\
             \n\
             Privacy Guarantee:\n\
             - No typed text captured\n\
             - Events are discarded after their retention window\n\
             - Only counters are persisted",
            stats.keyboard_events,
            stats.pointer_events,
            stats.window_events,
            stats.analyses_completed,
            stats.genuine_decisions,
            stats.suspicious_decisions,
            stats.fake_decisions,
            stats.degraded_reports,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk. A log without a path is a no-op.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                keyboard_events: stats.keyboard_events,
                pointer_events: stats.pointer_events,
                window_events: stats.window_events,
                analyses_completed: stats.analyses_completed,
                genuine_decisions: stats.genuine_decisions,
                suspicious_decisions: stats.suspicious_decisions,
                fake_decisions: stats.fake_decisions,
                degraded_reports: stats.degraded_reports,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                let pairs = [
                    (&self.keyboard_events, persisted.keyboard_events),
                    (&self.pointer_events, persisted.pointer_events),
                    (&self.window_events, persisted.window_events),
                    (&self.analyses_completed, persisted.analyses_completed),
                    (&self.genuine_decisions, persisted.genuine_decisions),
                    (&self.suspicious_decisions, persisted.suspicious_decisions),
                    (&self.fake_decisions, persisted.fake_decisions),
                    (&self.degraded_reports, persisted.degraded_reports),
                ];
                for (counter, value) in pairs {
                    counter.store(value, Ordering::Relaxed);
                }
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        for counter in [
            &self.keyboard_events,
            &self.pointer_events,
            &self.window_events,
            &self.analyses_completed,
            &self.genuine_decisions,
            &self.suspicious_decisions,
            &self.fake_decisions,
            &self.degraded_reports,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub keyboard_events: u64,
    pub pointer_events: u64,
    pub window_events: u64,
    pub analyses_completed: u64,
    pub genuine_decisions: u64,
    pub suspicious_decisions: u64,
    pub fake_decisions: u64,
    pub degraded_reports: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    keyboard_events: u64,
    pointer_events: u64,
    window_events: u64,
    analyses_completed: u64,
    genuine_decisions: u64,
    suspicious_decisions: u64,
    fake_decisions: u64,
    #[serde(default)]
    degraded_reports: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedTransparencyLog {
    Arc::new(TransparencyLog::with_persistence(path))
}
