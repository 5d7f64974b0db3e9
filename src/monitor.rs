//! Periodic analysis loop.
//!
//! The monitor is the single consumer of the collector: every interval it
//! takes a snapshot of the trailing window, runs the detector on it and hands
//! the report to the caller. Waiting between ticks is a `recv_timeout` on a
//! shutdown channel, so a stop request interrupts the wait but never a tick.

use crate::collector::orchestrator::{CaptureError, Collector, CollectorStats};
use crate::config::{Config, ConfigError};
use crate::detection::detector::Detector;
use crate::detection::report::DecisionReport;
use crate::transparency::SharedTransparencyLog;
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::ops::ControlFlow;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Monitor {
    collector: Collector,
    detector: Detector,
    window: Duration,
    interval: Duration,
    transparency: Option<SharedTransparencyLog>,
    max_ticks: Option<u64>,
    ticks: u64,
    /// Recorded counts already reported to the transparency log
    seen: [u64; 3],
}

impl Monitor {
    pub fn new(collector: Collector, detector: Detector, window: Duration, interval: Duration) -> Self {
        let seen = recorded_counts(&collector.stats());
        Self {
            collector,
            detector,
            window,
            interval,
            transparency: None,
            max_ticks: None,
            ticks: 0,
            seen,
        }
    }

    /// Build a monitor with the detector, window and interval from `config`.
    pub fn from_config(collector: Collector, config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let detector = Detector::from_config(config)?;
        Ok(Self::new(
            collector,
            detector,
            config.window_duration,
            config.analysis_interval,
        ))
    }

    pub fn with_transparency_log(mut self, log: SharedTransparencyLog) -> Self {
        self.transparency = Some(log);
        self
    }

    /// Stop `run` on its own after this many ticks.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Analyze the window ending now.
    pub fn tick(&mut self) -> DecisionReport {
        self.tick_at(Utc::now())
    }

    /// Analyze the window ending at `now`.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> DecisionReport {
        let snapshot = self.collector.snapshot_at(now, self.window);
        let report = self.detector.analyze(&snapshot);
        self.ticks += 1;

        if let Some(log) = &self.transparency {
            let counts = recorded_counts(&self.collector.stats());
            log.record_keyboard_events(counts[0].saturating_sub(self.seen[0]));
            log.record_pointer_events(counts[1].saturating_sub(self.seen[1]));
            log.record_window_events(counts[2].saturating_sub(self.seen[2]));
            self.seen = counts;
            log.record_report(&report);
        }

        if report.decision().is_fake() {
            warn!(
                subject = report.subject_id(),
                decision = %report.decision(),
                probability = report.probability(),
                reasons = ?report.reasons(),
                "automated activity detected"
            );
        } else {
            info!(
                subject = report.subject_id(),
                decision = %report.decision(),
                probability = report.probability(),
                events = snapshot.event_count(),
                "window analyzed"
            );
        }

        report
    }

    /// Run until `shutdown` fires or disconnects, the sink breaks, or the tick
    /// limit is reached. Starts the collector if needed and returns it stopped.
    pub fn run(
        mut self,
        shutdown: &Receiver<()>,
        mut sink: impl FnMut(DecisionReport) -> ControlFlow<()>,
    ) -> Result<Collector, CaptureError> {
        if !self.collector.is_running() {
            self.collector.start()?;
        }
        info!(
            window_secs = self.window.as_secs_f64(),
            interval_secs = self.interval.as_secs_f64(),
            "monitor started"
        );

        loop {
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let report = self.tick();
                    if sink(report).is_break() {
                        debug!("report sink closed");
                        break;
                    }
                    if self.max_ticks.is_some_and(|max| self.ticks >= max) {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(ticks = self.ticks, "monitor stopped");
        self.collector.stop();
        Ok(self.collector)
    }

    /// Run on a dedicated thread, sending every report to `reports`.
    ///
    /// The loop ends when the handle is stopped or dropped, or when the
    /// receiving side of `reports` goes away.
    pub fn spawn(self, reports: Sender<DecisionReport>) -> std::io::Result<MonitorHandle> {
        let (shutdown_tx, shutdown_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("sentinel-monitor".to_string())
            .spawn(move || {
                self.run(&shutdown_rx, |report| match reports.send(report) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(_) => ControlFlow::Break(()),
                })
            })?;

        Ok(MonitorHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

fn recorded_counts(stats: &CollectorStats) -> [u64; 3] {
    [
        stats.keyboard.recorded,
        stats.pointer.recorded,
        stats.window.recorded,
    ]
}

/// Handle to a monitor running on its own thread.
pub struct MonitorHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<Result<Collector, CaptureError>>>,
}

impl MonitorHandle {
    /// Whether the monitor thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Request a stop, wait for the current tick to finish and get the
    /// collector back. `None` if the monitor thread panicked.
    pub fn stop(mut self) -> Option<Result<Collector, CaptureError>> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Option<Result<Collector, CaptureError>> {
        if let Some(shutdown) = self.shutdown.take() {
            // Fails only if the loop already exited
            let _ = shutdown.send(());
        }
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("monitor thread panicked");
                None
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::detection::report::Decision;
    use crate::detection::rules::RuleThresholds;
    use crate::detection::scorer::ScoringPolicy;
    use crate::simulate::Scenario;
    use crate::transparency::create_shared_log;

    fn monitor(interval: Duration) -> Monitor {
        let collector = Collector::new(&StoreConfig::default()).unwrap();
        let detector =
            Detector::new("test", &RuleThresholds::default(), ScoringPolicy::RulesOnly).unwrap();
        Monitor::new(collector, detector, Duration::from_secs(60), interval)
    }

    #[test]
    fn test_tick_reports_and_counts() {
        let log = create_shared_log();
        let mut monitor = monitor(Duration::from_secs(60)).with_transparency_log(log.clone());
        monitor.collector.start().unwrap();

        let end = Utc::now();
        let sinks = monitor.collector().sinks();
        for event in Scenario::KeyRepeater.generate(end, chrono::Duration::seconds(60), 1) {
            assert!(sinks.route(event));
        }

        let report = monitor.tick_at(end);
        assert_eq!(report.decision(), Decision::FakeHigh);
        assert_eq!(monitor.ticks(), 1);

        let stats = log.stats();
        assert_eq!(stats.keyboard_events, 1000);
        assert_eq!(stats.analyses_completed, 1);
        assert_eq!(stats.fake_decisions, 1);

        // Counts are reported once, not on every tick
        monitor.tick_at(end);
        assert_eq!(log.stats().keyboard_events, 1000);
        assert_eq!(log.stats().analyses_completed, 2);
    }

    #[test]
    fn test_from_config_rejects_window_beyond_retention() {
        let mut config = Config::default();
        config.window_duration = Duration::from_secs(600);
        let collector = Collector::new(&config.stores).unwrap();
        assert!(matches!(
            Monitor::from_config(collector, &config),
            Err(ConfigError::RetentionShorterThanWindow { .. })
        ));
    }

    #[test]
    fn test_run_stops_after_max_ticks() {
        let monitor = monitor(Duration::from_millis(10)).with_max_ticks(3);
        let (_shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let mut reports = Vec::new();
        let collector = monitor
            .run(&shutdown_rx, |report| {
                reports.push(report);
                ControlFlow::Continue(())
            })
            .unwrap();

        assert_eq!(reports.len(), 3);
        // An empty window is never judged
        assert!(reports.iter().all(|r| r.decision() == Decision::Genuine));
        assert!(!collector.is_running());
    }

    #[test]
    fn test_run_exits_on_shutdown() {
        let monitor = monitor(Duration::from_secs(3600));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        shutdown_tx.send(()).unwrap();

        let mut count = 0;
        let collector = monitor
            .run(&shutdown_rx, |_| {
                count += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(count, 0);
        assert!(!collector.is_running());
    }

    #[test]
    fn test_sink_break_ends_run() {
        let monitor = monitor(Duration::from_millis(5));
        let (_shutdown_tx, shutdown_rx) = bounded::<()>(1);

        let mut count = 0;
        monitor
            .run(&shutdown_rx, |_| {
                count += 1;
                ControlFlow::Break(())
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_spawned_monitor_delivers_and_stops() {
        let (reports_tx, reports_rx) = crossbeam_channel::unbounded();
        let handle = monitor(Duration::from_millis(10)).spawn(reports_tx).unwrap();

        let report = reports_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(report.subject_id(), "test");

        let collector = handle.stop().unwrap().unwrap();
        assert!(!collector.is_running());
    }
}
