//! Monitor fed through a channel hook, end to end.

use chrono::Utc;
use crossbeam_channel::unbounded;
use std::time::{Duration, Instant};
use synheart_activity_sentinel::{
    collector::{channel_hook, Collector, EventSource, DEFAULT_CHANNEL_CAPACITY},
    config::StoreConfig,
    detection::{Decision, DegradedMarker, Detector, RuleThresholds, ScoringPolicy},
    monitor::Monitor,
    simulate::Scenario,
    transparency::create_shared_log,
    Feature,
};

fn detector() -> Detector {
    Detector::new("pipeline", &RuleThresholds::default(), ScoringPolicy::RulesOnly).unwrap()
}

#[test]
fn test_channel_fed_monitor_flags_key_repeater() {
    let (events_tx, hook) = channel_hook("test", DEFAULT_CHANNEL_CAPACITY);
    let collector = Collector::new(&StoreConfig::default()).unwrap().with_hook(hook);
    let log = create_shared_log();
    let monitor = Monitor::new(
        collector,
        detector(),
        Duration::from_secs(60),
        Duration::from_millis(20),
    )
    .with_transparency_log(log.clone());

    for event in Scenario::KeyRepeater.generate(Utc::now(), chrono::Duration::seconds(60), 9) {
        events_tx.send(event).unwrap();
    }

    let (reports_tx, reports_rx) = unbounded();
    let handle = monitor.spawn(reports_tx).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut flagged = None;
    while Instant::now() < deadline {
        if let Ok(report) = reports_rx.recv_timeout(Duration::from_millis(200)) {
            // Wait until the pump has delivered the whole stream
            let complete = report.features()[Feature::TotalEvents] == 1000.0;
            if complete && report.decision() == Decision::FakeHigh {
                flagged = Some(report);
                break;
            }
        }
    }

    let report = flagged.expect("key repeater was never flagged");
    assert_eq!(report.subject_id(), "pipeline");
    assert!(!report.is_degraded());

    let collector = handle.stop().unwrap().unwrap();
    assert!(!collector.is_running());
    assert_eq!(collector.stats().keyboard.recorded, 1000);
    assert!(log.stats().fake_decisions >= 1);
    drop(events_tx);
}

#[test]
fn test_disconnected_producer_marks_reports_degraded() {
    let (events_tx, hook) = channel_hook("gone", 16);
    let collector = Collector::new(&StoreConfig::default()).unwrap().with_hook(hook);
    let monitor = Monitor::new(
        collector,
        detector(),
        Duration::from_secs(60),
        Duration::from_millis(20),
    );
    drop(events_tx);

    let (reports_tx, reports_rx) = unbounded();
    let handle = monitor.spawn(reports_tx).unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut degraded = None;
    while Instant::now() < deadline {
        if let Ok(report) = reports_rx.recv_timeout(Duration::from_millis(200)) {
            if report.is_degraded() {
                degraded = Some(report);
                break;
            }
        }
    }

    let report = degraded.expect("no degraded report");
    // Capture problems never change the verdict of an empty window
    assert_eq!(report.decision(), Decision::Genuine);
    let sources: Vec<EventSource> = report
        .degraded()
        .iter()
        .filter_map(|m| match m {
            DegradedMarker::Capture { source, .. } => Some(*source),
            _ => None,
        })
        .collect();
    assert_eq!(sources, EventSource::ALL.to_vec());

    handle.stop();
}
