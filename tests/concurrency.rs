//! Concurrent writers and readers against the collector.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::thread;
use std::time::Duration;
use synheart_activity_sentinel::{
    collector::{Collector, KeyAction, KeyboardEvent, PointerEvent},
    config::StoreConfig,
};

const EVENTS_PER_PRODUCER: usize = 10_000;
const SNAPSHOTS: usize = 100;

fn base() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Timestamp of sequence id `seq`: one event per millisecond.
fn at(seq: usize) -> DateTime<Utc> {
    base() + ChronoDuration::milliseconds(seq as i64)
}

/// True if `ids` is a run of consecutive sequence ids.
fn consecutive(ids: &[usize]) -> bool {
    ids.windows(2).all(|w| w[1] == w[0] + 1)
}

#[test]
fn test_concurrent_producers_and_snapshots() {
    let config = StoreConfig::default();
    let keyboard_capacity = config.keyboard_capacity;
    let pointer_capacity = config.pointer_capacity;
    let mut collector = Collector::new(&config).unwrap();
    collector.start().unwrap();

    // Key identities and pointer x carry each producer's sequence id
    let sinks = collector.sinks();
    let keyboard = sinks.keyboard;
    let keyboard_producer = thread::spawn(move || {
        for seq in 0..EVENTS_PER_PRODUCER {
            let event = KeyboardEvent::at(at(seq), seq.to_string().as_str(), KeyAction::Press);
            assert!(keyboard.push(event));
        }
    });
    let pointer = sinks.pointer;
    let pointer_producer = thread::spawn(move || {
        for seq in 0..EVENTS_PER_PRODUCER {
            assert!(pointer.push(PointerEvent::movement_at(at(seq), seq as f64, 0.0)));
        }
    });

    // The window covers every event either producer will ever write
    let now = at(EVENTS_PER_PRODUCER);
    let window = Duration::from_secs(60);

    // Snapshots race the producers from this thread
    for _ in 0..SNAPSHOTS {
        let snapshot = collector.snapshot_at(now, window);

        let keys: Vec<usize> = snapshot
            .keyboard_events
            .iter()
            .map(|e| e.key.as_str().parse().unwrap())
            .collect();
        assert!(keys.len() <= keyboard_capacity);
        assert!(consecutive(&keys), "keyboard ids have a gap or duplicate");

        let moves: Vec<usize> = snapshot
            .pointer_events
            .iter()
            .map(|e| e.x as usize)
            .collect();
        assert!(moves.len() <= pointer_capacity);
        assert!(consecutive(&moves), "pointer ids have a gap or duplicate");
    }

    keyboard_producer.join().unwrap();
    pointer_producer.join().unwrap();

    let stats = collector.stats();
    assert_eq!(stats.keyboard.recorded, EVENTS_PER_PRODUCER as u64);
    assert_eq!(stats.pointer.recorded, EVENTS_PER_PRODUCER as u64);
    assert_eq!(stats.keyboard.size, keyboard_capacity);
    assert_eq!(stats.pointer.size, pointer_capacity);
    assert_eq!(stats.window.recorded, 0);

    // Each store now holds the newest `capacity` ids of its own producer
    let snapshot = collector.snapshot_at(now, window);
    let keys: Vec<usize> = snapshot
        .keyboard_events
        .iter()
        .map(|e| e.key.as_str().parse().unwrap())
        .collect();
    let expected: Vec<usize> =
        (EVENTS_PER_PRODUCER - keyboard_capacity..EVENTS_PER_PRODUCER).collect();
    assert_eq!(keys, expected);

    let moves: Vec<usize> = snapshot
        .pointer_events
        .iter()
        .map(|e| e.x as usize)
        .collect();
    let expected: Vec<usize> =
        (EVENTS_PER_PRODUCER - pointer_capacity..EVENTS_PER_PRODUCER).collect();
    assert_eq!(moves, expected);
}

#[test]
fn test_stopped_collector_rejects_events() {
    let mut collector = Collector::new(&StoreConfig::default()).unwrap();
    let sinks = collector.sinks();
    assert!(!sinks.pointer.push(PointerEvent::movement(1.0, 1.0)));

    collector.start().unwrap();
    assert!(sinks.pointer.push(PointerEvent::movement(1.0, 1.0)));

    collector.stop();
    assert!(!sinks.pointer.push(PointerEvent::movement(2.0, 2.0)));
    assert_eq!(collector.stats().pointer.recorded, 1);
}
