//! Channel-backed capture hook.
//!
//! OS hook callbacks must return quickly, so platform layers push events into a
//! bounded channel and a pump thread drains it into the stores. This hook is
//! that pump; anything that can hold a `Sender<SensorEvent>` can feed the
//! pipeline (platform hooks, replay tools, tests).

use crate::collector::orchestrator::{CaptureError, CaptureHook, CaptureSinks};
use crate::collector::types::{EventSource, SensorEvent};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// Default channel capacity, bounding memory if the pump falls behind.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Create a hook plus the sender its producers write into.
pub fn channel_hook(name: impl Into<String>, capacity: usize) -> (Sender<SensorEvent>, ChannelHook) {
    let (sender, receiver) = bounded(capacity.max(1));
    (sender, ChannelHook::new(name, receiver))
}

/// Pumps a `SensorEvent` channel into the collector's sinks.
pub struct ChannelHook {
    name: String,
    receiver: Receiver<SensorEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ChannelHook {
    pub fn new(name: impl Into<String>, receiver: Receiver<SensorEvent>) -> Self {
        Self {
            name: name.into(),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Check if the pump thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl CaptureHook for ChannelHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn sources(&self) -> &[EventSource] {
        &EventSource::ALL
    }

    fn attach(&mut self, sinks: CaptureSinks) -> Result<(), CaptureError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CaptureError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let receiver = self.receiver.clone();
        let running = self.running.clone();
        let name = self.name.clone();

        let handle = thread::Builder::new()
            .name(format!("capture-{name}"))
            .spawn(move || {
                pump(&receiver, &sinks, &running, &name);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                CaptureError::HookUnavailable(e.to_string())
            })?;

        self.thread_handle = Some(handle);
        Ok(())
    }

    fn detach(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The pump notices within one poll interval
            let _ = handle.join();
        }
    }
}

impl Drop for ChannelHook {
    fn drop(&mut self) {
        self.detach();
    }
}

fn pump(receiver: &Receiver<SensorEvent>, sinks: &CaptureSinks, running: &AtomicBool, name: &str) {
    let mut delivered: u64 = 0;

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(PUMP_POLL_INTERVAL) {
            Ok(event) => {
                if sinks.route(event) {
                    delivered += 1;
                } else {
                    trace!(hook = name, "event dropped, capture stopped");
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                for source in EventSource::ALL {
                    sinks.report_degraded(source, format!("{name}: producer disconnected"));
                }
                break;
            }
        }
    }

    debug!(hook = name, delivered, "capture pump exited");
}
