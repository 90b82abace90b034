//! Periodic signal sampling
//!
//! `SamplingLoop` runs the estimator on its own thread at a fixed cadence
//! and publishes the latest `(volume, frequency)` for readers that must not
//! touch the audio graph, such as an avatar's mouth animation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Sender};

use crate::error::{BankError, Result};

use super::estimator::SignalEstimator;
use super::types::SignalSnapshot;

/// Thread-safe handle to the latest published snapshot
pub type SharedSignal = Arc<Mutex<SignalSnapshot>>;

pub fn new_shared_signal() -> SharedSignal {
    Arc::new(Mutex::new(SignalSnapshot::SILENT))
}

pub struct SamplingLoop {
    signal: SharedSignal,
    ticks: Arc<AtomicU64>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SamplingLoop {
    /// Spawn the sampling thread. The first sample is taken one interval in.
    pub fn start(estimator: SignalEstimator, interval: Duration) -> Result<Self> {
        let signal = new_shared_signal();
        let ticks = Arc::new(AtomicU64::new(0));
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let signal_thread = signal.clone();
        let ticks_thread = ticks.clone();
        let thread = thread::Builder::new()
            .name("audiobank-sampler".to_string())
            .spawn(move || {
                let mut estimator = estimator;
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => {
                            let snapshot = estimator.sample();
                            if let Ok(mut latest) = signal_thread.lock() {
                                *latest = snapshot;
                            }
                            ticks_thread.fetch_add(1, Ordering::Relaxed);
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::debug!("sampling loop stopped");
            })
            .map_err(|e| BankError::Engine(format!("Failed to spawn sampler thread: {}", e)))?;

        tracing::debug!(interval_ms = interval.as_millis() as u64, "sampling loop started");

        Ok(Self {
            signal,
            ticks,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn signal(&self) -> SharedSignal {
        self.signal.clone()
    }

    /// Most recently published snapshot; `(0,0)` once stopped
    pub fn latest(&self) -> SignalSnapshot {
        self.signal
            .lock()
            .map(|s| *s)
            .unwrap_or(SignalSnapshot::SILENT)
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Stop the thread and reset the published snapshot. Idempotent.
    pub fn stop(&mut self) {
        // Dropping the sender disconnects `stop_rx`, which ends the select loop
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        if let Ok(mut latest) = self.signal.lock() {
            *latest = SignalSnapshot::SILENT;
        }
    }
}

impl Drop for SamplingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
