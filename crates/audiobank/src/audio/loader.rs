//! Background clip loading
//!
//! Every pending clip is fetched on its own short-lived thread. Results come
//! back over a channel that the bank drains once per turn, so a slow download
//! or decode never stalls the engine loop.

use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{BankError, Result};

use super::backend::MediaFetcher;
use super::types::{ClipId, ClipSource};

/// Result of one background fetch
pub struct Fetched<M> {
    pub id: ClipId,
    pub result: Result<M>,
}

pub struct ClipLoader<F: MediaFetcher> {
    fetcher: F,
    tx: Sender<Fetched<F::Media>>,
    rx: Receiver<Fetched<F::Media>>,
    in_flight: usize,
}

impl<F: MediaFetcher> ClipLoader<F> {
    pub fn new(fetcher: F) -> Self {
        let (tx, rx) = unbounded();
        Self {
            fetcher,
            tx,
            rx,
            in_flight: 0,
        }
    }

    /// Spawn a loader thread for `id` and return immediately
    pub fn start(&mut self, id: ClipId, source: ClipSource) -> Result<()> {
        let fetcher = self.fetcher.clone();
        let tx = self.tx.clone();

        thread::Builder::new()
            .name("audiobank-loader".to_string())
            .spawn(move || {
                let result = fetcher.fetch(id, &source);
                // The bank may have shut down meanwhile
                let _ = tx.send(Fetched { id, result });
            })
            .map_err(|e| BankError::Engine(format!("Failed to spawn loader thread: {}", e)))?;

        self.in_flight += 1;
        tracing::debug!(%id, in_flight = self.in_flight, "clip fetch started");
        Ok(())
    }

    /// Fetches that completed since the last call; never blocks
    pub fn finished(&mut self) -> Vec<Fetched<F::Media>> {
        let done: Vec<_> = self.rx.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Fetches started but not yet collected
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}
