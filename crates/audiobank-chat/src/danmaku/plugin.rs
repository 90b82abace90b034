//! Polling danmaku plugin
//!
//! Fetches the relay's backlog once, then polls it on its own thread. New
//! messages queue up for the next prompt and, when display is on, are
//! forwarded to the presentation layer.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use audiobank::error::BankError;
use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};

use crate::config::ChatConfig;
use crate::error::Result;

use super::feed::DanmakuFeed;
use super::source::{HttpMessageSource, MessageSource};
use super::types::{Danmaku, Language};

/// Thread-safe handle to the feed
pub type SharedFeed = Arc<Mutex<DanmakuFeed>>;

pub struct DanmakuPlugin {
    feed: SharedFeed,
    language: Language,
    display_rx: Option<Receiver<Danmaku>>,
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DanmakuPlugin {
    /// Start polling the HTTP relay named in `config`
    pub fn start(config: &ChatConfig) -> Result<Self> {
        let source = HttpMessageSource::new(config)?;
        Self::with_source(config, source)
    }

    /// Start polling an arbitrary message source
    pub fn with_source<S: MessageSource>(config: &ChatConfig, source: S) -> Result<Self> {
        config.validate()?;
        let language: Language = config.language.parse()?;

        let feed: SharedFeed = Arc::new(Mutex::new(DanmakuFeed::new()));
        let (display_tx, display_rx) = if config.display {
            let (tx, rx) = unbounded();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let interval = Duration::from_millis(config.poll_interval_ms);

        let feed_thread = feed.clone();
        let thread = thread::Builder::new()
            .name("audiobank-danmaku".to_string())
            .spawn(move || {
                seed(&source, &feed_thread);
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(ticker) -> _ => poll_once(&source, &feed_thread, display_tx.as_ref()),
                        recv(stop_rx) -> _ => break,
                    }
                }
                tracing::debug!("danmaku polling stopped");
            })
            .map_err(|e| BankError::Engine(format!("Failed to spawn danmaku thread: {}", e)))?;

        tracing::info!(%language, display = config.display, "danmaku plugin started");

        Ok(Self {
            feed,
            language,
            display_rx,
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Prompt text for the messages received since the last call; empty
    /// when nothing new arrived
    pub fn prompt(&self) -> String {
        self.feed
            .lock()
            .map(|mut feed| feed.prompt(self.language))
            .unwrap_or_default()
    }

    /// Drain new messages without formatting them
    pub fn take_new(&self) -> Vec<Danmaku> {
        self.feed
            .lock()
            .map(|mut feed| feed.take_new())
            .unwrap_or_default()
    }

    pub fn history_len(&self) -> usize {
        self.feed.lock().map(|feed| feed.history().len()).unwrap_or(0)
    }

    /// New messages for display; `None` unless display is on
    pub fn display_receiver(&self) -> Option<&Receiver<Danmaku>> {
        self.display_rx.as_ref()
    }

    pub fn feed(&self) -> SharedFeed {
        self.feed.clone()
    }

    /// Stop polling. Idempotent.
    pub fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for DanmakuPlugin {
    fn drop(&mut self) {
        self.stop();
    }
}

fn seed<S: MessageSource>(source: &S, feed: &SharedFeed) {
    match source.fetch() {
        Ok(batch) => {
            if let Ok(mut feed) = feed.lock() {
                let recorded = feed.seed(batch);
                tracing::info!(recorded, "danmaku backlog recorded");
            }
        }
        Err(e) => tracing::warn!("Error fetching danmaku: {}", e),
    }
}

fn poll_once<S: MessageSource>(source: &S, feed: &SharedFeed, display: Option<&Sender<Danmaku>>) {
    let batch = match source.fetch() {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Error fetching danmaku: {}", e);
            return;
        }
    };

    let fresh = match feed.lock() {
        Ok(mut feed) => feed.ingest(batch),
        Err(_) => return,
    };
    if fresh.is_empty() {
        return;
    }
    tracing::debug!(count = fresh.len(), "new danmaku");

    if let Some(tx) = display {
        for msg in fresh {
            let _ = tx.send(msg);
        }
    }
}
