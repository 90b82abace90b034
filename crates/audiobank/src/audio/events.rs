//! Bank event broadcasting
//!
//! `EventBus` broadcasts discrete `BankEvent`s to every subscriber.

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::types::BankEvent;

/// Broadcast mechanism for bank events
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<BankEvent>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to events. Returns a receiver that will get all future events.
    pub fn subscribe(&self) -> Receiver<BankEvent> {
        let (tx, rx) = unbounded();
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }
        rx
    }

    /// Emit an event to all subscribers. Removes disconnected subscribers.
    pub fn emit(&self, event: BankEvent) {
        tracing::trace!(?event, "bank event");
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}
