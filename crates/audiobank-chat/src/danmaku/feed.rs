//! Message history with de-duplication
//!
//! The relay returns its whole message list on every poll. `DanmakuFeed`
//! remembers every id it has seen and surfaces only the unseen ones.

use std::collections::HashSet;

use super::prompt::format_prompt;
use super::types::{Danmaku, Language, MessageId};

#[derive(Debug, Default)]
pub struct DanmakuFeed {
    seen: HashSet<MessageId>,
    history: Vec<Danmaku>,
    pending: Vec<Danmaku>,
}

impl DanmakuFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the backlog present at start-up without marking it new.
    /// Returns how many messages were recorded.
    pub fn seed(&mut self, batch: Vec<Danmaku>) -> usize {
        let mut recorded = 0;
        for msg in batch {
            if self.seen.insert(msg.id.clone()) {
                self.history.push(msg);
                recorded += 1;
            }
        }
        recorded
    }

    /// Record a polled batch and return the messages not seen before
    pub fn ingest(&mut self, batch: Vec<Danmaku>) -> Vec<Danmaku> {
        let mut fresh = Vec::new();
        for msg in batch {
            if self.seen.insert(msg.id.clone()) {
                self.history.push(msg.clone());
                self.pending.push(msg.clone());
                fresh.push(msg);
            }
        }
        fresh
    }

    /// Drain the messages that arrived since the last drain
    pub fn take_new(&mut self) -> Vec<Danmaku> {
        std::mem::take(&mut self.pending)
    }

    /// Prompt for the pending messages; drains them
    pub fn prompt(&mut self, language: Language) -> String {
        format_prompt(&self.take_new(), language)
    }

    pub fn has_new(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn history(&self) -> &[Danmaku] {
        &self.history
    }
}
