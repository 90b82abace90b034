//! Clip registry
//!
//! Maps clip ids to their sources and, once materialized, their playable
//! handles. Materialization never happens inside `add`; pending clips are
//! handed to background loaders on the next scheduling turn and completed
//! when their fetch comes back.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::{BankError, Result};

use super::backend::PlayableHandle;
use super::types::{ClearReport, ClipId, ClipIdAllocator, ClipSource};

/// Materialization state of one clip
pub enum ClipState<H> {
    Pending,
    Ready(H),
    Failed(String),
}

impl<H> ClipState<H> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ClipState::Ready(_))
    }
}

pub struct ClipEntry<H> {
    source: ClipSource,
    state: ClipState<H>,
}

impl<H> ClipEntry<H> {
    pub fn source(&self) -> &ClipSource {
        &self.source
    }

    pub fn state(&self) -> &ClipState<H> {
        &self.state
    }
}

/// Result of materializing one pending clip
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    Ready(ClipId),
    Failed { id: ClipId, reason: String },
}

pub struct ClipRegistry<H> {
    ids: Arc<ClipIdAllocator>,
    clips: HashMap<ClipId, ClipEntry<H>>,
    pending: VecDeque<ClipId>,
}

impl<H: PlayableHandle> ClipRegistry<H> {
    pub fn new(ids: Arc<ClipIdAllocator>) -> Self {
        Self {
            ids,
            clips: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// Register `source` under a fresh id. The handle is created later.
    pub fn add(&mut self, source: ClipSource) -> ClipId {
        let id = self.ids.next_id();
        self.register(id, source);
        id
    }

    /// Register under an id allocated elsewhere (the engine's caller thread)
    pub fn register(&mut self, id: ClipId, source: ClipSource) {
        tracing::debug!(%id, %source, "clip registered");
        self.clips.insert(
            id,
            ClipEntry {
                source,
                state: ClipState::Pending,
            },
        );
        self.pending.push_back(id);
    }

    /// Pending clips not yet handed to a loader, oldest first.
    ///
    /// Clips removed or cleared before their turn are skipped. The returned
    /// clips stay `Pending` until `complete` is called for them.
    pub fn take_pending(&mut self) -> Vec<(ClipId, ClipSource)> {
        let mut batch = Vec::with_capacity(self.pending.len());
        while let Some(id) = self.pending.pop_front() {
            if let Some(entry) = self.clips.get(&id) {
                if matches!(entry.state, ClipState::Pending) {
                    batch.push((id, entry.source.clone()));
                }
            }
        }
        batch
    }

    /// Record the materialization result of a pending clip. Failures are
    /// logged and recorded, never propagated. Returns `None` when the clip
    /// was removed or cleared while it was loading.
    pub fn complete(&mut self, id: ClipId, result: Result<H>) -> Option<Materialized> {
        let entry = match self.clips.get_mut(&id) {
            Some(entry) if matches!(entry.state, ClipState::Pending) => entry,
            _ => {
                tracing::debug!(%id, "discarding load of a clip that is gone");
                return None;
            }
        };

        match result {
            Ok(handle) => {
                tracing::debug!(%id, "clip materialized");
                entry.state = ClipState::Ready(handle);
                Some(Materialized::Ready(id))
            }
            Err(e) => {
                tracing::warn!(%id, source = %entry.source, "failed to load clip: {}", e);
                let reason = e.to_string();
                entry.state = ClipState::Failed(reason.clone());
                Some(Materialized::Failed { id, reason })
            }
        }
    }

    /// Detach and drop the clip. Unknown ids are a no-op.
    pub fn remove(&mut self, id: ClipId) -> bool {
        match self.clips.remove(&id) {
            Some(mut entry) => {
                if let ClipState::Ready(ref mut handle) = entry.state {
                    handle.stop();
                }
                tracing::debug!(%id, "clip removed");
                true
            }
            None => false,
        }
    }

    /// Drop every clip, stopping live handles and releasing blob data
    pub fn clear(&mut self) -> ClearReport {
        let mut report = ClearReport::default();

        for (_, mut entry) in self.clips.drain() {
            if let ClipState::Ready(ref mut handle) = entry.state {
                handle.stop();
            }
            if entry.source.is_blob() {
                report.blobs += 1;
                report.blob_bytes += entry.source.blob_len();
            }
            report.clips += 1;
        }
        self.pending.clear();

        tracing::debug!(
            clips = report.clips,
            blobs = report.blobs,
            blob_bytes = report.blob_bytes,
            "registry cleared"
        );
        report
    }

    /// Playable handle for `id`, or NotFound / NotReady
    pub fn handle_mut(&mut self, id: ClipId) -> Result<&mut H> {
        match self.clips.get_mut(&id) {
            None => Err(BankError::NotFound(id)),
            Some(entry) => match entry.state {
                ClipState::Ready(ref mut handle) => Ok(handle),
                ClipState::Pending | ClipState::Failed(_) => Err(BankError::NotReady(id)),
            },
        }
    }

    pub fn handle(&self, id: ClipId) -> Option<&H> {
        match self.clips.get(&id)?.state {
            ClipState::Ready(ref handle) => Some(handle),
            _ => None,
        }
    }

    pub fn get(&self, id: ClipId) -> Option<&ClipEntry<H>> {
        self.clips.get(&id)
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.clips.contains_key(&id)
    }

    pub fn is_ready(&self, id: ClipId) -> bool {
        self.clips.get(&id).is_some_and(|e| e.state.is_ready())
    }

    /// Registered and still waiting for its handle
    pub fn is_pending(&self, id: ClipId) -> bool {
        self.clips
            .get(&id)
            .is_some_and(|e| matches!(e.state, ClipState::Pending))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Registered ids in allocation order
    pub fn ids(&self) -> Vec<ClipId> {
        let mut ids: Vec<ClipId> = self.clips.keys().copied().collect();
        ids.sort();
        ids
    }
}
