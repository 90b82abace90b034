//! Playback controller
//!
//! Drives one clip at a time through `Requested → Loading → Playing` and
//! settles it exactly once. The controller is the only writer of the current
//! clip slot that the signal estimator reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::error::{BankError, Result};

use super::backend::PlayableHandle;
use super::types::{ClipId, PlaybackOutcome, PlaybackPhase};

/// Lock-free slot holding the current clip id (0 = none)
#[derive(Debug, Clone, Default)]
pub struct CurrentClip {
    slot: Arc<AtomicU64>,
}

impl CurrentClip {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<ClipId> {
        match self.slot.load(Ordering::Acquire) {
            0 => None,
            raw => Some(ClipId::new(raw)),
        }
    }

    pub(crate) fn set(&self, id: Option<ClipId>) {
        self.slot
            .store(id.map(ClipId::get).unwrap_or(0), Ordering::Release);
    }
}

/// Broadcast abort flag shared by every session of one clear-generation
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Pending result of a `play` call
#[derive(Debug)]
pub struct PlaybackCompletion {
    id: ClipId,
    rx: Receiver<PlaybackOutcome>,
}

impl PlaybackCompletion {
    pub fn id(&self) -> ClipId {
        self.id
    }

    /// Block until the playback settles
    pub fn wait(self) -> Result<PlaybackOutcome> {
        self.rx
            .recv()
            .map_err(|_| BankError::Engine(format!("playback of {} was abandoned", self.id)))
    }

    /// Block for at most `timeout`; `Ok(None)` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Result<Option<PlaybackOutcome>> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BankError::Engine(format!(
                "playback of {} was abandoned",
                self.id
            ))),
        }
    }

    /// Non-blocking poll
    pub fn try_outcome(&self) -> Option<PlaybackOutcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Receiver for use with `select!`
    pub fn receiver(&self) -> &Receiver<PlaybackOutcome> {
        &self.rx
    }
}

/// A session that has left the controller and is waiting to be resolved.
///
/// The bank performs side effects (auto-removal) before calling `resolve`,
/// so the caller never observes a resolved completion for a clip that is
/// still registered.
#[derive(Debug)]
#[must_use = "a finished session must be resolved"]
pub struct Finished {
    pub id: ClipId,
    pub outcome: PlaybackOutcome,
    pub auto_remove: bool,
    tx: Sender<PlaybackOutcome>,
}

impl Finished {
    pub fn resolve(self) {
        // The caller may have dropped the completion; nothing to report then.
        let _ = self.tx.send(self.outcome);
    }
}

struct Session {
    id: ClipId,
    auto_remove: bool,
    phase: PlaybackPhase,
    token: CancelToken,
    media_failed: bool,
    deadline: Option<Instant>,
    tx: Sender<PlaybackOutcome>,
}

pub struct PlaybackController {
    current: CurrentClip,
    session: Option<Session>,
    token: CancelToken,
    play_timeout: Option<Duration>,
}

impl PlaybackController {
    pub fn new(current: CurrentClip, play_timeout: Option<Duration>) -> Self {
        Self {
            current,
            session: None,
            token: CancelToken::new(),
            play_timeout,
        }
    }

    pub fn current_clip(&self) -> Option<ClipId> {
        self.session.as_ref().map(|s| s.id)
    }

    pub fn phase(&self) -> Option<PlaybackPhase> {
        self.session.as_ref().map(|s| s.phase)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Token handed to sessions started from now until the next clear
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Start a session: `Requested → Loading`, then `Playing` unless
    /// `defer_start` is set (autoplay suspended). Media errors are logged and
    /// swallowed; such a session can never report a natural end, so the play
    /// timeout is armed for it once output begins. Healthy sessions have no
    /// deadline however long the clip is.
    ///
    /// The caller must settle any previous session first.
    pub fn start<H: PlayableHandle>(
        &mut self,
        id: ClipId,
        auto_remove: bool,
        handle: &mut H,
        defer_start: bool,
    ) -> PlaybackCompletion {
        debug_assert!(self.session.is_none(), "previous session not settled");

        let (tx, rx) = bounded(1);
        let mut session = Session {
            id,
            auto_remove,
            phase: PlaybackPhase::Requested,
            token: self.token.clone(),
            media_failed: false,
            deadline: None,
            tx,
        };
        self.current.set(Some(id));

        session.phase = PlaybackPhase::Loading;
        tracing::debug!(%id, "loading clip");
        if let Err(e) = handle.load() {
            tracing::warn!(%id, "failed to load clip: {}", e);
            session.media_failed = true;
        }

        if defer_start {
            tracing::info!(%id, "playback deferred until user gesture");
        } else {
            Self::begin_output(&mut session, handle, self.play_timeout);
        }

        self.session = Some(session);
        PlaybackCompletion { id, rx }
    }

    /// Start a session that was held in `Loading` by an autoplay suspension
    pub fn resume<H: PlayableHandle>(&mut self, handle: &mut H) {
        let timeout = self.play_timeout;
        if let Some(session) = self.session.as_mut() {
            if session.phase == PlaybackPhase::Loading {
                Self::begin_output(session, handle, timeout);
            }
        }
    }

    fn begin_output<H: PlayableHandle>(
        session: &mut Session,
        handle: &mut H,
        timeout: Option<Duration>,
    ) {
        if let Err(e) = handle.play() {
            tracing::warn!(id = %session.id, "failed to play clip: {}", e);
            session.media_failed = true;
        }
        session.phase = PlaybackPhase::Playing;

        if session.media_failed {
            session.deadline = timeout.map(|t| Instant::now() + t);
            if let Some(t) = timeout {
                tracing::debug!(id = %session.id, "no end will be reported; timing out in {:?}", t);
            }
        } else {
            tracing::info!(id = %session.id, "playing clip");
        }
    }

    /// Instant after which the live session settles as `TimedOut`
    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(|s| s.deadline)
    }

    /// Check the live session for a terminal condition.
    ///
    /// `ended` is the handle's natural-end signal. Cancellation wins over
    /// natural end, which wins over timeout. Only sessions whose media failed
    /// carry a deadline.
    pub fn poll(&mut self, ended: bool, now: Instant) -> Option<Finished> {
        let session = self.session.as_ref()?;

        let outcome = if session.token.is_cancelled() {
            PlaybackOutcome::Cleared
        } else if ended && session.phase == PlaybackPhase::Playing {
            PlaybackOutcome::Ended
        } else if session.deadline.is_some_and(|d| now >= d) {
            PlaybackOutcome::TimedOut
        } else {
            return None;
        };

        self.finish(outcome)
    }

    /// Settle the live session with `outcome` (superseded, removed, ...)
    pub fn interrupt(&mut self, outcome: PlaybackOutcome) -> Option<Finished> {
        self.finish(outcome)
    }

    /// Broadcast the clear signal: cancel the live token, settle the session
    /// as `Cleared`, and start a fresh token generation
    pub fn cancel(&mut self) -> Option<Finished> {
        self.token.cancel();
        self.token = CancelToken::new();
        self.poll(false, Instant::now())
    }

    fn finish(&mut self, outcome: PlaybackOutcome) -> Option<Finished> {
        let mut session = self.session.take()?;
        session.phase = match outcome {
            PlaybackOutcome::Ended => PlaybackPhase::Ended,
            _ => PlaybackPhase::Cleared,
        };
        self.current.set(None);
        tracing::debug!(id = %session.id, %outcome, phase = %session.phase, "session settled");

        Some(Finished {
            id: session.id,
            outcome,
            auto_remove: session.auto_remove,
            tx: session.tx,
        })
    }
}
