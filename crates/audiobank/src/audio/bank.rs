//! Audio bank
//!
//! Single-threaded core tying the registry, the playback controller and the
//! signal estimator together. Every mutation happens through `&mut self`;
//! `BankEngine` puts one of these on its own thread.

use std::sync::Arc;
use std::time::Instant;

use crate::config::BankConfig;
use crate::error::Result;

use super::analyzer::SharedAnalyzer;
use super::backend::{MediaBackend, PlayableHandle};
use super::controller::{CurrentClip, Finished, PlaybackCompletion, PlaybackController};
use super::estimator::SignalEstimator;
use super::events::EventBus;
use super::loader::ClipLoader;
use super::registry::{ClipRegistry, Materialized};
use super::types::{
    BankEvent, ClearReport, ClipId, ClipIdAllocator, ClipSource, PlaybackOutcome,
    PlaybackPhase, SignalSnapshot,
};

/// Point-in-time view of the bank
#[derive(Debug, Clone, PartialEq)]
pub struct BankStatus {
    pub clips: usize,
    /// Clips whose fetch has not come back yet
    pub loading: usize,
    pub current: Option<ClipId>,
    pub phase: Option<PlaybackPhase>,
    pub suspended: bool,
}

pub struct AudioBank<B: MediaBackend> {
    backend: B,
    loader: ClipLoader<B::Fetcher>,
    registry: ClipRegistry<B::Handle>,
    controller: PlaybackController,
    estimator: SignalEstimator,
    events: Arc<EventBus>,
    suspended: bool,
}

impl<B: MediaBackend> AudioBank<B> {
    pub fn new(backend: B, config: &BankConfig) -> Self {
        Self::with_allocator(backend, config, Arc::new(ClipIdAllocator::new()))
    }

    /// Build a bank whose ids come from a shared allocator
    pub fn with_allocator(backend: B, config: &BankConfig, ids: Arc<ClipIdAllocator>) -> Self {
        let current = CurrentClip::new();
        let estimator = SignalEstimator::new(backend.analyzer(), current.clone())
            .with_clamp(config.clamp_volume);

        if config.require_user_gesture {
            tracing::info!("audio output suspended until user gesture");
        }

        Self {
            loader: ClipLoader::new(backend.fetcher()),
            registry: ClipRegistry::new(ids),
            controller: PlaybackController::new(current, config.play_timeout()),
            estimator,
            events: Arc::new(EventBus::new()),
            suspended: config.require_user_gesture,
            backend,
        }
    }

    /// Register a clip and return its id. Loading starts on the next
    /// `run_turn` and finishes in the background.
    pub fn add(&mut self, source: impl Into<ClipSource>) -> ClipId {
        let id = self.registry.add(source.into());
        self.events.emit(BankEvent::ClipAdded(id));
        id
    }

    /// Register under an id allocated by the caller
    pub fn register(&mut self, id: ClipId, source: ClipSource) {
        self.registry.register(id, source);
        self.events.emit(BankEvent::ClipAdded(id));
    }

    /// Remove a clip. Unknown ids are a no-op. Removing the playing clip
    /// settles its completion as `Removed`.
    pub fn remove(&mut self, id: ClipId) -> bool {
        let finished = if self.controller.current_clip() == Some(id) {
            self.controller.interrupt(PlaybackOutcome::Removed)
        } else {
            None
        };

        let removed = self.registry.remove(id);
        if removed {
            tracing::info!(%id, "clip removed");
            self.events.emit(BankEvent::ClipRemoved(id));
        }

        if let Some(finished) = finished {
            self.settle(finished);
        }
        removed
    }

    /// Stop everything, empty the registry and settle any pending completion
    /// as `Cleared`
    pub fn clear(&mut self) -> ClearReport {
        let finished = self.controller.cancel();
        let report = self.registry.clear();
        if let Ok(mut tap) = self.backend.analyzer().lock() {
            tap.reset();
        }

        tracing::info!(
            clips = report.clips,
            blobs = report.blobs,
            "audio bank cleared"
        );
        self.events.emit(BankEvent::Cleared(report));

        if let Some(finished) = finished {
            self.settle(finished);
        }
        report
    }

    /// Play a registered clip from the start.
    ///
    /// Fails with `NotFound` / `NotReady` without touching the current
    /// playback. Otherwise any previous playback is settled as `Superseded`.
    pub fn play(&mut self, id: ClipId, auto_remove: bool) -> Result<PlaybackCompletion> {
        self.registry.handle_mut(id)?;

        if let Some(mut previous) = self.controller.interrupt(PlaybackOutcome::Superseded) {
            tracing::debug!(previous = %previous.id, next = %id, "superseding playback");
            // Replaying the current clip must not unregister it
            if previous.id == id {
                previous.auto_remove = false;
            }
            self.settle(previous);
        }

        if let Ok(mut tap) = self.backend.analyzer().lock() {
            tap.reset();
        }

        let handle = self.registry.handle_mut(id)?;
        let completion = self
            .controller
            .start(id, auto_remove, handle, self.suspended);

        if !self.suspended {
            self.events.emit(BankEvent::PlaybackStarted(id));
        }
        Ok(completion)
    }

    /// Current `(volume, frequency)`; `(0,0)` when nothing is playing.
    ///
    /// Reads the same tap as any running `SamplingLoop`. The tap only
    /// advances its smoothing when new audio arrived, so extra reads here
    /// do not disturb the published signal.
    pub fn sample(&mut self) -> SignalSnapshot {
        self.estimator.sample()
    }

    /// Lift the autoplay suspension and start a deferred playback
    pub fn notify_user_gesture(&mut self) {
        if !self.suspended {
            return;
        }
        if let Err(e) = self.backend.resume() {
            tracing::warn!("failed to resume audio output: {}", e);
            return;
        }
        self.suspended = false;
        tracing::info!("audio output resumed");
        self.events.emit(BankEvent::Resumed);

        if let Some(id) = self.controller.current_clip() {
            if let Ok(handle) = self.registry.handle_mut(id) {
                self.controller.resume(handle);
                self.events.emit(BankEvent::PlaybackStarted(id));
            }
        }
    }

    /// One scheduling turn: start loads for new clips, pick up finished
    /// ones, then check the live playback for its end or timeout. Never
    /// waits on a fetch.
    pub fn run_turn(&mut self) {
        self.run_turn_at(Instant::now());
    }

    pub(crate) fn run_turn_at(&mut self, now: Instant) {
        for (id, source) in self.registry.take_pending() {
            if let Err(e) = self.loader.start(id, source) {
                if let Some(result) = self.registry.complete(id, Err(e)) {
                    self.announce(result);
                }
            }
        }

        for fetched in self.loader.finished() {
            let id = fetched.id;
            if !self.registry.is_pending(id) {
                tracing::debug!(%id, "dropping fetch of a clip that is gone");
                continue;
            }
            let handle = fetched
                .result
                .and_then(|media| self.backend.materialize(id, media));
            if let Some(result) = self.registry.complete(id, handle) {
                self.announce(result);
            }
        }

        let ended = self
            .controller
            .current_clip()
            .and_then(|id| self.registry.handle(id))
            .is_some_and(|h| h.is_ended());

        if let Some(finished) = self.controller.poll(ended, now) {
            self.settle(finished);
        }
    }

    fn announce(&self, result: Materialized) {
        match result {
            Materialized::Ready(id) => self.events.emit(BankEvent::ClipReady(id)),
            Materialized::Failed { id, reason } => {
                self.events.emit(BankEvent::ClipFailed { id, reason })
            }
        }
    }

    /// Side effects of a finished session, then resolve its completion
    fn settle(&mut self, finished: Finished) {
        let id = finished.id;
        match finished.outcome {
            PlaybackOutcome::Ended => {
                tracing::info!(%id, "clip ended");
                self.events.emit(BankEvent::ClipEnded(id));
                if finished.auto_remove && self.registry.remove(id) {
                    self.events.emit(BankEvent::ClipRemoved(id));
                }
            }
            PlaybackOutcome::Superseded | PlaybackOutcome::TimedOut => {
                if finished.outcome == PlaybackOutcome::TimedOut {
                    tracing::warn!(%id, "playback timed out");
                }
                if finished.auto_remove {
                    if self.registry.remove(id) {
                        self.events.emit(BankEvent::ClipRemoved(id));
                    }
                } else if let Ok(handle) = self.registry.handle_mut(id) {
                    handle.stop();
                }
            }
            // Handles already released by clear / remove
            PlaybackOutcome::Cleared | PlaybackOutcome::Removed => {}
        }

        self.events.emit(BankEvent::PlaybackFinished {
            id,
            outcome: finished.outcome,
        });
        finished.resolve();
    }

    /// Settle everything before the bank goes away
    pub fn shutdown(&mut self) {
        if !self.registry.is_empty() || self.controller.is_active() {
            self.clear();
        }
    }

    pub fn status(&self) -> BankStatus {
        BankStatus {
            clips: self.registry.len(),
            loading: self.loading(),
            current: self.controller.current_clip(),
            phase: self.controller.phase(),
            suspended: self.suspended,
        }
    }

    pub fn current_clip(&self) -> Option<ClipId> {
        self.controller.current_clip()
    }

    pub fn phase(&self) -> Option<PlaybackPhase> {
        self.controller.phase()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn contains(&self, id: ClipId) -> bool {
        self.registry.contains(id)
    }

    pub fn is_ready(&self, id: ClipId) -> bool {
        self.registry.is_ready(id)
    }

    /// Clips registered but not yet ready or failed
    pub fn loading(&self) -> usize {
        self.registry
            .ids()
            .into_iter()
            .filter(|&id| self.registry.is_pending(id))
            .count()
    }

    pub fn is_loading(&self) -> bool {
        self.loader.in_flight() > 0 || self.registry.has_pending()
    }

    pub fn ids(&self) -> Vec<ClipId> {
        self.registry.ids()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Sample rate the tap currently assumes
    pub fn sample_rate(&self) -> u32 {
        self.backend.sample_rate()
    }

    /// Detached estimator sharing this bank's tap and current clip
    pub fn estimator(&self) -> SignalEstimator {
        self.estimator.clone()
    }

    pub fn analyzer(&self) -> SharedAnalyzer {
        self.backend.analyzer()
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::audio::testing::{MockBackend, MockControl};
    use crate::error::BankError;

    fn bank_with(config: BankConfig) -> (AudioBank<MockBackend>, MockControl) {
        let (backend, control) = MockBackend::new();
        (AudioBank::new(backend, &config), control)
    }

    fn bank() -> (AudioBank<MockBackend>, MockControl) {
        bank_with(BankConfig::default())
    }

    /// Turn until every background load has been picked up
    fn finish_loads(bank: &mut AudioBank<MockBackend>) {
        let deadline = Instant::now() + Duration::from_secs(2);
        bank.run_turn();
        while bank.is_loading() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
            bank.run_turn();
        }
    }

    /// Add and materialize
    fn ready(bank: &mut AudioBank<MockBackend>, locator: &str) -> ClipId {
        let id = bank.add(locator);
        finish_loads(bank);
        assert!(bank.is_ready(id));
        id
    }

    // --- Registry operations ---

    #[test]
    fn test_add_is_not_immediately_ready() {
        let (mut bank, control) = bank();
        let id = bank.add("voice/a.mp3");
        assert!(bank.contains(id));
        assert!(!bank.is_ready(id));
        assert!(control.materialized().is_empty());

        finish_loads(&mut bank);
        assert!(bank.is_ready(id));
    }

    #[test]
    fn test_add_twice_gives_distinct_ids() {
        let (mut bank, _) = bank();
        let a = bank.add("same.mp3");
        let b = bank.add("same.mp3");
        assert_ne!(a, b);
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn test_play_before_turn_is_not_ready() {
        let (mut bank, _) = bank();
        let id = bank.add("a.mp3");
        assert!(matches!(bank.play(id, true), Err(BankError::NotReady(x)) if x == id));
    }

    #[test]
    fn test_play_unknown_is_not_found() {
        let (mut bank, _) = bank();
        let ghost = ClipId::new(42);
        assert!(matches!(bank.play(ghost, true), Err(BankError::NotFound(_))));
    }

    #[test]
    fn test_play_failed_clip_is_not_ready() {
        let (mut bank, control) = bank();
        let events = bank.events().subscribe();
        let id = bank.add("broken.mp3");
        control.fail_materialize(id);
        finish_loads(&mut bank);

        assert!(bank.contains(id));
        assert!(matches!(bank.play(id, true), Err(BankError::NotReady(_))));
        assert!(events
            .try_iter()
            .any(|e| matches!(e, BankEvent::ClipFailed { id: x, .. } if x == id)));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let (mut bank, _) = bank();
        ready(&mut bank, "a.mp3");
        assert!(!bank.remove(ClipId::new(999)));
        assert_eq!(bank.len(), 1);
    }

    #[test]
    fn test_removed_clip_cannot_be_played() {
        let (mut bank, _) = bank();
        let id = ready(&mut bank, "a.mp3");
        assert!(bank.remove(id));
        assert!(matches!(bank.play(id, true), Err(BankError::NotFound(_))));
    }

    // --- Playback ---

    #[test]
    fn test_play_to_end_with_auto_remove() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "a.mp3");

        let completion = bank.play(id, true).unwrap();
        assert_eq!(bank.current_clip(), Some(id));
        assert_eq!(bank.phase(), Some(PlaybackPhase::Playing));

        control.end(id);
        bank.run_turn();

        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Ended));
        assert!(!bank.contains(id));
        assert_eq!(bank.current_clip(), None);
        assert_eq!(bank.sample(), SignalSnapshot::SILENT);
    }

    #[test]
    fn test_play_to_end_without_auto_remove_keeps_clip() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "a.mp3");

        let completion = bank.play(id, false).unwrap();
        control.end(id);
        bank.run_turn();

        assert_eq!(completion.wait().unwrap(), PlaybackOutcome::Ended);
        assert!(bank.contains(id));

        // Replays from the start
        let again = bank.play(id, false).unwrap();
        assert_eq!(control.loads(), vec![id, id]);
        control.end(id);
        bank.run_turn();
        assert_eq!(again.try_outcome(), Some(PlaybackOutcome::Ended));
    }

    #[test]
    fn test_auto_remove_happens_before_resolution() {
        let (mut bank, control) = bank();
        let events = bank.events().subscribe();
        let id = ready(&mut bank, "a.mp3");
        bank.play(id, true).unwrap();
        control.end(id);
        bank.run_turn();

        let tail: Vec<BankEvent> = events
            .try_iter()
            .skip_while(|e| !matches!(e, BankEvent::ClipEnded(_)))
            .collect();
        assert_eq!(
            tail,
            vec![
                BankEvent::ClipEnded(id),
                BankEvent::ClipRemoved(id),
                BankEvent::PlaybackFinished {
                    id,
                    outcome: PlaybackOutcome::Ended
                },
            ]
        );
    }

    #[test]
    fn test_sample_is_live_while_playing() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "a.mp3");
        bank.play(id, true).unwrap();

        // Silent tap: volume (0 - 55) / 30, not the (0,0) idle value
        let snapshot = bank.sample();
        assert!(!snapshot.is_silent());

        control.end(id);
        bank.run_turn();
        assert!(bank.sample().is_silent());
    }

    #[test]
    fn test_second_play_supersedes_first() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        let b = ready(&mut bank, "b.mp3");

        let first = bank.play(a, true).unwrap();
        let second = bank.play(b, true).unwrap();

        assert_eq!(first.try_outcome(), Some(PlaybackOutcome::Superseded));
        assert!(!control.is_playing(a));
        assert!(control.is_playing(b));
        assert!(!bank.contains(a), "auto-remove applies to superseded clips");
        assert_eq!(bank.current_clip(), Some(b));
        assert!(second.try_outcome().is_none());
    }

    #[test]
    fn test_superseded_clip_without_auto_remove_stays() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        let b = ready(&mut bank, "b.mp3");

        let first = bank.play(a, false).unwrap();
        bank.play(b, true).unwrap();

        assert_eq!(first.try_outcome(), Some(PlaybackOutcome::Superseded));
        assert!(bank.contains(a));
        assert!(!control.is_playing(a));
        assert_eq!(control.stops(), vec![a]);
    }

    #[test]
    fn test_replaying_current_clip_keeps_it_registered() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "a.mp3");

        let first = bank.play(id, true).unwrap();
        let second = bank.play(id, true).unwrap();

        assert_eq!(first.try_outcome(), Some(PlaybackOutcome::Superseded));
        assert!(bank.contains(id));
        assert_eq!(bank.current_clip(), Some(id));
        assert_eq!(control.loads(), vec![id, id]);

        control.end(id);
        bank.run_turn();
        assert_eq!(second.try_outcome(), Some(PlaybackOutcome::Ended));
        assert!(!bank.contains(id));
    }

    #[test]
    fn test_failed_play_does_not_disturb_current() {
        let (mut bank, _) = bank();
        let a = ready(&mut bank, "a.mp3");
        let first = bank.play(a, true).unwrap();

        assert!(bank.play(ClipId::new(77), true).is_err());
        assert!(first.try_outcome().is_none());
        assert_eq!(bank.current_clip(), Some(a));
    }

    #[test]
    fn test_load_failure_is_swallowed_and_times_out() {
        let config = BankConfig {
            play_timeout_secs: Some(1),
            ..BankConfig::default()
        };
        let (mut bank, control) = bank_with(config);
        let id = ready(&mut bank, "a.mp3");
        control.fail_load(id);

        let completion = bank.play(id, false).unwrap();
        bank.run_turn();
        assert!(completion.try_outcome().is_none());

        bank.run_turn_at(Instant::now() + Duration::from_secs(2));
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::TimedOut));
        assert!(bank.contains(id));
        assert_eq!(bank.current_clip(), None);
    }

    #[test]
    fn test_timed_out_clip_with_auto_remove_is_removed() {
        let config = BankConfig {
            play_timeout_secs: Some(1),
            ..BankConfig::default()
        };
        let (mut bank, control) = bank_with(config);
        let events = bank.events().subscribe();
        let id = ready(&mut bank, "a.mp3");
        control.fail_load(id);

        let completion = bank.play(id, true).unwrap();
        bank.run_turn_at(Instant::now() + Duration::from_secs(2));

        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::TimedOut));
        assert!(!bank.contains(id));
        assert!(events.try_iter().any(|e| e == BankEvent::ClipRemoved(id)));
    }

    #[test]
    fn test_default_timeout_spares_long_clip() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "long.mp3");
        let completion = bank.play(id, true).unwrap();

        bank.run_turn_at(Instant::now() + Duration::from_secs(301));
        assert!(completion.try_outcome().is_none());
        assert_eq!(bank.current_clip(), Some(id));
        assert!(control.is_playing(id));

        control.end(id);
        bank.run_turn();
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Ended));
    }

    #[test]
    fn test_suspended_session_does_not_time_out() {
        let config = BankConfig {
            require_user_gesture: true,
            ..BankConfig::default()
        };
        let (mut bank, _) = bank_with(config);
        let id = ready(&mut bank, "a.mp3");
        let completion = bank.play(id, true).unwrap();

        bank.run_turn_at(Instant::now() + Duration::from_secs(301));
        assert!(completion.try_outcome().is_none());
        assert_eq!(bank.phase(), Some(PlaybackPhase::Loading));
    }

    #[test]
    fn test_disabled_timeout_waits_forever() {
        let config = BankConfig {
            play_timeout_secs: None,
            ..BankConfig::default()
        };
        let (mut bank, _) = bank_with(config);
        let id = ready(&mut bank, "a.mp3");
        let completion = bank.play(id, true).unwrap();

        bank.run_turn_at(Instant::now() + Duration::from_secs(3600));
        assert!(completion.try_outcome().is_none());
        assert_eq!(bank.current_clip(), Some(id));
    }

    #[test]
    fn test_remove_playing_clip_resolves_removed() {
        let (mut bank, control) = bank();
        let id = ready(&mut bank, "a.mp3");
        let completion = bank.play(id, true).unwrap();

        assert!(bank.remove(id));
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Removed));
        assert_eq!(bank.current_clip(), None);
        assert!(!control.is_playing(id));
        assert!(bank.sample().is_silent());
    }

    // --- Background loading ---

    #[test]
    fn test_slow_load_does_not_block_turn() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        let completion = bank.play(a, true).unwrap();

        let slow = bank.add("https://host/slow.mp3");
        control.delay_fetch(slow, Duration::from_millis(800));

        let started = Instant::now();
        bank.run_turn();
        bank.run_turn();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(bank.is_loading());
        assert_eq!(bank.status().loading, 1);

        // Emergency stop answers while the fetch is still running
        let report = bank.clear();
        assert!(started.elapsed() < Duration::from_millis(300));
        assert_eq!(report.clips, 2);
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Cleared));

        // The late fetch is dropped rather than resurrecting the clip
        finish_loads(&mut bank);
        assert!(!bank.contains(slow));
        assert!(!control.materialized().contains(&slow));
    }

    #[test]
    fn test_slow_load_does_not_delay_end_detection() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        let completion = bank.play(a, false).unwrap();

        let slow = bank.add("https://host/slow.mp3");
        control.delay_fetch(slow, Duration::from_millis(500));
        bank.run_turn();

        control.end(a);
        let started = Instant::now();
        bank.run_turn();
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Ended));

        finish_loads(&mut bank);
        assert!(bank.is_ready(slow));
    }

    #[test]
    fn test_removed_while_loading_is_not_materialized() {
        let (mut bank, control) = bank();
        let events = bank.events().subscribe();
        let id = bank.add("a.mp3");
        control.delay_fetch(id, Duration::from_millis(50));
        bank.run_turn();
        assert!(bank.remove(id));

        finish_loads(&mut bank);
        assert!(control.materialized().is_empty());
        assert!(!events.try_iter().any(|e| e == BankEvent::ClipReady(id)));
    }

    // --- Clear ---

    #[test]
    fn test_clear_during_playback() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        let b = ready(&mut bank, "b.mp3");
        bank.add(vec![0u8; 64]);

        let completion = bank.play(a, true).unwrap();
        let report = bank.clear();

        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Cleared));
        assert_eq!(report.clips, 3);
        assert_eq!(report.blobs, 1);
        assert_eq!(report.blob_bytes, 64);
        assert!(bank.is_empty());
        assert_eq!(bank.current_clip(), None);
        assert!(!control.is_playing(a));
        assert!(matches!(bank.play(b, true), Err(BankError::NotFound(_))));
    }

    #[test]
    fn test_clear_when_idle() {
        let (mut bank, _) = bank();
        ready(&mut bank, "a.mp3");
        let report = bank.clear();
        assert_eq!(report.clips, 1);
        assert!(bank.is_empty());
    }

    #[test]
    fn test_bank_usable_after_clear() {
        let (mut bank, control) = bank();
        let a = ready(&mut bank, "a.mp3");
        bank.play(a, true).unwrap();
        bank.clear();

        let b = ready(&mut bank, "b.mp3");
        let completion = bank.play(b, true).unwrap();
        bank.run_turn();
        assert!(completion.try_outcome().is_none(), "fresh token is not cancelled");

        control.end(b);
        bank.run_turn();
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Ended));
    }

    #[test]
    fn test_clear_emits_report_then_finish() {
        let (mut bank, _) = bank();
        let a = ready(&mut bank, "a.mp3");
        bank.play(a, false).unwrap();
        let events = bank.events().subscribe();

        let report = bank.clear();
        let got: Vec<BankEvent> = events.try_iter().collect();
        assert_eq!(
            got,
            vec![
                BankEvent::Cleared(report),
                BankEvent::PlaybackFinished {
                    id: a,
                    outcome: PlaybackOutcome::Cleared
                },
            ]
        );
    }

    // --- User gesture ---

    #[test]
    fn test_suspended_play_waits_for_gesture() {
        let config = BankConfig {
            require_user_gesture: true,
            ..BankConfig::default()
        };
        let (mut bank, control) = bank_with(config);
        let id = ready(&mut bank, "a.mp3");

        let completion = bank.play(id, true).unwrap();
        assert!(bank.is_suspended());
        assert_eq!(bank.phase(), Some(PlaybackPhase::Loading));
        assert!(control.plays().is_empty());

        bank.notify_user_gesture();
        assert!(!bank.is_suspended());
        assert_eq!(control.resumes(), 1);
        assert_eq!(bank.phase(), Some(PlaybackPhase::Playing));
        assert_eq!(control.plays(), vec![id]);

        control.end(id);
        bank.run_turn();
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Ended));
    }

    #[test]
    fn test_gesture_when_not_suspended_is_noop() {
        let (mut bank, control) = bank();
        bank.notify_user_gesture();
        assert_eq!(control.resumes(), 0);
    }

    // --- Status / shutdown ---

    #[test]
    fn test_status_reflects_state() {
        let (mut bank, _) = bank();
        let id = ready(&mut bank, "a.mp3");
        bank.play(id, true).unwrap();
        assert_eq!(
            bank.status(),
            BankStatus {
                clips: 1,
                loading: 0,
                current: Some(id),
                phase: Some(PlaybackPhase::Playing),
                suspended: false,
            }
        );
    }

    #[test]
    fn test_shutdown_settles_pending_completion() {
        let (mut bank, _) = bank();
        let id = ready(&mut bank, "a.mp3");
        let completion = bank.play(id, true).unwrap();
        bank.shutdown();
        assert_eq!(completion.try_outcome(), Some(PlaybackOutcome::Cleared));
        assert!(bank.is_empty());
    }

    #[test]
    fn test_sample_rate_comes_from_tap() {
        let (bank, _) = bank();
        assert_eq!(bank.sample_rate(), 44100);
    }
}
