//! Media backend seam
//!
//! The bank never touches an audio device directly. A `MediaBackend` turns
//! fetched media into a `PlayableHandle` whose output is routed into the
//! backend's single analysis tap. Fetching and decoding is split out into a
//! `MediaFetcher` so it can run off the engine thread.

use crate::config::analysis::DEFAULT_SAMPLE_RATE;
use crate::error::Result;

use super::analyzer::SharedAnalyzer;
use super::types::{ClipId, ClipSource};

/// One materialized clip
pub trait PlayableHandle {
    /// Prepare playback from the start (decode, attach to the output)
    fn load(&mut self) -> Result<()>;

    /// Start or resume output
    fn play(&mut self) -> Result<()>;

    /// Halt output and detach from the graph. Idempotent.
    fn stop(&mut self);

    /// True once a loaded clip has played to its natural end
    fn is_ended(&self) -> bool;
}

/// Slow half of materialization: network, disk and a probe decode.
///
/// Runs on a loader thread, so it must not touch the audio device.
pub trait MediaFetcher: Clone + Send + 'static {
    type Media: Send + 'static;

    fn fetch(&self, id: ClipId, source: &ClipSource) -> Result<Self::Media>;
}

/// Owner of the audio graph and its analysis tap
pub trait MediaBackend {
    type Handle: PlayableHandle;
    type Fetcher: MediaFetcher;

    /// Fetcher handed to loader threads
    fn fetcher(&self) -> Self::Fetcher;

    /// Wrap fetched media in a playable handle connected to the tap.
    /// Called on the engine thread; must be cheap.
    fn materialize(
        &mut self,
        id: ClipId,
        media: <Self::Fetcher as MediaFetcher>::Media,
    ) -> Result<Self::Handle>;

    /// The single analysis tap every handle feeds
    fn analyzer(&self) -> SharedAnalyzer;

    /// Sample rate the tap currently assumes for bin-to-Hz mapping
    fn sample_rate(&self) -> u32 {
        self.analyzer()
            .lock()
            .map(|tap| tap.sample_rate())
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Lift an autoplay suspension after a user gesture
    fn resume(&mut self) -> Result<()> {
        Ok(())
    }
}
