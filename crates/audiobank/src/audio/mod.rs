//! Audio subsystem
//!
//! Clip registry with background loading, playback control, frequency
//! analysis and the sampling loop that turns the analysis into a lip-sync
//! signal.

pub mod analyzer;
pub mod backend;
pub mod bank;
pub mod controller;
pub mod engine;
pub mod estimator;
pub mod events;
pub mod loader;
pub mod registry;
#[cfg(feature = "playback")]
pub mod rodio_backend;
pub mod sampler;
pub mod types;

#[cfg(test)]
mod testing;

#[cfg(feature = "playback")]
pub use analyzer::AnalyzingSource;
pub use analyzer::{new_shared_analyzer, FrequencyAnalyzer, SharedAnalyzer};
pub use backend::{MediaBackend, MediaFetcher, PlayableHandle};
pub use bank::{AudioBank, BankStatus};
pub use controller::{CancelToken, CurrentClip, PlaybackCompletion};
pub use engine::BankEngine;
pub use estimator::SignalEstimator;
pub use events::EventBus;
pub use loader::ClipLoader;
#[cfg(feature = "playback")]
pub use rodio_backend::{FetchedClip, RodioBackend, RodioClip, RodioFetcher};
pub use sampler::{new_shared_signal, SamplingLoop, SharedSignal};
pub use types::{
    BankEvent, ClearReport, ClipId, ClipIdAllocator, ClipSource, PlaybackOutcome, PlaybackPhase,
    SignalSnapshot,
};
