//! Audiobank: Clip Playback for Avatar Lip Sync
//!
//! Registers audio clips, plays them one at a time, and publishes a coarse
//! volume and dominant-frequency estimate of whatever is playing.
//!
//! ## Quick start
//!
//! ```ignore
//! use audiobank::audio::{BankEngine, RodioBackend};
//! use audiobank::config::BankConfig;
//!
//! let config = BankConfig::default();
//! let backend_config = config.clone();
//! let engine = BankEngine::new(config, move || RodioBackend::open(&backend_config))?;
//! let id = engine.add("voice/hello.mp3");
//! # Ok::<(), audiobank::error::BankError>(())
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod network;
