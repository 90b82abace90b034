//! Configuration for the audio bank
//!
//! Compile-time defaults live in the nested constant modules; `BankConfig` is
//! the runtime configuration loaded from TOML.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BankError, Result};

/// Frequency-analysis configuration
pub mod analysis {
    /// FFT window size of the analysis tap
    pub const FFT_SIZE: usize = 256;

    /// Number of frequency bins exposed to the estimator (half the FFT size)
    pub const BIN_COUNT: usize = FFT_SIZE / 2;

    /// Power level mapped to byte value 0
    pub const MIN_DECIBELS: f32 = -100.0;

    /// Power level mapped to byte value 255
    pub const MAX_DECIBELS: f32 = -30.0;

    /// Weight of the previous frame when smoothing magnitudes (0.0-1.0)
    pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;

    /// Sample rate assumed until a clip reports its own
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
}

/// Signal-estimation configuration
pub mod signal {
    /// Raw average subtracted before scaling (empirical)
    pub const VOLUME_OFFSET: f32 = 55.0;

    /// Divisor applied after the offset (empirical)
    pub const VOLUME_SCALE: f32 = 30.0;

    /// Sampling loop cadence in milliseconds
    pub const SAMPLING_INTERVAL_MS: u64 = 10;
}

/// Engine thread configuration
pub mod engine {
    /// Idle wake-up interval of the engine loop in milliseconds
    pub const TURN_INTERVAL_MS: u64 = 20;

    /// Bounded command queue length
    pub const COMMAND_QUEUE_LEN: usize = 64;

    /// Samples pushed into the analysis tap per lock
    pub const TAP_BATCH_LEN: usize = 64;
}

/// Network-related configuration
pub mod network {
    /// User agent for HTTP requests
    pub const USER_AGENT: &str = concat!("Audiobank/", env!("CARGO_PKG_VERSION"));

    /// Connection timeout in seconds
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Read timeout in seconds
    pub const READ_TIMEOUT_SECS: u64 = 30;
}

/// Timeout configuration
pub mod timeouts {
    /// How long a session whose media failed waits before resolving as timed out
    pub const PLAY_TIMEOUT_SECS: u64 = 300;
}

/// File names searched by [`BankConfig::load`], in order
const CONFIG_PATHS: [&str; 2] = ["audiobank.toml", "config/audiobank.toml"];

/// Runtime configuration of the audio bank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Sample rate used for bin-to-Hz mapping until a clip reports its own
    pub sample_rate: u32,

    /// Sampling loop cadence
    pub sampling_interval_ms: u64,

    /// Engine idle wake-up interval
    pub turn_interval_ms: u64,

    /// Timeout for sessions whose load or play failed; `None` or `0` waits
    /// forever. Healthy playback is never cut off.
    pub play_timeout_secs: Option<u64>,

    /// Clamp the normalized volume to `[0, 1]`
    pub clamp_volume: bool,

    /// Start suspended until `notify_user_gesture` is called
    pub require_user_gesture: bool,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            sample_rate: analysis::DEFAULT_SAMPLE_RATE,
            sampling_interval_ms: signal::SAMPLING_INTERVAL_MS,
            turn_interval_ms: engine::TURN_INTERVAL_MS,
            play_timeout_secs: Some(timeouts::PLAY_TIMEOUT_SECS),
            clamp_volume: false,
            require_user_gesture: false,
        }
    }
}

impl FromStr for BankConfig {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| BankError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl BankConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BankError::Config(format!("{}: {}", path.display(), e)))?;
        contents.parse()
    }

    /// Load from an explicit path, or from the first default path that exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::info!("Loading config from: {}", path.display());
            return Self::from_file(path);
        }

        for path in CONFIG_PATHS.iter().map(PathBuf::from) {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(&path);
            }
        }

        tracing::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(BankError::Config(
                "sample_rate must be greater than 0".to_string(),
            ));
        }
        if self.sampling_interval_ms == 0 {
            return Err(BankError::Config(
                "sampling_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.turn_interval_ms == 0 {
            return Err(BankError::Config(
                "turn_interval_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.sampling_interval_ms)
    }

    pub fn turn_interval(&self) -> Duration {
        Duration::from_millis(self.turn_interval_ms)
    }

    /// Effective playback timeout (`0` disables it)
    pub fn play_timeout(&self) -> Option<Duration> {
        self.play_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}
