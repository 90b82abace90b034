//! Shared audio types
//!
//! Pure data types used across the audio subsystem.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque identifier of a registered clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(u64);

impl ClipId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio{}", self.0)
    }
}

/// Monotonic clip id source, shareable across threads
#[derive(Debug)]
pub struct ClipIdAllocator {
    next: AtomicU64,
}

impl Default for ClipIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipIdAllocator {
    /// Ids start at 1; 0 is reserved as "no clip"
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> ClipId {
        ClipId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Where a clip's audio comes from
#[derive(Clone, PartialEq, Eq)]
pub enum ClipSource {
    /// Remote audio fetched over HTTP(S)
    Url(String),
    /// Local audio file
    File(PathBuf),
    /// Transient in-memory audio (e.g. freshly synthesized speech)
    Blob(Arc<[u8]>),
}

impl ClipSource {
    /// Parse a locator: `http://` / `https://` become URLs, anything else a file path
    pub fn parse(locator: &str) -> Self {
        if locator.starts_with("http://") || locator.starts_with("https://") {
            ClipSource::Url(locator.to_string())
        } else {
            ClipSource::File(PathBuf::from(locator))
        }
    }

    pub fn is_blob(&self) -> bool {
        matches!(self, ClipSource::Blob(_))
    }

    /// Byte length of blob-backed data, 0 otherwise
    pub fn blob_len(&self) -> usize {
        match self {
            ClipSource::Blob(bytes) => bytes.len(),
            _ => 0,
        }
    }

    /// File extension usable as a decoder hint
    pub fn extension(&self) -> Option<&str> {
        match self {
            ClipSource::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let name = path.rsplit('/').next()?;
                let (_, ext) = name.rsplit_once('.')?;
                (!ext.is_empty()).then_some(ext)
            }
            ClipSource::File(path) => path.extension().and_then(|e| e.to_str()),
            ClipSource::Blob(_) => None,
        }
    }
}

impl From<&str> for ClipSource {
    fn from(locator: &str) -> Self {
        Self::parse(locator)
    }
}

impl From<&Path> for ClipSource {
    fn from(path: &Path) -> Self {
        ClipSource::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ClipSource {
    fn from(bytes: Vec<u8>) -> Self {
        ClipSource::Blob(bytes.into())
    }
}

impl fmt::Display for ClipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipSource::Url(url) => write!(f, "{}", url),
            ClipSource::File(path) => write!(f, "{}", path.display()),
            ClipSource::Blob(bytes) => write!(f, "blob ({} bytes)", bytes.len()),
        }
    }
}

// Blob contents are elided; they can be megabytes of audio.
impl fmt::Debug for ClipSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ClipSource::File(path) => f.debug_tuple("File").field(path).finish(),
            ClipSource::Blob(bytes) => write!(f, "Blob({} bytes)", bytes.len()),
        }
    }
}

/// Volume and dominant frequency published every sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalSnapshot {
    /// Normalized volume, `(raw_average - 55) / 30`
    pub volume: f32,
    /// Estimated dominant frequency in Hz
    pub frequency: f32,
}

impl SignalSnapshot {
    pub const SILENT: SignalSnapshot = SignalSnapshot {
        volume: 0.0,
        frequency: 0.0,
    };

    pub fn is_silent(&self) -> bool {
        self.volume == 0.0 && self.frequency == 0.0
    }
}

/// Phase of a single playback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Requested,
    Loading,
    Playing,
    Ended,
    Cleared,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Requested => write!(f, "Requested"),
            PlaybackPhase::Loading => write!(f, "Loading"),
            PlaybackPhase::Playing => write!(f, "Playing"),
            PlaybackPhase::Ended => write!(f, "Ended"),
            PlaybackPhase::Cleared => write!(f, "Cleared"),
        }
    }
}

/// How a playback completion resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Clip played to its natural end
    Ended,
    /// Bank was cleared while the clip was current
    Cleared,
    /// Another `play` replaced this one
    Superseded,
    /// Clip was removed while playing
    Removed,
    /// Playback never ended within the configured timeout
    TimedOut,
}

impl fmt::Display for PlaybackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackOutcome::Ended => write!(f, "Ended"),
            PlaybackOutcome::Cleared => write!(f, "Cleared"),
            PlaybackOutcome::Superseded => write!(f, "Superseded"),
            PlaybackOutcome::Removed => write!(f, "Removed"),
            PlaybackOutcome::TimedOut => write!(f, "TimedOut"),
        }
    }
}

/// Summary of what a `clear()` released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearReport {
    /// Clips removed from the registry
    pub clips: usize,
    /// Blob-backed clips among them
    pub blobs: usize,
    /// Bytes held by those blobs
    pub blob_bytes: usize,
}

/// Events emitted by the audio bank
#[derive(Debug, Clone, PartialEq)]
pub enum BankEvent {
    ClipAdded(ClipId),
    /// Handle materialized and routed into the analysis tap
    ClipReady(ClipId),
    /// Materialization failed; the clip will never become playable
    ClipFailed { id: ClipId, reason: String },
    PlaybackStarted(ClipId),
    /// Natural end of playback
    ClipEnded(ClipId),
    /// A play completion resolved, for any reason
    PlaybackFinished {
        id: ClipId,
        outcome: PlaybackOutcome,
    },
    ClipRemoved(ClipId),
    Cleared(ClearReport),
    /// Output resumed after a user gesture
    Resumed,
}
