//! Volume and pitch estimation from frequency bins
//!
//! The estimate is deliberately coarse: volume is the mean bin energy pushed
//! through an empirical offset/scale, and "pitch" is the centre frequency of
//! the loudest bin. Good enough to open a mouth, not to tune a guitar.

use crate::config::signal::{VOLUME_OFFSET, VOLUME_SCALE};

use super::analyzer::SharedAnalyzer;
use super::controller::CurrentClip;
use super::types::SignalSnapshot;

/// Raw statistics of one bin snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinStats {
    /// Arithmetic mean of all bins (0-255 scale)
    pub raw_volume: f32,
    /// Index of the first bin holding the maximum energy
    pub dominant_bin: usize,
    pub bin_count: usize,
}

/// Mean energy and dominant bin, or `None` for an empty snapshot
pub fn bin_stats(bins: &[u8]) -> Option<BinStats> {
    if bins.is_empty() {
        return None;
    }

    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    let raw_volume = sum as f32 / bins.len() as f32;

    // Strictly-greater keeps the first occurrence on ties; an all-zero
    // snapshot reports bin 0.
    let mut max_value = 0u8;
    let mut dominant_bin = 0usize;
    for (i, &b) in bins.iter().enumerate() {
        if b > max_value {
            max_value = b;
            dominant_bin = i;
        }
    }

    Some(BinStats {
        raw_volume,
        dominant_bin,
        bin_count: bins.len(),
    })
}

/// `(raw - 55) / 30`
pub fn normalize_volume(raw: f32) -> f32 {
    (raw - VOLUME_OFFSET) / VOLUME_SCALE
}

/// Map a bin index onto `[0, sample_rate / 2]`, assuming evenly spaced bins
pub fn bin_to_frequency(index: usize, bin_count: usize, sample_rate: u32) -> f32 {
    if bin_count == 0 {
        return 0.0;
    }
    index as f32 / bin_count as f32 * (sample_rate as f32 / 2.0)
}

/// Estimate the published signal from one bin snapshot
pub fn estimate(bins: &[u8], sample_rate: u32) -> SignalSnapshot {
    match bin_stats(bins) {
        Some(stats) => SignalSnapshot {
            volume: normalize_volume(stats.raw_volume),
            frequency: bin_to_frequency(stats.dominant_bin, stats.bin_count, sample_rate),
        },
        None => SignalSnapshot::SILENT,
    }
}

/// Reads the shared analysis tap on behalf of whichever clip is current
#[derive(Clone)]
pub struct SignalEstimator {
    analyzer: SharedAnalyzer,
    current: CurrentClip,
    clamp_volume: bool,
    bins: Vec<u8>,
}

impl SignalEstimator {
    pub fn new(analyzer: SharedAnalyzer, current: CurrentClip) -> Self {
        Self {
            analyzer,
            current,
            clamp_volume: false,
            bins: Vec::new(),
        }
    }

    /// Clamp the normalized volume to `[0, 1]`
    pub fn with_clamp(mut self, clamp_volume: bool) -> Self {
        self.clamp_volume = clamp_volume;
        self
    }

    /// Current `(volume, frequency)`; silent when no clip is current.
    ///
    /// Never blocks on playback state and never panics: a poisoned tap reads
    /// as silence.
    pub fn sample(&mut self) -> SignalSnapshot {
        if self.current.get().is_none() {
            return SignalSnapshot::SILENT;
        }

        let sample_rate = match self.analyzer.lock() {
            Ok(mut tap) => {
                self.bins.resize(tap.bin_count(), 0);
                tap.fill_byte_frequency_data(&mut self.bins);
                tap.sample_rate()
            }
            Err(_) => return SignalSnapshot::SILENT,
        };

        let mut snapshot = estimate(&self.bins, sample_rate);
        if self.clamp_volume {
            snapshot.volume = snapshot.volume.clamp(0.0, 1.0);
        }
        snapshot
    }
}
