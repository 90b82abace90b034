//! Frequency analysis tap
//!
//! `FrequencyAnalyzer` keeps the most recent `fft_size` mono samples routed
//! into the audio graph and turns them into byte-scaled frequency bins on
//! demand. There is exactly one analyzer per bank; every clip feeds it.
//!
//! With the `playback` feature, `AnalyzingSource` wraps any
//! `rodio::Source<Item=f32>` and pushes its samples into the shared analyzer.

use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::analysis::{
    FFT_SIZE, MAX_DECIBELS, MIN_DECIBELS, SMOOTHING_TIME_CONSTANT,
};

/// Thread-safe handle to the single analysis tap
pub type SharedAnalyzer = Arc<Mutex<FrequencyAnalyzer>>;

/// Create a new shared analyzer with the default FFT size
pub fn new_shared_analyzer(sample_rate: u32) -> SharedAnalyzer {
    Arc::new(Mutex::new(FrequencyAnalyzer::new(FFT_SIZE, sample_rate)))
}

/// Byte-scaled spectrum analyzer over a sliding window of samples
pub struct FrequencyAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    sample_rate: u32,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    sample_count: u64,
    /// `sample_count` the smoothed spectrum was last computed at
    analyzed_at: Option<u64>,
}

impl FrequencyAnalyzer {
    /// Create an analyzer. `fft_size` is rounded up to a power of two (min 32).
    pub fn new(fft_size: usize, sample_rate: u32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        // Blackman window
        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / fft_size as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft,
            fft_size,
            sample_rate,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            window,
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            sample_count: 0,
            analyzed_at: None,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Called when a clip with a different native rate starts feeding the tap
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate > 0 {
            self.sample_rate = sample_rate;
        }
    }

    /// Total mono samples pushed since creation or the last reset
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Append mono samples to the sliding window
    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
        self.sample_count += samples.len() as u64;
    }

    /// Forget all buffered audio and smoothing history
    pub fn reset(&mut self) {
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.write_pos = 0;
        self.sample_count = 0;
        self.analyzed_at = None;
    }

    /// Current frequency bins scaled to `0..=255`
    pub fn byte_frequency_data(&mut self) -> Vec<u8> {
        let mut out = vec![0u8; self.bin_count()];
        self.fill_byte_frequency_data(&mut out);
        out
    }

    /// Fill `out` with as many bins as fit; extra slots are left untouched.
    ///
    /// Smoothing advances at most once per batch of new audio, so any number
    /// of readers between two pushes see the same bins.
    pub fn fill_byte_frequency_data(&mut self, out: &mut [u8]) {
        if self.analyzed_at != Some(self.sample_count) {
            self.update_spectrum();
            self.analyzed_at = Some(self.sample_count);
        }

        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (slot, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 / range * (db - MIN_DECIBELS);
            *slot = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    fn update_spectrum(&mut self) {
        // Oldest sample first: the ring starts at write_pos
        for i in 0..self.fft_size {
            let sample = self.ring[(self.write_pos + i) % self.fft_size];
            self.scratch[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        for (prev, bin) in self.smoothed.iter_mut().zip(&self.scratch) {
            let magnitude = bin.norm() * norm;
            *prev = SMOOTHING_TIME_CONSTANT * *prev + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
        }
    }
}

#[cfg(feature = "playback")]
pub use source::AnalyzingSource;

#[cfg(feature = "playback")]
mod source {
    use std::time::Duration;

    use rodio::{ChannelCount, SampleRate, Source};

    use super::SharedAnalyzer;
    use crate::config::engine::TAP_BATCH_LEN;

    /// Wrapper source that copies a mono mix of its samples into the tap
    pub struct AnalyzingSource<S> {
        inner: S,
        analyzer: SharedAnalyzer,
        channels: ChannelCount,
        sample_rate: SampleRate,
        frame: Vec<f32>,
        batch: Vec<f32>,
    }

    impl<S> AnalyzingSource<S>
    where
        S: Source<Item = f32>,
    {
        /// Create a new analyzing wrapper and point the tap at this source's rate
        pub fn new(source: S, analyzer: SharedAnalyzer) -> Self {
            let channels = source.channels();
            let sample_rate = source.sample_rate();
            if let Ok(mut tap) = analyzer.lock() {
                tap.set_sample_rate(sample_rate);
            }
            Self {
                inner: source,
                analyzer,
                channels,
                sample_rate,
                frame: Vec::with_capacity(channels.max(1) as usize),
                batch: Vec::with_capacity(TAP_BATCH_LEN),
            }
        }

        fn flush(&mut self) {
            if self.batch.is_empty() {
                return;
            }
            if let Ok(mut tap) = self.analyzer.lock() {
                tap.push_samples(&self.batch);
            }
            self.batch.clear();
        }
    }

    impl<S> Iterator for AnalyzingSource<S>
    where
        S: Source<Item = f32>,
    {
        type Item = f32;

        fn next(&mut self) -> Option<Self::Item> {
            let sample = match self.inner.next() {
                Some(s) => s,
                None => {
                    self.flush();
                    return None;
                }
            };

            self.frame.push(sample);
            if self.frame.len() >= self.channels.max(1) as usize {
                let mono = self.frame.iter().sum::<f32>() / self.frame.len() as f32;
                self.frame.clear();
                self.batch.push(mono);
                if self.batch.len() >= TAP_BATCH_LEN {
                    self.flush();
                }
            }

            Some(sample)
        }
    }

    impl<S> Source for AnalyzingSource<S>
    where
        S: Source<Item = f32>,
    {
        fn current_span_len(&self) -> Option<usize> {
            self.inner.current_span_len()
        }

        fn channels(&self) -> ChannelCount {
            self.channels
        }

        fn sample_rate(&self) -> SampleRate {
            self.sample_rate
        }

        fn total_duration(&self) -> Option<Duration> {
            self.inner.total_duration()
        }
    }

}
