//! Device backend on top of rodio
//!
//! Every clip gets its own `Sink` on the default output mixer. Decoded audio
//! passes through an `AnalyzingSource` so the shared tap hears whatever is
//! playing. Downloads and the probe decode run in `RodioFetcher` on loader
//! threads; only sink creation happens on the engine thread.

use std::io::Cursor;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

use crate::config::BankConfig;
use crate::error::{BankError, Result};
use crate::network::HttpClient;

use super::analyzer::{new_shared_analyzer, AnalyzingSource, SharedAnalyzer};
use super::backend::{MediaBackend, MediaFetcher, PlayableHandle};
use super::types::{ClipId, ClipSource};

/// Encoded audio that decoded cleanly once
pub struct FetchedClip {
    bytes: Arc<[u8]>,
    hint: Option<String>,
}

/// Fetches clip bytes and probes them; cheap to clone into loader threads
#[derive(Clone)]
pub struct RodioFetcher {
    http: HttpClient,
}

impl RodioFetcher {
    fn read(&self, source: &ClipSource) -> Result<Arc<[u8]>> {
        match source {
            ClipSource::Url(url) => Ok(self.http.get_bytes(url)?.into()),
            ClipSource::File(path) => Ok(std::fs::read(path)?.into()),
            ClipSource::Blob(bytes) => Ok(bytes.clone()),
        }
    }
}

impl MediaFetcher for RodioFetcher {
    type Media = FetchedClip;

    fn fetch(&self, id: ClipId, source: &ClipSource) -> Result<FetchedClip> {
        let clip = FetchedClip {
            bytes: self.read(source)?,
            hint: source.extension().map(str::to_ascii_lowercase),
        };

        // Probe once so undecodable clips fail here rather than at play time
        let probe = decode(id, &clip)?;
        tracing::debug!(
            %id,
            channels = probe.channels(),
            sample_rate = probe.sample_rate(),
            hint = clip.hint.as_deref().unwrap_or("-"),
            "clip decoded"
        );
        Ok(clip)
    }
}

fn decode(id: ClipId, clip: &FetchedClip) -> Result<Decoder<Cursor<Arc<[u8]>>>> {
    let mut builder = Decoder::builder()
        .with_data(Cursor::new(clip.bytes.clone()))
        .with_byte_len(clip.bytes.len() as u64);
    if let Some(hint) = clip.hint.as_deref() {
        builder = builder.with_hint(hint);
    }
    builder
        .build()
        .map_err(|e| BankError::Media(format!("Cannot decode {}: {}", id, e)))
}

/// Default output device plus the analysis tap
pub struct RodioBackend {
    stream: OutputStream,
    analyzer: SharedAnalyzer,
    fetcher: RodioFetcher,
}

impl RodioBackend {
    /// Open the default output device
    pub fn open(config: &BankConfig) -> Result<Self> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| BankError::Media(format!("Failed to open audio output: {}", e)))?;
        stream.log_on_drop(false);

        Ok(Self {
            stream,
            analyzer: new_shared_analyzer(config.sample_rate),
            fetcher: RodioFetcher {
                http: HttpClient::new()?,
            },
        })
    }
}

impl MediaBackend for RodioBackend {
    type Handle = RodioClip;
    type Fetcher = RodioFetcher;

    fn fetcher(&self) -> RodioFetcher {
        self.fetcher.clone()
    }

    fn materialize(&mut self, id: ClipId, clip: FetchedClip) -> Result<RodioClip> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();

        Ok(RodioClip {
            id,
            clip,
            sink,
            analyzer: self.analyzer.clone(),
            loaded: false,
        })
    }

    fn analyzer(&self) -> SharedAnalyzer {
        self.analyzer.clone()
    }
}

/// One clip bound to its own paused sink
pub struct RodioClip {
    id: ClipId,
    clip: FetchedClip,
    sink: Sink,
    analyzer: SharedAnalyzer,
    loaded: bool,
}

impl PlayableHandle for RodioClip {
    fn load(&mut self) -> Result<()> {
        // Leaves the sink empty and paused
        self.sink.clear();
        self.loaded = false;

        let decoder = decode(self.id, &self.clip)?;
        self.sink
            .append(AnalyzingSource::new(decoder, self.analyzer.clone()));
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            return Err(BankError::Media(format!("{} is not loaded", self.id)));
        }
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.clear();
        self.loaded = false;
    }

    fn is_ended(&self) -> bool {
        self.loaded && !self.sink.is_paused() && self.sink.empty()
    }
}

impl Drop for RodioClip {
    fn drop(&mut self) {
        self.sink.stop();
    }
}
