//! Audio bank engine
//!
//! Runs an `AudioBank` on a dedicated thread, accepting commands via
//! crossbeam channels. The latest `(volume, frequency)` is published by a
//! `SamplingLoop` and shared via `Arc<Mutex<SignalSnapshot>>`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::config::engine::COMMAND_QUEUE_LEN;
use crate::config::BankConfig;
use crate::error::{BankError, Result};

use super::backend::MediaBackend;
use super::bank::{AudioBank, BankStatus};
use super::controller::PlaybackCompletion;
use super::estimator::SignalEstimator;
use super::events::EventBus;
use super::sampler::{SamplingLoop, SharedSignal};
use super::types::{BankEvent, ClearReport, ClipId, ClipIdAllocator, ClipSource, SignalSnapshot};

/// Commands sent to the engine thread
enum Command {
    Add { id: ClipId, source: ClipSource },
    Remove(ClipId),
    Clear(Sender<ClearReport>),
    Play {
        id: ClipId,
        auto_remove: bool,
        reply: Sender<Result<PlaybackCompletion>>,
    },
    UserGesture,
    Status(Sender<BankStatus>),
    Shutdown,
}

/// Audio bank running on its own thread
pub struct BankEngine {
    cmd_tx: Sender<Command>,
    ids: Arc<ClipIdAllocator>,
    events: Arc<EventBus>,
    sampler: SamplingLoop,
    thread: Option<JoinHandle<()>>,
}

impl BankEngine {
    /// Spawn the engine thread and build the backend on it.
    ///
    /// Blocks until the backend is initialized (or fails).
    pub fn new<B, F>(config: BankConfig, factory: F) -> Result<Self>
    where
        B: MediaBackend + 'static,
        F: FnOnce() -> Result<B> + Send + 'static,
    {
        config.validate()?;

        let (cmd_tx, cmd_rx) = bounded::<Command>(COMMAND_QUEUE_LEN);
        let (init_tx, init_rx) = bounded::<Result<(SignalEstimator, Arc<EventBus>)>>(1);

        let ids = Arc::new(ClipIdAllocator::new());
        let ids_thread = ids.clone();
        let sampling_interval = config.sampling_interval();

        let thread = thread::Builder::new()
            .name("audiobank-engine".to_string())
            .spawn(move || {
                // Audio output streams may be !Send, so the backend is built here
                let backend = match factory() {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::error!("failed to initialize media backend: {}", e);
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };
                let bank = AudioBank::with_allocator(backend, &config, ids_thread);
                let _ = init_tx.send(Ok((bank.estimator(), bank.events())));

                Self::run(bank, cmd_rx, config.turn_interval());
            })
            .map_err(|e| BankError::Engine(format!("Failed to spawn engine thread: {}", e)))?;

        // Wait for initialization
        let (estimator, events) = init_rx
            .recv()
            .map_err(|_| BankError::Engine("Engine thread terminated during init".to_string()))??;

        let sampler = match SamplingLoop::start(estimator, sampling_interval) {
            Ok(s) => s,
            Err(e) => {
                let _ = cmd_tx.send(Command::Shutdown);
                let _ = thread.join();
                return Err(e);
            }
        };

        tracing::info!("audio bank engine started");

        Ok(Self {
            cmd_tx,
            ids,
            events,
            sampler,
            thread: Some(thread),
        })
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| BankError::Engine("Engine thread is not running".to_string()))
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(make(reply_tx))?;
        reply_rx
            .recv()
            .map_err(|_| BankError::Engine("Engine thread terminated".to_string()))
    }

    /// Register a clip. The id is returned immediately; the clip becomes
    /// playable after the engine's next turn (see `BankEvent::ClipReady`).
    pub fn add(&self, source: impl Into<ClipSource>) -> ClipId {
        let id = self.ids.next_id();
        if let Err(e) = self.send(Command::Add {
            id,
            source: source.into(),
        }) {
            tracing::warn!(%id, "add dropped: {}", e);
        }
        id
    }

    /// Remove a clip. Unknown ids are a no-op.
    pub fn remove(&self, id: ClipId) {
        let _ = self.send(Command::Remove(id));
    }

    pub fn clear(&self) -> Result<ClearReport> {
        self.request(Command::Clear)
    }

    /// Start playing `id`; the completion settles when playback finishes
    pub fn play(&self, id: ClipId, auto_remove: bool) -> Result<PlaybackCompletion> {
        self.request(|reply| Command::Play {
            id,
            auto_remove,
            reply,
        })?
    }

    pub fn notify_user_gesture(&self) {
        let _ = self.send(Command::UserGesture);
    }

    pub fn status(&self) -> Result<BankStatus> {
        self.request(Command::Status)
    }

    /// Latest published `(volume, frequency)`
    pub fn sample(&self) -> SignalSnapshot {
        self.sampler.latest()
    }

    pub fn volume(&self) -> f32 {
        self.sample().volume
    }

    pub fn frequency(&self) -> f32 {
        self.sample().frequency
    }

    /// Get a handle to the shared signal snapshot
    pub fn signal(&self) -> SharedSignal {
        self.sampler.signal()
    }

    pub fn subscribe(&self) -> Receiver<BankEvent> {
        self.events.subscribe()
    }

    /// Get a handle to the event bus
    pub fn event_bus(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Graceful shutdown (consumes self)
    pub fn shutdown(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.cmd_tx.send(Command::Shutdown);
            let _ = thread.join();
            tracing::info!("audio bank engine stopped");
        }
        self.sampler.stop();
    }

    /// The engine's main loop, running on the dedicated thread
    fn run<B: MediaBackend>(
        mut bank: AudioBank<B>,
        cmd_rx: Receiver<Command>,
        turn_interval: Duration,
    ) {
        let mut running = true;

        while running {
            match cmd_rx.recv_timeout(turn_interval) {
                Ok(cmd) => {
                    running = Self::handle(&mut bank, cmd);
                    // Drain whatever else is queued before the next turn
                    while running {
                        match cmd_rx.try_recv() {
                            Ok(cmd) => running = Self::handle(&mut bank, cmd),
                            Err(TryRecvError::Empty) => break,
                            Err(TryRecvError::Disconnected) => running = false,
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => running = false,
            }

            if running {
                bank.run_turn();
            }
        }

        bank.shutdown();
    }

    /// Apply one command; `false` stops the loop
    fn handle<B: MediaBackend>(bank: &mut AudioBank<B>, cmd: Command) -> bool {
        match cmd {
            Command::Add { id, source } => bank.register(id, source),
            Command::Remove(id) => {
                bank.remove(id);
            }
            Command::Clear(reply) => {
                let _ = reply.send(bank.clear());
            }
            Command::Play {
                id,
                auto_remove,
                reply,
            } => {
                let result = bank.play(id, auto_remove);
                if let Err(ref e) = result {
                    tracing::debug!(%id, "play rejected: {}", e);
                }
                let _ = reply.send(result);
            }
            Command::UserGesture => bank.notify_user_gesture(),
            Command::Status(reply) => {
                let _ = reply.send(bank.status());
            }
            Command::Shutdown => return false,
        }
        true
    }
}

impl Drop for BankEngine {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
