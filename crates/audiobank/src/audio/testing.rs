//! Scripted media backend for tests
//!
//! Handles never touch a device. Tests drive them through `MockControl`:
//! fail or slow down fetching for given ids, fail loading, and fire the
//! "ended" signal.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::error::{BankError, Result};

use super::analyzer::{new_shared_analyzer, SharedAnalyzer};
use super::backend::{MediaBackend, MediaFetcher, PlayableHandle};
use super::types::{ClipId, ClipSource};

#[derive(Default)]
struct MockState {
    fail_materialize: HashSet<ClipId>,
    fail_load: HashSet<ClipId>,
    fetch_delays: HashMap<ClipId, Duration>,
    ended: HashSet<ClipId>,
    playing: HashSet<ClipId>,
    loads: Vec<ClipId>,
    plays: Vec<ClipId>,
    stops: Vec<ClipId>,
    materialized: Vec<ClipId>,
    resumes: usize,
}

/// Test-side remote control shared with the backend and its handles
#[derive(Clone, Default)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

impl MockControl {
    /// Make the fetch for `id` fail as an undecodable clip
    pub fn fail_materialize(&self, id: ClipId) {
        self.state.lock().unwrap().fail_materialize.insert(id);
    }

    pub fn fail_load(&self, id: ClipId) {
        self.state.lock().unwrap().fail_load.insert(id);
    }

    /// Make the fetch for `id` block its loader thread for `delay`
    pub fn delay_fetch(&self, id: ClipId, delay: Duration) {
        self.state.lock().unwrap().fetch_delays.insert(id, delay);
    }

    /// Fire the natural "ended" signal for `id`
    pub fn end(&self, id: ClipId) {
        self.state.lock().unwrap().ended.insert(id);
    }

    pub fn is_playing(&self, id: ClipId) -> bool {
        self.state.lock().unwrap().playing.contains(&id)
    }

    pub fn loads(&self) -> Vec<ClipId> {
        self.state.lock().unwrap().loads.clone()
    }

    pub fn plays(&self) -> Vec<ClipId> {
        self.state.lock().unwrap().plays.clone()
    }

    pub fn stops(&self) -> Vec<ClipId> {
        self.state.lock().unwrap().stops.clone()
    }

    pub fn materialized(&self) -> Vec<ClipId> {
        self.state.lock().unwrap().materialized.clone()
    }

    pub fn resumes(&self) -> usize {
        self.state.lock().unwrap().resumes
    }
}

pub struct MockBackend {
    control: MockControl,
    analyzer: SharedAnalyzer,
}

impl MockBackend {
    pub fn new() -> (Self, MockControl) {
        let control = MockControl::default();
        let backend = Self {
            control: control.clone(),
            analyzer: new_shared_analyzer(44100),
        };
        (backend, control)
    }
}

#[derive(Clone)]
pub struct MockFetcher {
    control: MockControl,
}

impl MediaFetcher for MockFetcher {
    type Media = ();

    fn fetch(&self, id: ClipId, source: &ClipSource) -> Result<()> {
        let (fail, delay) = {
            let state = self.control.state.lock().unwrap();
            (
                state.fail_materialize.contains(&id),
                state.fetch_delays.get(&id).copied(),
            )
        };
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if fail {
            return Err(BankError::Media(format!("cannot open {}", source)));
        }
        Ok(())
    }
}

pub struct MockHandle {
    id: ClipId,
    control: MockControl,
    loaded: bool,
}

impl PlayableHandle for MockHandle {
    fn load(&mut self) -> Result<()> {
        let mut state = self.control.state.lock().unwrap();
        state.loads.push(self.id);
        state.ended.remove(&self.id);
        if state.fail_load.contains(&self.id) {
            return Err(BankError::Media(format!("cannot decode {}", self.id)));
        }
        self.loaded = true;
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        if !self.loaded {
            return Err(BankError::Media("not loaded".to_string()));
        }
        let mut state = self.control.state.lock().unwrap();
        state.plays.push(self.id);
        state.playing.insert(self.id);
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.control.state.lock().unwrap();
        if state.playing.remove(&self.id) {
            state.stops.push(self.id);
        }
    }

    fn is_ended(&self) -> bool {
        self.loaded && self.control.state.lock().unwrap().ended.contains(&self.id)
    }
}

impl MediaBackend for MockBackend {
    type Handle = MockHandle;
    type Fetcher = MockFetcher;

    fn fetcher(&self) -> MockFetcher {
        MockFetcher {
            control: self.control.clone(),
        }
    }

    fn materialize(&mut self, id: ClipId, _media: ()) -> Result<MockHandle> {
        self.control.state.lock().unwrap().materialized.push(id);
        Ok(MockHandle {
            id,
            control: self.control.clone(),
            loaded: false,
        })
    }

    fn analyzer(&self) -> SharedAnalyzer {
        self.analyzer.clone()
    }

    fn resume(&mut self) -> Result<()> {
        self.control.state.lock().unwrap().resumes += 1;
        Ok(())
    }
}
