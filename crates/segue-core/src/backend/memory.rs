//! Simulated in-process backend.
//!
//! Keeps just enough transport state to answer the query half of the
//! contract, records every request, and can be told to fail. Time only moves
//! when [`MemoryBackend::advance`] is called, which makes it usable both from
//! the CLI driver and from deterministic tests.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{BackendSignal, TrackBackend};
use crate::error::{BackendError, BackendResult};
use crate::models::{Generation, TrackId};

const DEFAULT_DURATION: f64 = 180.0;

/// A request the backend received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Play(TrackId),
    Pause,
    Resume,
    Stop,
    Seek { position: f64, resume_after: bool },
    SetVolume(f32),
}

#[derive(Debug)]
struct Inner {
    track: Option<TrackId>,
    generation: Generation,
    paused: bool,
    ended: bool,
    progress: f64,
    duration: f64,
    volume: f32,
    default_duration: f64,
    durations: HashMap<TrackId, f64>,
    missing: HashSet<TrackId>,
    fail_next: Option<BackendError>,
    calls: Vec<BackendCall>,
}

#[derive(Debug)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_DURATION)
    }

    /// Every track lasts `seconds` unless overridden per track.
    pub fn with_default_duration(seconds: f64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                track: None,
                generation: Generation::default(),
                paused: false,
                ended: false,
                progress: 0.0,
                duration: 0.0,
                volume: 1.0,
                default_duration: seconds,
                durations: HashMap::new(),
                missing: HashSet::new(),
                fail_next: None,
                calls: Vec::new(),
            }),
        }
    }

    pub fn set_track_duration(&self, id: TrackId, seconds: f64) {
        self.inner.lock().durations.insert(id, seconds);
    }

    /// `play_track(id)` will fail with `NotFound` from now on.
    pub fn mark_missing(&self, id: TrackId) {
        self.inner.lock().missing.insert(id);
    }

    /// The next request of any kind fails with `err`.
    pub fn fail_next(&self, err: BackendError) {
        self.inner.lock().fail_next = Some(err);
    }

    /// Pretend a track is already loaded, as after an app restart where the
    /// engine kept its last file open.
    pub fn preload(&self, id: TrackId, progress: f64) {
        let mut inner = self.inner.lock();
        inner.track = Some(id);
        inner.duration = inner.durations.get(&id).copied().unwrap_or(inner.default_duration);
        inner.progress = progress;
        inner.paused = false;
        inner.ended = false;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn current(&self) -> Option<TrackId> {
        self.inner.lock().track
    }

    pub fn generation(&self) -> Generation {
        self.inner.lock().generation
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    pub fn volume(&self) -> f32 {
        self.inner.lock().volume
    }

    /// Move the clock forward by `seconds` of playback and return the
    /// signals a real engine would have emitted.
    pub fn advance(&self, seconds: f64) -> Vec<BackendSignal> {
        let mut inner = self.inner.lock();
        if inner.track.is_none() || inner.paused || inner.ended {
            return Vec::new();
        }

        let generation = inner.generation;
        inner.progress = (inner.progress + seconds).min(inner.duration);
        let mut signals = vec![BackendSignal::Progress {
            generation,
            seconds: inner.progress,
        }];
        if inner.progress >= inner.duration {
            inner.ended = true;
            signals.push(BackendSignal::TrackEnded { generation });
        }
        signals
    }

    /// Jump to the end of the current track.
    pub fn finish(&self) -> Option<BackendSignal> {
        let mut inner = self.inner.lock();
        inner.track?;
        inner.progress = inner.duration;
        inner.ended = true;
        Some(BackendSignal::TrackEnded {
            generation: inner.generation,
        })
    }

    fn record(&self, call: BackendCall) -> BackendResult<parking_lot::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock();
        inner.calls.push(call);
        let failure = inner.fail_next.take();
        match failure {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }
}

impl TrackBackend for MemoryBackend {
    fn play_track(&self, id: TrackId, generation: Generation) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::Play(id))?;
        if inner.missing.contains(&id) {
            return Err(BackendError::NotFound(id));
        }
        inner.track = Some(id);
        inner.generation = generation;
        inner.duration = inner.durations.get(&id).copied().unwrap_or(inner.default_duration);
        inner.progress = 0.0;
        inner.paused = false;
        inner.ended = false;
        Ok(())
    }

    fn pause_track(&self) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::Pause)?;
        inner.paused = true;
        Ok(())
    }

    fn resume_track(&self) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::Resume)?;
        if inner.track.is_none() {
            return Err(BackendError::Other("nothing to resume".into()));
        }
        inner.paused = false;
        Ok(())
    }

    fn stop_player(&self) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::Stop)?;
        inner.track = None;
        inner.progress = 0.0;
        inner.duration = 0.0;
        inner.ended = false;
        Ok(())
    }

    fn seek_track(&self, position: f64, resume_after: bool) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::Seek {
            position,
            resume_after,
        })?;
        if inner.track.is_none() {
            return Err(BackendError::Other("nothing to seek".into()));
        }
        inner.progress = position.clamp(0.0, inner.duration);
        inner.ended = false;
        if resume_after {
            inner.paused = false;
        }
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> BackendResult<()> {
        let mut inner = self.record(BackendCall::SetVolume(volume))?;
        inner.volume = volume;
        Ok(())
    }

    fn duration(&self) -> f64 {
        self.inner.lock().duration
    }

    fn progress(&self) -> f64 {
        self.inner.lock().progress
    }

    fn has_track(&self) -> bool {
        self.inner.lock().track.is_some()
    }

    fn has_ended(&self) -> bool {
        self.inner.lock().ended
    }
}
