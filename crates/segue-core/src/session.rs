//! Playback session: the transport state machine.
//!
//! Owns the current track, pause/progress/volume/loop state and the queue,
//! and reconciles them with the Track Backend. Every mutation is written to
//! the state store before the call returns. Backend failures go to the
//! notification sink; whatever state was already applied stays applied.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendSignal, TrackBackend};
use crate::config::SessionConfig;
use crate::error::BackendError;
use crate::keys;
use crate::models::{Direction, Generation, LoopMode, MediaKey, PlaybackCommand, TrackId, TransportState};
use crate::notify::{Category, Notification, NotificationSink};
use crate::persist::{save_field, PersistedSession};
use crate::queue::{QueueModel, QueueSnapshot};
use crate::store::StateStore;
use crate::sync::PausePeer;

/// Observable state for UI surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub current_track: Option<TrackId>,
    pub paused: bool,
    pub progress: f64,
    pub volume: f32,
    pub loop_mode: LoopMode,
    pub shuffled: bool,
    pub state: TransportState,
    pub queue: QueueSnapshot,
}

pub struct Session {
    config: SessionConfig,
    queue: QueueModel,
    backend: Arc<dyn TrackBackend>,
    store: Arc<dyn StateStore>,
    notifier: Arc<dyn NotificationSink>,
    peer: Option<PausePeer>,

    current_track: Option<TrackId>,
    paused: bool,
    progress: f64,
    volume: f32,
    loop_mode: LoopMode,

    /// UI is dragging the seek bar; backend progress reports are dropped.
    seek_held: bool,
    /// Bumped on every play request; signals from older ones are stale.
    generation: Generation,
    /// Volume changed since the last tick flush.
    volume_dirty: bool,
}

impl Session {
    /// Restore a session from `store`. Starts paused regardless of what was
    /// playing before; call [`Session::initial_load`] to sync the backend.
    pub fn new(
        config: SessionConfig,
        backend: Arc<dyn TrackBackend>,
        store: Arc<dyn StateStore>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let persisted = PersistedSession::load(&*store, &config);
        let mut queue = QueueModel::new();
        queue.restore(persisted.queue);

        Self {
            config,
            queue,
            backend,
            store,
            notifier,
            peer: None,
            current_track: persisted.current_track,
            paused: true,
            progress: persisted.progress,
            volume: persisted.volume,
            loop_mode: persisted.loop_mode,
            seek_held: false,
            generation: Generation::default(),
            volume_dirty: false,
        }
    }

    /// Join a pause-sync bus as one surface.
    pub fn with_peer(mut self, peer: PausePeer) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Use a deterministic shuffle source.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        let mut queue = QueueModel::with_seed(seed);
        queue.restore(self.queue.snapshot());
        self.queue = queue;
        self
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    pub fn handle_command(&mut self, cmd: PlaybackCommand) {
        match cmd {
            PlaybackCommand::SetTrack { id } => self.set_track(id),
            PlaybackCommand::TogglePlayPause => self.toggle_play_pause(),
            PlaybackCommand::Skip { direction } => self.skip(direction),
            PlaybackCommand::SetProgress { position, held } => self.set_progress(position, held),
            PlaybackCommand::HoldSeek { held } => self.set_seek_held(held),
            PlaybackCommand::SetVolume { volume } => self.set_volume(volume),
            PlaybackCommand::CycleLoop => self.cycle_loop(),
            PlaybackCommand::Shuffle => {
                self.shuffle();
            }
            PlaybackCommand::EnqueueNext { id } => self.enqueue_next(id),
            PlaybackCommand::LoadContext { tracks, start } => self.load_context(tracks, start),
            PlaybackCommand::InitialLoad => self.initial_load(),
            PlaybackCommand::Reset => self.reset(),
        }
    }

    pub fn handle_signal(&mut self, signal: BackendSignal) {
        if signal.generation() != self.generation {
            log::debug!(
                "segue: dropping {:?} from stale generation (current {:?})",
                signal,
                self.generation
            );
            return;
        }
        match signal {
            BackendSignal::Progress { seconds, .. } => self.progress_update(seconds),
            BackendSignal::TrackEnded { .. } => self.song_ended(),
        }
    }

    pub fn handle_media_key(&mut self, key: MediaKey) {
        match key {
            MediaKey::Play if self.paused => self.toggle_play_pause(),
            MediaKey::Pause if !self.paused => self.toggle_play_pause(),
            MediaKey::Play | MediaKey::Pause => {}
            MediaKey::Next => self.skip(Direction::Forward),
            MediaKey::Previous => self.skip(Direction::Backward),
            MediaKey::SeekTo { position } => self.set_progress(position, false),
            MediaKey::SeekBy { offset } => {
                let mut target = (self.progress + offset).max(0.0);
                let duration = self.backend.duration();
                if duration > 0.0 {
                    target = target.min(duration);
                }
                self.set_progress(target, false);
            }
            MediaKey::Volume { volume } => self.set_volume(volume),
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    /// Stop whatever is playing and start `track` from 0.
    pub fn set_track(&mut self, track: TrackId) {
        if let Err(e) = self.backend.stop_player() {
            self.report("stop", e);
            return;
        }

        self.generation = self.generation.next();
        self.current_track = Some(track);
        self.progress = 0.0;
        self.save(keys::CURRENT_TRACK, &self.current_track);
        self.save(keys::PROGRESS, &self.progress);

        match self.backend.play_track(track, self.generation) {
            Ok(()) => self.set_paused(false),
            Err(e) => {
                // The stop above already unloaded the old track.
                self.set_paused(true);
                self.report("play", e);
            }
        }
    }

    pub fn toggle_play_pause(&mut self) {
        if !self.backend.has_track() {
            match self.current_track {
                Some(track) => self.set_track(track),
                None => self.set_paused(true),
            }
            return;
        }

        if self.paused {
            match self.backend.resume_track() {
                Ok(()) => self.set_paused(false),
                Err(e) => self.report("resume", e),
            }
        } else {
            match self.backend.pause_track() {
                Ok(()) => self.set_paused(true),
                Err(e) => self.report("pause", e),
            }
        }
    }

    /// User skip. Leaves track-loop for queue-loop so the skip sticks.
    pub fn skip(&mut self, direction: Direction) {
        if self.loop_mode == LoopMode::Track {
            self.loop_mode = LoopMode::Queue;
            self.save(keys::LOOP_MODE, &self.loop_mode);
        }

        match self.queue.advance(direction) {
            Some(track) => {
                self.save_queue();
                self.set_track(track);
            }
            None => log::debug!("segue: skip on empty queue ignored"),
        }
    }

    /// The backend finished the current track.
    fn song_ended(&mut self) {
        match self.loop_mode {
            LoopMode::Track => match self.current_track {
                Some(track) => self.set_track(track),
                None => self.toggle_play_pause(),
            },
            LoopMode::Queue if !self.queue.is_empty() => self.skip(Direction::Forward),
            _ if self.queue.has_upcoming() => self.skip(Direction::Forward),
            _ => self.toggle_play_pause(),
        }
    }

    fn progress_update(&mut self, seconds: f64) {
        if self.seek_held {
            return;
        }
        self.progress = seconds;
        self.save(keys::PROGRESS, &self.progress);
    }

    /// Seek request from the UI. `held` means the user is still dragging.
    pub fn set_progress(&mut self, position: f64, held: bool) {
        if held || !position.is_finite() {
            return;
        }
        let position = position.max(0.0);
        match self.backend.seek_track(position, !self.paused) {
            Ok(()) => {
                self.progress = position;
                self.save(keys::PROGRESS, &self.progress);
            }
            Err(e) => self.report("seek", e),
        }
    }

    pub fn set_seek_held(&mut self, held: bool) {
        self.seek_held = held;
    }

    /// Store the new volume now; the backend sees it at the end of the tick.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            return;
        }
        self.volume = volume.clamp(0.0, 1.0);
        self.volume_dirty = true;
        self.save(keys::VOLUME, &self.volume);
    }

    /// `none -> queue -> track -> none`.
    pub fn cycle_loop(&mut self) {
        self.loop_mode = self.loop_mode.cycled();
        self.save(keys::LOOP_MODE, &self.loop_mode);
    }

    /// Push persisted state into a freshly started backend.
    pub fn initial_load(&mut self) {
        if let Err(e) = self.backend.pause_track() {
            self.report("pause", e);
        }
        self.set_paused(true);

        if self.backend.duration() != 0.0 {
            if let Err(e) = self.backend.seek_track(self.progress, false) {
                self.report("seek", e);
            }
        }

        if let Err(e) = self.backend.set_volume(self.volume) {
            self.report("set volume", e);
        }
        self.volume_dirty = false;
    }

    /// Back to a fresh session: no track, paused, empty queue.
    pub fn reset(&mut self) {
        if let Err(e) = self.backend.stop_player() {
            self.report("stop", e);
        }

        let defaults = PersistedSession::defaults(&self.config);
        self.generation = self.generation.next();
        self.current_track = defaults.current_track;
        self.progress = defaults.progress;
        self.volume = defaults.volume;
        self.loop_mode = defaults.loop_mode;
        self.queue.clear();
        self.seek_held = false;
        self.volume_dirty = true;
        self.set_paused(true);

        if let Err(e) = defaults.save(&*self.store) {
            log::warn!("segue: persisting reset failed: {}", e);
            self.notifier
                .notify(Notification::warning(Category::Storage, format!("saving state failed: {e}")));
        }
    }

    /// Flush coalesced work and apply pause messages from sibling surfaces.
    /// The engine calls this once per tick.
    pub fn end_tick(&mut self) {
        if self.volume_dirty {
            self.volume_dirty = false;
            if let Err(e) = self.backend.set_volume(self.volume) {
                self.report("set volume", e);
            }
        }

        if let Some(paused) = self.peer.as_ref().and_then(PausePeer::latest) {
            self.paused = paused;
        }
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Toggle shuffle around the current track.
    pub fn shuffle(&mut self) -> bool {
        let changed = self.queue.shuffle(self.current_track);
        if changed {
            self.save_queue();
        }
        changed
    }

    pub fn enqueue_next(&mut self, track: TrackId) {
        self.queue.enqueue_next(track);
        self.save_queue();
    }

    /// Move the queue without starting playback.
    pub fn advance(&mut self, direction: Direction) -> Option<TrackId> {
        let track = self.queue.advance(direction);
        if track.is_some() {
            self.save_queue();
        }
        track
    }

    /// Replace the queue with a new play context and start at `start`.
    /// Shuffle carries over to the new context.
    pub fn load_context(&mut self, tracks: Vec<TrackId>, start: usize) {
        let reshuffle = self.queue.is_shuffled();
        self.queue.replace(tracks);

        let Some(track) = self.queue.jump_to(start).or_else(|| self.queue.current()) else {
            self.save_queue();
            return;
        };
        if reshuffle {
            self.queue.shuffle(Some(track));
        }
        self.save_queue();
        self.set_track(track);
    }

    // -----------------------------------------------------------------------
    // Observation
    // -----------------------------------------------------------------------

    pub fn view(&self) -> SessionView {
        SessionView {
            current_track: self.current_track,
            paused: self.paused,
            progress: self.progress,
            volume: self.volume,
            loop_mode: self.loop_mode,
            shuffled: self.queue.is_shuffled(),
            state: self.state(),
            queue: self.queue.snapshot(),
        }
    }

    pub fn state(&self) -> TransportState {
        match (self.current_track, self.paused) {
            (None, _) => TransportState::Idle,
            (Some(_), true) => TransportState::Paused,
            (Some(_), false) => TransportState::Playing,
        }
    }

    pub fn current_track(&self) -> Option<TrackId> {
        self.current_track
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    pub fn is_shuffled(&self) -> bool {
        self.queue.is_shuffled()
    }

    pub fn queue(&self) -> &QueueModel {
        &self.queue
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        if let Some(peer) = &self.peer {
            peer.post(paused);
        }
    }

    fn save_queue(&self) {
        self.save(keys::QUEUE, &self.queue.snapshot());
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = save_field(&*self.store, key, value) {
            log::warn!("segue: persisting {} failed: {}", key, e);
            self.notifier
                .notify(Notification::warning(Category::Storage, format!("saving {key} failed: {e}")));
        }
    }

    fn report(&self, operation: &str, err: BackendError) {
        log::warn!("segue: {} failed: {}", operation, err);
        self.notifier
            .notify(Notification::error(Category::Playback, format!("{operation} failed: {err}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, MemoryBackend};
    use crate::error::{StoreError, StoreResult};
    use crate::notify::{CollectingSink, Severity};
    use crate::store::MemoryStore;
    use crate::sync::PauseBus;
    use serde_json::Value;

    const A: TrackId = TrackId(1);
    const B: TrackId = TrackId(2);
    const C: TrackId = TrackId(3);
    const X: TrackId = TrackId(50);

    struct Fixture {
        backend: Arc<MemoryBackend>,
        store: Arc<MemoryStore>,
        sink: Arc<CollectingSink>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                backend: Arc::new(MemoryBackend::with_default_duration(100.0)),
                store: Arc::new(MemoryStore::new()),
                sink: Arc::new(CollectingSink::new()),
            }
        }

        fn session(&self) -> Session {
            Session::new(
                SessionConfig::default(),
                self.backend.clone(),
                self.store.clone(),
                self.sink.clone(),
            )
            .with_shuffle_seed(42)
        }
    }

    /// Session playing `[A, B, C]` from `start`, with the call log cleared.
    fn playing(fx: &Fixture, start: usize) -> Session {
        let mut s = fx.session();
        s.load_context(vec![A, B, C], start);
        fx.backend.clear_calls();
        s
    }

    // -------------------------------------------------------------------
    // set_track / toggle
    // -------------------------------------------------------------------

    #[test]
    fn set_track_resets_progress_and_unpauses() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        s.set_progress(30.0, false);
        assert_eq!(s.progress(), 30.0);

        s.set_track(B);
        assert_eq!(s.current_track(), Some(B));
        assert_eq!(s.progress(), 0.0);
        assert!(!s.is_paused());
        assert_eq!(s.state(), TransportState::Playing);
        assert_eq!(
            fx.backend.calls(),
            vec![
                BackendCall::Seek { position: 30.0, resume_after: true },
                BackendCall::Stop,
                BackendCall::Play(B)
            ]
        );
    }

    #[test]
    fn failed_play_is_reported_and_stays_paused() {
        let fx = Fixture::new();
        let mut s = fx.session();
        fx.backend.mark_missing(C);

        s.set_track(C);

        assert_eq!(s.current_track(), Some(C));
        assert!(s.is_paused());
        let notes = fx.sink.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].category, Category::Playback);
        assert!(notes[0].message.contains("not found"), "{}", notes[0].message);
    }

    #[test]
    fn failed_play_after_stop_pauses_playing_session() {
        let fx = Fixture::new();
        let bus = PauseBus::new();
        let mut s = fx.session().with_peer(bus.join());
        let widget = bus.join();
        s.load_context(vec![A, B], 0);
        assert_eq!(widget.latest(), Some(false));
        fx.backend.mark_missing(B);

        s.skip(Direction::Forward);

        assert_eq!(s.current_track(), Some(B));
        assert!(s.is_paused());
        assert_eq!(s.state(), TransportState::Paused);
        assert_eq!(fx.backend.current(), None);
        assert!(!fx.backend.has_track());
        assert_eq!(widget.latest(), Some(true));
        assert_eq!(fx.sink.len(), 1);
    }

    #[test]
    fn backend_receives_each_play_generation() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        let first = fx.backend.generation();
        assert_eq!(first, s.generation());

        s.skip(Direction::Forward);
        assert_eq!(fx.backend.current(), Some(B));
        assert_eq!(fx.backend.generation(), s.generation());
        assert!(fx.backend.generation() > first);
    }

    #[test]
    fn toggle_without_backend_track_plays_current() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.load_context(vec![A, B], 1);
        fx.backend.stop_player().unwrap();
        fx.backend.clear_calls();

        s.toggle_play_pause();
        assert_eq!(fx.backend.calls(), vec![BackendCall::Stop, BackendCall::Play(B)]);
        assert_eq!(s.state(), TransportState::Playing);
    }

    #[test]
    fn toggle_with_nothing_is_idle() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.toggle_play_pause();
        assert!(s.is_paused());
        assert_eq!(s.state(), TransportState::Idle);
        assert!(fx.backend.calls().is_empty());
    }

    #[test]
    fn toggle_pauses_and_resumes() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);

        s.toggle_play_pause();
        assert_eq!(s.state(), TransportState::Paused);
        assert!(fx.backend.is_paused());
        s.toggle_play_pause();
        assert_eq!(s.state(), TransportState::Playing);
        assert!(!fx.backend.is_paused());
        assert_eq!(fx.backend.calls(), vec![BackendCall::Pause, BackendCall::Resume]);
    }

    #[test]
    fn failed_pause_keeps_playing() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        fx.backend.fail_next(BackendError::Device("unplugged".into()));

        s.toggle_play_pause();
        assert!(!s.is_paused());
        assert_eq!(fx.sink.len(), 1);
    }

    // -------------------------------------------------------------------
    // skip
    // -------------------------------------------------------------------

    #[test]
    fn skip_forward_from_middle() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 1);
        s.skip(Direction::Forward);
        assert_eq!(s.current_track(), Some(C));
        assert_eq!(s.queue().cursor(), 2);
    }

    #[test]
    fn skip_forward_from_end_wraps() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 2);
        s.skip(Direction::Forward);
        assert_eq!(s.current_track(), Some(A));
        assert_eq!(s.queue().cursor(), 0);
    }

    #[test]
    fn skip_consumes_priority_first() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.load_context(vec![A, B], 0);
        s.enqueue_next(X);

        s.skip(Direction::Forward);
        assert_eq!(s.current_track(), Some(X));
        assert_eq!(s.queue().priority().count(), 0);
        assert_eq!(s.queue().cursor(), 0);
    }

    #[test]
    fn skip_downgrades_track_loop() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        s.cycle_loop();
        s.cycle_loop();
        assert_eq!(s.loop_mode(), LoopMode::Track);

        s.skip(Direction::Forward);
        assert_eq!(s.loop_mode(), LoopMode::Queue);
        assert_eq!(s.current_track(), Some(B));
    }

    #[test]
    fn skip_on_empty_queue_is_silent() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.skip(Direction::Forward);
        s.skip(Direction::Backward);
        assert_eq!(s.current_track(), None);
        assert!(fx.backend.calls().is_empty());
        assert!(fx.sink.is_empty());
    }

    // -------------------------------------------------------------------
    // song end
    // -------------------------------------------------------------------

    #[test]
    fn track_loop_replays_on_end() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 1);
        s.cycle_loop();
        s.cycle_loop();
        for signal in fx.backend.advance(40.0) {
            s.handle_signal(signal);
        }
        assert_eq!(s.progress(), 40.0);

        let end = fx.backend.finish().unwrap();
        s.handle_signal(end);

        assert_eq!(s.current_track(), Some(B));
        assert_eq!(s.progress(), 0.0);
        assert_eq!(s.state(), TransportState::Playing);
        assert_eq!(s.loop_mode(), LoopMode::Track);
        assert_eq!(s.queue().cursor(), 1);
        assert!(fx.backend.calls().ends_with(&[BackendCall::Stop, BackendCall::Play(B)]));
    }

    #[test]
    fn end_with_upcoming_advances() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        let end = fx.backend.finish().unwrap();
        s.handle_signal(end);
        assert_eq!(s.current_track(), Some(B));
    }

    #[test]
    fn end_of_queue_without_loop_pauses() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 2);
        let end = fx.backend.finish().unwrap();
        s.handle_signal(end);

        assert_eq!(s.current_track(), Some(C));
        assert_eq!(s.state(), TransportState::Paused);
        assert_eq!(fx.backend.calls(), vec![BackendCall::Pause]);
    }

    #[test]
    fn end_of_queue_with_queue_loop_wraps() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 2);
        s.cycle_loop();
        let end = fx.backend.finish().unwrap();
        s.handle_signal(end);
        assert_eq!(s.current_track(), Some(A));
        assert_eq!(s.state(), TransportState::Playing);
    }

    #[test]
    fn stale_end_signal_after_rapid_skip_is_dropped() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        let stale = fx.backend.finish().unwrap();

        s.skip(Direction::Forward);
        assert_eq!(s.current_track(), Some(B));

        s.handle_signal(stale);
        assert_eq!(s.current_track(), Some(B));
        assert_eq!(s.queue().cursor(), 1);
    }

    #[test]
    fn stale_progress_is_dropped() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        let old = s.generation();
        s.skip(Direction::Forward);

        s.handle_signal(BackendSignal::Progress { generation: old, seconds: 77.0 });
        assert_eq!(s.progress(), 0.0);
    }

    // -------------------------------------------------------------------
    // progress / volume / loop
    // -------------------------------------------------------------------

    #[test]
    fn held_progress_is_ignored() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);

        s.set_progress(42.0, true);
        assert_eq!(s.progress(), 0.0);
        assert!(fx.backend.calls().is_empty());

        s.set_progress(42.0, false);
        assert_eq!(s.progress(), 42.0);
        assert_eq!(
            fx.backend.calls(),
            vec![BackendCall::Seek { position: 42.0, resume_after: true }]
        );
    }

    #[test]
    fn backend_progress_suppressed_while_dragging() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        s.set_seek_held(true);
        for signal in fx.backend.advance(5.0) {
            s.handle_signal(signal);
        }
        assert_eq!(s.progress(), 0.0);

        s.set_seek_held(false);
        for signal in fx.backend.advance(5.0) {
            s.handle_signal(signal);
        }
        assert_eq!(s.progress(), 10.0);
    }

    #[test]
    fn volume_is_coalesced_per_tick() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.set_volume(0.1);
        s.set_volume(0.2);
        s.set_volume(1.7);
        assert!(fx.backend.calls().is_empty());
        assert_eq!(s.volume(), 1.0);

        s.end_tick();
        s.end_tick();
        assert_eq!(fx.backend.calls(), vec![BackendCall::SetVolume(1.0)]);
    }

    #[test]
    fn loop_cycles_back_after_three() {
        let fx = Fixture::new();
        let mut s = fx.session();
        let seen: Vec<LoopMode> = (0..3)
            .map(|_| {
                s.cycle_loop();
                s.loop_mode()
            })
            .collect();
        assert_eq!(seen, vec![LoopMode::Queue, LoopMode::Track, LoopMode::None]);
    }

    // -------------------------------------------------------------------
    // shuffle / context
    // -------------------------------------------------------------------

    #[test]
    fn shuffle_keeps_current_track_at_cursor() {
        let fx = Fixture::new();
        let mut s = fx.session();
        let tracks: Vec<TrackId> = (1..=10).map(TrackId).collect();
        s.load_context(tracks.clone(), 4);

        assert!(s.shuffle());
        assert!(s.is_shuffled());
        assert_eq!(s.queue().current(), Some(TrackId(5)));

        assert!(s.shuffle());
        assert_eq!(s.queue().sequence(), tracks.as_slice());
        assert_eq!(s.queue().cursor(), 4);
    }

    #[test]
    fn new_context_stays_shuffled() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        s.shuffle();

        s.load_context(vec![TrackId(10), TrackId(11), TrackId(12)], 2);
        assert!(s.is_shuffled());
        assert_eq!(s.current_track(), Some(TrackId(12)));
        assert_eq!(s.queue().current(), Some(TrackId(12)));
        assert_eq!(s.queue().cursor(), 0);
    }

    #[test]
    fn advance_moves_queue_without_playing() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);
        assert_eq!(s.advance(Direction::Forward), Some(B));
        assert_eq!(s.current_track(), Some(A));
        assert!(fx.backend.calls().is_empty());
    }

    // -------------------------------------------------------------------
    // reset / persistence / startup
    // -------------------------------------------------------------------

    #[test]
    fn reset_returns_to_defaults() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 1);
        s.set_volume(0.9);
        s.cycle_loop();
        s.shuffle();

        s.reset();
        let view = s.view();
        assert_eq!(view.current_track, None);
        assert!(view.paused);
        assert_eq!(view.progress, 0.0);
        assert_eq!(view.volume, 0.5);
        assert_eq!(view.loop_mode, LoopMode::None);
        assert!(!view.shuffled);
        assert_eq!(view.state, TransportState::Idle);
        assert!(view.queue.sequence.is_empty());
        assert!(!fx.backend.has_track());

        let reloaded = fx.session();
        assert_eq!(reloaded.view(), view);
    }

    #[test]
    fn state_survives_restart() {
        let fx = Fixture::new();
        {
            let mut s = playing(&fx, 1);
            s.enqueue_next(X);
            s.cycle_loop();
            s.set_volume(0.3);
            s.set_progress(12.0, false);
        }

        let s = fx.session();
        assert_eq!(s.current_track(), Some(B));
        assert_eq!(s.progress(), 12.0);
        assert_eq!(s.volume(), 0.3);
        assert_eq!(s.loop_mode(), LoopMode::Queue);
        assert_eq!(s.queue().cursor(), 1);
        assert_eq!(s.queue().priority().collect::<Vec<_>>(), vec![X]);
        assert!(s.is_paused());
    }

    #[test]
    fn initial_load_seeks_loaded_track() {
        let fx = Fixture::new();
        {
            let mut s = playing(&fx, 0);
            s.set_progress(33.0, false);
            s.set_volume(0.7);
        }
        let backend = Arc::new(MemoryBackend::with_default_duration(100.0));
        backend.preload(A, 0.0);
        let mut s = Session::new(SessionConfig::default(), backend.clone(), fx.store.clone(), fx.sink.clone());

        s.initial_load();
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Pause,
                BackendCall::Seek { position: 33.0, resume_after: false },
                BackendCall::SetVolume(0.7),
            ]
        );
        assert!(s.is_paused());
        assert_eq!(backend.progress(), 33.0);
    }

    #[test]
    fn initial_load_tells_siblings_it_paused() {
        let fx = Fixture::new();
        let bus = PauseBus::new();
        let mut main = fx.session().with_peer(bus.join());
        let widget = bus.join();
        main.load_context(vec![A, B], 0);
        assert_eq!(widget.latest(), Some(false));

        main.initial_load();
        assert!(main.is_paused());
        assert!(fx.backend.is_paused());
        assert_eq!(widget.latest(), Some(true));
    }

    #[test]
    fn initial_load_skips_seek_without_track() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.initial_load();
        assert_eq!(fx.backend.calls(), vec![BackendCall::Pause, BackendCall::SetVolume(0.5)]);
    }

    struct BrokenStore;

    impl StateStore for BrokenStore {
        fn get(&self, _: &str) -> StoreResult<Option<Value>> {
            Ok(None)
        }
        fn put(&self, _: &str, _: Value) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::other("read-only")))
        }
        fn remove(&self, _: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn store_failures_are_notified_not_fatal() {
        let backend = Arc::new(MemoryBackend::new());
        let sink = Arc::new(CollectingSink::new());
        let mut s = Session::new(SessionConfig::default(), backend, Arc::new(BrokenStore), sink.clone());

        s.cycle_loop();
        assert_eq!(s.loop_mode(), LoopMode::Queue);
        let notes = sink.drain();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].category, Category::Storage);
        assert_eq!(notes[0].severity, Severity::Warning);
    }

    // -------------------------------------------------------------------
    // sync / media keys
    // -------------------------------------------------------------------

    #[test]
    fn pause_syncs_to_sibling_surface() {
        let fx = Fixture::new();
        let bus = PauseBus::new();
        let mut main = fx.session().with_peer(bus.join());
        let mut widget = fx.session().with_peer(bus.join());

        main.load_context(vec![A, B], 0);
        widget.end_tick();
        assert!(!widget.is_paused());

        main.toggle_play_pause();
        widget.end_tick();
        assert!(widget.is_paused());

        // Receiving does not echo back.
        main.end_tick();
        assert!(main.is_paused());
    }

    #[test]
    fn media_keys_map_to_transport() {
        let fx = Fixture::new();
        let mut s = playing(&fx, 0);

        s.handle_media_key(MediaKey::Play);
        assert!(fx.backend.calls().is_empty());

        s.handle_media_key(MediaKey::Pause);
        assert!(s.is_paused());

        s.handle_media_key(MediaKey::SeekTo { position: 20.0 });
        s.handle_media_key(MediaKey::SeekBy { offset: -50.0 });
        assert_eq!(s.progress(), 0.0);
        s.handle_media_key(MediaKey::SeekBy { offset: 500.0 });
        assert_eq!(s.progress(), 100.0);

        s.handle_media_key(MediaKey::Next);
        assert_eq!(s.current_track(), Some(B));
        s.handle_media_key(MediaKey::Previous);
        assert_eq!(s.current_track(), Some(A));

        s.handle_media_key(MediaKey::Volume { volume: 0.25 });
        assert_eq!(s.volume(), 0.25);
    }

    #[test]
    fn commands_dispatch() {
        let fx = Fixture::new();
        let mut s = fx.session();
        s.handle_command(PlaybackCommand::LoadContext { tracks: vec![A, B, C], start: 0 });
        s.handle_command(PlaybackCommand::Skip { direction: Direction::Backward });
        assert_eq!(s.current_track(), Some(C));

        s.handle_command(PlaybackCommand::CycleLoop);
        assert_eq!(s.loop_mode(), LoopMode::Queue);

        s.handle_command(PlaybackCommand::Reset);
        assert_eq!(s.state(), TransportState::Idle);
    }
}
