//! Segue engine: single-owner event loop around a [`Session`].
//!
//! UI commands, backend signals and media keys all go through one channel
//! and are applied in arrival order on the engine thread. One tick is one
//! drain of the channel. After each tick the session flushes coalesced
//! volume changes and picks up pause messages from sibling surfaces.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::backend::{BackendSignal, TrackBackend};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::models::{MediaKey, PlaybackCommand};
use crate::notify::NotificationSink;
use crate::session::{Session, SessionView};
use crate::store::{FileStore, MemoryStore, StateStore};
use crate::sync::PausePeer;

/// Everything the engine loop consumes.
#[derive(Debug)]
pub enum EngineEvent {
    Command(PlaybackCommand),
    Signal(BackendSignal),
    MediaKey(MediaKey),
    /// Acknowledged once every earlier event has been applied and the
    /// tick that contained it has been flushed.
    Barrier(Sender<()>),
    Shutdown,
}

/// Cloneable handle for feeding the engine from other threads
/// (backend callbacks, media-key listeners).
#[derive(Debug, Clone)]
pub struct EngineSender {
    tx: Sender<EngineEvent>,
}

impl EngineSender {
    pub fn command(&self, cmd: PlaybackCommand) -> Result<()> {
        self.send(EngineEvent::Command(cmd))
    }

    pub fn signal(&self, signal: BackendSignal) -> Result<()> {
        self.send(EngineEvent::Signal(signal))
    }

    pub fn media_key(&self, key: MediaKey) -> Result<()> {
        self.send(EngineEvent::MediaKey(key))
    }

    fn send(&self, event: EngineEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| Error::Shutdown)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Engine {
    session: Arc<Mutex<Session>>,
    sender: EngineSender,
    rx: Mutex<Option<Receiver<EngineEvent>>>,
    tick: Duration,
    /// Shutdown signal for the loop thread.
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Wrap an already-restored session.
    pub fn new(session: Session, tick: Duration) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            session: Arc::new(Mutex::new(session)),
            sender: EngineSender { tx },
            rx: Mutex::new(Some(rx)),
            tick,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Build a session from `config` and wrap it.
    ///
    /// State lives under `config.state_root` when set, in memory otherwise.
    pub fn open(
        config: SessionConfig,
        backend: Arc<dyn TrackBackend>,
        notifier: Arc<dyn NotificationSink>,
        peer: Option<PausePeer>,
    ) -> Result<Self> {
        let store: Arc<dyn StateStore> = match &config.state_root {
            Some(root) => Arc::new(FileStore::open(root)?),
            None => Arc::new(MemoryStore::new()),
        };
        let tick = config.tick;
        let mut session = Session::new(config, backend, store, notifier);
        if let Some(peer) = peer {
            session = session.with_peer(peer);
        }
        Ok(Self::new(session, tick))
    }

    /// Start the loop thread and queue the startup reconciliation.
    /// Idempotent: calling twice is a no-op.
    pub fn start(&self) {
        let mut handles = self.handles.lock();
        if !handles.is_empty() {
            return;
        }
        let Some(rx) = self.rx.lock().take() else {
            return;
        };
        if self.sender.command(PlaybackCommand::InitialLoad).is_err() {
            log::warn!("segue: could not queue initial load");
        }
        handles.push(self.start_loop(rx));
    }

    /// Stop the loop and wait for it to finish. Events already queued
    /// ahead of the sentinel are still applied.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake a loop blocked on recv.
        let _ = self.sender.send(EngineEvent::Shutdown);

        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                log::error!("segue: engine thread panicked");
            }
        }
    }

    fn start_loop(&self, rx: Receiver<EngineEvent>) -> JoinHandle<()> {
        let session = Arc::clone(&self.session);
        let shutdown = Arc::clone(&self.shutdown);
        let tick = self.tick;

        thread::spawn(move || loop {
            let first = match rx.recv_timeout(tick) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let mut stop = false;
            let mut barriers = Vec::new();
            {
                let mut session = session.lock();
                for event in first.into_iter().chain(rx.try_iter()) {
                    match event {
                        EngineEvent::Command(cmd) => session.handle_command(cmd),
                        EngineEvent::Signal(signal) => session.handle_signal(signal),
                        EngineEvent::MediaKey(key) => session.handle_media_key(key),
                        EngineEvent::Barrier(ack) => barriers.push(ack),
                        EngineEvent::Shutdown => {
                            stop = true;
                            break;
                        }
                    }
                }
                session.end_tick();
            }

            for ack in barriers {
                let _ = ack.send(());
            }
            if stop || shutdown.load(Ordering::SeqCst) {
                break;
            }
        })
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Handle for other threads to push events.
    pub fn sender(&self) -> EngineSender {
        self.sender.clone()
    }

    /// Send a UI command.
    pub fn command(&self, cmd: PlaybackCommand) -> Result<()> {
        self.sender.command(cmd)
    }

    pub fn signal(&self, signal: BackendSignal) -> Result<()> {
        self.sender.signal(signal)
    }

    pub fn media_key(&self, key: MediaKey) -> Result<()> {
        self.sender.media_key(key)
    }

    /// Block until everything sent so far has been applied, or `timeout`.
    /// Returns false on timeout or if the loop is not running.
    pub fn settle(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = mpsc::channel();
        if self.sender.send(EngineEvent::Barrier(ack_tx)).is_err() {
            return false;
        }
        ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Current observable state.
    pub fn view(&self) -> SessionView {
        self.session.lock().view()
    }

    /// Hold the session lock so queued events pile up into one tick.
    #[cfg(test)]
    pub(crate) fn hold_session(&self) -> parking_lot::MutexGuard<'_, Session> {
        self.session.lock()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.sender.send(EngineEvent::Shutdown);
        // Don't join here; the thread exits on the sentinel.
    }
}
