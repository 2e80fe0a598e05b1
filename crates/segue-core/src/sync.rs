//! Cross-surface pause sync.
//!
//! Sibling UI surfaces (main window, mini widget) each hold a
//! [`PausePeer`] on a shared [`PauseBus`]. A peer's posts reach every other
//! peer, never itself. Delivery is best effort and unordered between
//! senders; receivers apply the latest message they see. Only the `paused`
//! flag travels here, so last-write-wins needs no versioning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseMessage {
    pub paused: bool,
}

#[derive(Debug, Default)]
struct BusInner {
    peers: Mutex<Vec<(u64, Sender<PauseMessage>)>>,
    next_id: AtomicU64,
}

/// Shared channel all surfaces of one app join.
#[derive(Debug, Clone, Default)]
pub struct PauseBus {
    inner: Arc<BusInner>,
}

impl PauseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the bus as a new surface.
    pub fn join(&self) -> PausePeer {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        self.inner.peers.lock().push((id, tx));
        PausePeer {
            id,
            bus: self.clone(),
            rx,
        }
    }

    pub fn peer_count(&self) -> usize {
        self.inner.peers.lock().len()
    }

    fn broadcast(&self, from: u64, message: PauseMessage) {
        let mut peers = self.inner.peers.lock();
        // Receivers that went away are pruned on the next post.
        peers.retain(|(id, tx)| *id == from || tx.send(message).is_ok());
    }

    fn leave(&self, id: u64) {
        self.inner.peers.lock().retain(|(peer, _)| *peer != id);
    }
}

/// One surface's end of the bus.
#[derive(Debug)]
pub struct PausePeer {
    id: u64,
    bus: PauseBus,
    rx: Receiver<PauseMessage>,
}

impl PausePeer {
    /// Tell every other surface about a local `paused` change.
    pub fn post(&self, paused: bool) {
        self.bus.broadcast(self.id, PauseMessage { paused });
    }

    /// Drain pending messages and return the last one, if any.
    pub fn latest(&self) -> Option<bool> {
        self.rx.try_iter().last().map(|m| m.paused)
    }
}

impl Drop for PausePeer {
    fn drop(&mut self) {
        self.bus.leave(self.id);
    }
}
