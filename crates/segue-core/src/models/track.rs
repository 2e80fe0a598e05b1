//! Track identity.
//!
//! The core never looks inside a track. Everything it needs (equality,
//! ordering for unshuffle, backend addressing) comes from the id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique integer identifier of a track in the host's library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(pub u32);

impl From<u32> for TrackId {
    fn from(id: u32) -> Self {
        TrackId(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic counter attached to each `play_track` request.
///
/// Backends echo it on every signal they emit for that track so the
/// session can drop signals belonging to a track it already left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0.wrapping_add(1))
    }
}
