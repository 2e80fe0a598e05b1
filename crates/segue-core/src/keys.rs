//! Segue key conventions over the state store.
//!
//! Pure constants mapping session concepts to store keys. The queue is a
//! single record so its fields are always written together.

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

pub const CURRENT_TRACK: &str = "session/current_track";
pub const LOOP_MODE: &str = "session/loop";
pub const PROGRESS: &str = "session/progress";
pub const VOLUME: &str = "session/volume";

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Sequence, cursor, priority list and shuffle flag as one record.
pub const QUEUE: &str = "queue/state";

pub const SESSION_PREFIX: &str = "session/";
pub const QUEUE_PREFIX: &str = "queue/";

/// File name for a key in a directory-backed store.
pub fn file_name(key: &str) -> String {
    format!("{}.json", key.replace('/', "."))
}
