//! Segue data models.
//!
//! Only what the controller needs: track identity, loop/direction enums,
//! and the command/media-key vocabulary UI surfaces speak.

pub mod playback;
pub mod track;

pub use playback::{Direction, LoopMode, MediaKey, PlaybackCommand, TransportState};
pub use track::{Generation, TrackId};
