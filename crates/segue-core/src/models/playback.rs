//! Playback commands, loop mode and transport vocabulary.
//!
//! PlaybackCommand is a tagged enum so UI surfaces can send it as JSON.
//! The rest are small string enums.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::track::TrackId;

/// Loop mode for queue playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    /// Stop after the last track.
    #[default]
    None,
    /// Wrap around indefinitely.
    Queue,
    /// Repeat the current track.
    Track,
}

impl LoopMode {
    /// Next mode in the `none -> queue -> track -> none` cycle.
    pub fn cycled(self) -> Self {
        match self {
            LoopMode::None => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Track,
            LoopMode::Track => LoopMode::None,
        }
    }
}

/// Direction of a skip or queue advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

/// Derived transport state. Never stored, always computed from the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    Idle,
    Playing,
    Paused,
}

/// Intent sent by a UI surface to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybackCommand {
    SetTrack { id: TrackId },
    TogglePlayPause,
    Skip { direction: Direction },
    SetProgress { position: f64, held: bool },
    HoldSeek { held: bool },
    SetVolume { volume: f32 },
    CycleLoop,
    Shuffle,
    EnqueueNext { id: TrackId },
    LoadContext { tracks: Vec<TrackId>, start: usize },
    InitialLoad,
    Reset,
}

impl PlaybackCommand {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_value(v: &Value) -> Option<Self> {
        serde_json::from_value(v.clone()).ok()
    }
}

/// External media-key / OS media control events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", rename_all = "snake_case")]
pub enum MediaKey {
    Play,
    Pause,
    Next,
    Previous,
    /// Absolute position in seconds.
    SeekTo { position: f64 },
    /// Signed offset in seconds from the current position.
    SeekBy { offset: f64 },
    Volume { volume: f32 },
}
