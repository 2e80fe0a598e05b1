//! Track Backend contract.
//!
//! The session drives audio through this trait and never decodes or opens
//! files itself. Backends report progress and track-end asynchronously as
//! [`BackendSignal`]s tagged with the [`Generation`] they were started with.

use serde::{Deserialize, Serialize};

use crate::error::BackendResult;
use crate::models::{Generation, TrackId};

/// Audio engine the session delegates to.
///
/// All methods take `&self`; backends manage their own concurrency.
/// Positions and durations are in seconds.
pub trait TrackBackend: Send + Sync {
    fn play_track(&self, id: TrackId, generation: Generation) -> BackendResult<()>;
    fn pause_track(&self) -> BackendResult<()>;
    fn resume_track(&self) -> BackendResult<()>;
    fn stop_player(&self) -> BackendResult<()>;
    fn seek_track(&self, position: f64, resume_after: bool) -> BackendResult<()>;
    fn set_volume(&self, volume: f32) -> BackendResult<()>;
    fn duration(&self) -> f64;
    fn progress(&self) -> f64;
    fn has_track(&self) -> bool;
    fn has_ended(&self) -> bool;
}

/// Asynchronous report from a backend about the track it was given.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum BackendSignal {
    Progress { generation: Generation, seconds: f64 },
    TrackEnded { generation: Generation },
}

impl BackendSignal {
    pub fn generation(&self) -> Generation {
        match *self {
            BackendSignal::Progress { generation, .. } => generation,
            BackendSignal::TrackEnded { generation } => generation,
        }
    }
}

/// No-op backend for headless use.
///
/// Every request succeeds and nothing is ever loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl TrackBackend for NoopBackend {
    fn play_track(&self, _id: TrackId, _generation: Generation) -> BackendResult<()> {
        Ok(())
    }

    fn pause_track(&self) -> BackendResult<()> {
        Ok(())
    }

    fn resume_track(&self) -> BackendResult<()> {
        Ok(())
    }

    fn stop_player(&self) -> BackendResult<()> {
        Ok(())
    }

    fn seek_track(&self, _position: f64, _resume_after: bool) -> BackendResult<()> {
        Ok(())
    }

    fn set_volume(&self, _volume: f32) -> BackendResult<()> {
        Ok(())
    }

    fn duration(&self) -> f64 {
        0.0
    }

    fn progress(&self) -> f64 {
        0.0
    }

    fn has_track(&self) -> bool {
        false
    }

    fn has_ended(&self) -> bool {
        false
    }
}

pub mod memory;

pub use memory::{BackendCall, MemoryBackend};
