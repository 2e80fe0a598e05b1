//! Typed load/save boundary between the session and its state store.
//!
//! Each field is read independently. A missing, unreadable or out-of-range
//! field falls back to its default without affecting the others.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::StoreResult;
use crate::keys;
use crate::models::{LoopMode, TrackId};
use crate::queue::QueueSnapshot;
use crate::store::StateStore;

/// Everything that survives a restart.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub current_track: Option<TrackId>,
    pub loop_mode: LoopMode,
    pub progress: f64,
    pub volume: f32,
    pub queue: QueueSnapshot,
}

impl PersistedSession {
    pub fn defaults(config: &SessionConfig) -> Self {
        Self {
            current_track: None,
            loop_mode: LoopMode::None,
            progress: 0.0,
            volume: config.default_volume,
            queue: QueueSnapshot::default(),
        }
    }

    pub fn load(store: &dyn StateStore, config: &SessionConfig) -> Self {
        let defaults = Self::defaults(config);

        let progress = load_field::<f64>(store, keys::PROGRESS)
            .filter(|p| p.is_finite() && *p >= 0.0);
        let volume = load_field::<f32>(store, keys::VOLUME)
            .filter(|v| (0.0..=1.0).contains(v));

        Self {
            current_track: load_field::<Option<TrackId>>(store, keys::CURRENT_TRACK).flatten(),
            loop_mode: load_field(store, keys::LOOP_MODE).unwrap_or(defaults.loop_mode),
            progress: progress.unwrap_or(defaults.progress),
            volume: volume.unwrap_or(defaults.volume),
            queue: load_field(store, keys::QUEUE).unwrap_or(defaults.queue),
        }
    }

    /// Write every field. Used after reset and by tests; the session
    /// otherwise saves only the fields it touched.
    pub fn save(&self, store: &dyn StateStore) -> StoreResult<()> {
        save_field(store, keys::CURRENT_TRACK, &self.current_track)?;
        save_field(store, keys::LOOP_MODE, &self.loop_mode)?;
        save_field(store, keys::PROGRESS, &self.progress)?;
        save_field(store, keys::VOLUME, &self.volume)?;
        save_field(store, keys::QUEUE, &self.queue)
    }
}

/// Read and decode one key. Store and decode failures are logged and
/// treated as absent.
pub fn load_field<T: DeserializeOwned>(store: &dyn StateStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(field) => Some(field),
            Err(e) => {
                log::warn!("segue: malformed {}, using default: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            log::warn!("segue: reading {} failed, using default: {}", key, e);
            None
        }
    }
}

pub fn save_field<T: Serialize + ?Sized>(store: &dyn StateStore, key: &str, value: &T) -> StoreResult<()> {
    store.put(key, serde_json::to_value(value)?)
}
