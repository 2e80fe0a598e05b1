//! Session configuration.
//!
//! Defaults match a fresh install. Hosts may override from the environment:
//!
//! - `SEGUE_ROOT`: directory for the file-backed state store
//! - `SEGUE_TICK_MS`: engine tick; volume pushes are coalesced per tick
//! - `SEGUE_DEFAULT_VOLUME`: volume used on first run and after reset

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_ROOT: &str = "SEGUE_ROOT";
pub const ENV_TICK_MS: &str = "SEGUE_TICK_MS";
pub const ENV_DEFAULT_VOLUME: &str = "SEGUE_DEFAULT_VOLUME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub default_volume: f32,
    #[serde(with = "millis")]
    pub tick: Duration,
    pub state_root: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            tick: Duration::from_millis(16),
            state_root: None,
        }
    }
}

impl SessionConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(root) = lookup(ENV_ROOT) {
            config.state_root = Some(PathBuf::from(root));
        }

        if let Some(raw) = lookup(ENV_TICK_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| invalid(ENV_TICK_MS, &raw))?;
            if ms == 0 {
                return Err(invalid(ENV_TICK_MS, &raw));
            }
            config.tick = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(ENV_DEFAULT_VOLUME) {
            let volume: f32 = raw
                .trim()
                .parse()
                .map_err(|_| invalid(ENV_DEFAULT_VOLUME, &raw))?;
            if !(0.0..=1.0).contains(&volume) {
                return Err(invalid(ENV_DEFAULT_VOLUME, &raw));
            }
            config.default_volume = volume;
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::collections::HashMap;
    use std::sync::Mutex;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.default_volume, 0.5);
    }

    #[test]
    fn overrides_apply() {
        let config = SessionConfig::from_lookup(lookup(&[
            (ENV_ROOT, "/tmp/segue"),
            (ENV_TICK_MS, "40"),
            (ENV_DEFAULT_VOLUME, "0.8"),
        ]))
        .unwrap();
        assert_eq!(config.state_root, Some(PathBuf::from("/tmp/segue")));
        assert_eq!(config.tick, Duration::from_millis(40));
        assert_eq!(config.default_volume, 0.8);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SessionConfig::from_lookup(lookup(&[(ENV_TICK_MS, "0")])).is_err());
        assert!(SessionConfig::from_lookup(lookup(&[(ENV_TICK_MS, "soon")])).is_err());
        assert_eq!(
            SessionConfig::from_lookup(lookup(&[(ENV_DEFAULT_VOLUME, "1.5")])),
            Err(ConfigError::Invalid {
                key: ENV_DEFAULT_VOLUME,
                value: "1.5".into()
            })
        );
    }

    #[test]
    fn reads_process_env() {
        let _guard = ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::env::set_var(ENV_TICK_MS, "25");
        let config = SessionConfig::from_env().unwrap();
        std::env::remove_var(ENV_TICK_MS);
        assert_eq!(config.tick, Duration::from_millis(25));
    }

    #[test]
    fn json_tick_is_millis() {
        let config: SessionConfig =
            serde_json::from_value(serde_json::json!({ "tick": 100 })).unwrap();
        assert_eq!(config.tick, Duration::from_millis(100));
        assert_eq!(config.default_volume, 0.5);
    }
}
