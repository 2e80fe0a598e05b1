//! Error types.
//!
//! Nothing here is fatal to the process. Backend and store failures are
//! surfaced through the notification sink and the session carries on.

use thiserror::Error;

use crate::models::TrackId;

/// A Track Backend rejected a request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    #[error("track {0} not found")]
    NotFound(TrackId),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("output device error: {0}")]
    Device(String),
    #[error("{0}")]
    Other(String),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Durable state store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Crate-level error for fallible setup paths (opening and feeding the engine).
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("engine is shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, Error>;
