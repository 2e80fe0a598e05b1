//! segue-core: playback session and queue controller.
//!
//! Decides what track is active, what plays next, how loop and shuffle
//! change that decision, and keeps several UI surfaces in step with one
//! logical session. Audio itself is somebody else's job.
//!
//! # Architecture
//!
//! ```text
//! Layer 0: Capabilities (TrackBackend, StateStore, NotificationSink, PauseBus)
//! Layer 1: QueueModel (pure index arithmetic + shuffle)
//! Layer 2: Session (transport state machine)
//! Layer 3: Engine (single-owner event loop)
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod models;
pub mod notify;
pub mod persist;
pub mod queue;
pub mod session;
pub mod store;
pub mod sync;

pub use backend::{BackendSignal, MemoryBackend, NoopBackend, TrackBackend};
pub use config::SessionConfig;
pub use engine::{Engine, EngineSender};
pub use error::{BackendError, Error, Result};
pub use models::*;
pub use notify::{CollectingSink, LogSink, Notification, NotificationSink};
pub use queue::{QueueModel, QueueSnapshot};
pub use session::{Session, SessionView};
pub use store::{FileStore, MemoryStore, StateStore};
pub use sync::{PauseBus, PausePeer};
