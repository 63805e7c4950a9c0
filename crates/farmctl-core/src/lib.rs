//! Core abstractions for the farm agent control plane.
//!
//! This crate provides the fundamental building blocks:
//! - `Hub` - Event fan-out to observers with heartbeat
//! - `Event` - Typed push-channel events
//! - `StatsPipeline` - Log capture, action extraction and stats persistence
//! - `LogRing` - Bounded log history
//! - `RuntimeConfig` - Live-tunable agent settings
//! - Collaborator and storage traits

pub mod capture;
pub mod config;
pub mod event;
pub mod extract;
pub mod hub;
pub mod log_ring;
pub mod pipeline;
pub mod stats;
pub mod traits;

pub use capture::CaptureLayer;
pub use config::{ConfigError, ConfigUpdate, RuntimeConfig, SharedConfig};
pub use event::{Event, Frame};
pub use extract::LogLine;
pub use hub::{Hub, Subscription};
pub use log_ring::{LogEntry, LogRing};
pub use pipeline::{ActionSink, StatsPipeline};
pub use stats::{ActionKind, ActionPerformed, StatsRecord};
pub use traits::{
    AgentLoop, CollaboratorError, GameClient, GameEvent, InviteRedeemer, PlayerState,
    SessionSnapshot, SessionStatus, SnapshotStorage, StorageError,
};
