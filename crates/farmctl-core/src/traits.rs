//! Collaborator and storage traits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::{RuntimeConfig, stats::StatsRecord};

/// Player state reported by the game client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub gid: u64,
    pub name: String,
    pub level: u32,
    pub gold: u64,
    pub exp: u64,
}

/// Public view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub running: bool,
    pub platform: String,
    pub has_login_code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerState>,
}

/// Persisted identity of the last started session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub gid: u64,
    pub name: String,
    pub level: u32,
    pub platform: String,
    pub last_update: DateTime<Utc>,
}

/// Notifications emitted by the game client.
#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    LandsChanged(Vec<Value>),
    FriendApplicationReceived(Vec<Value>),
}

/// Storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for snapshot storage backends.
///
/// Each document is read and written whole; the last write wins.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Load the session snapshot, if one was saved.
    async fn load_session(&self) -> Result<Option<SessionSnapshot>, StorageError>;

    /// Replace the session snapshot.
    async fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError>;

    /// Load the stats record, if one was saved.
    async fn load_stats(&self) -> Result<Option<StatsRecord>, StorageError>;

    /// Replace the stats record.
    async fn save_stats(&self, stats: &StatsRecord) -> Result<(), StorageError>;
}

/// Error reported by an external collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Failed to load definitions: {0}")]
    Definitions(String),
    #[error("{0}")]
    Other(String),
}

/// Lower-level game protocol client.
#[async_trait]
pub trait GameClient: Send + Sync {
    /// Load the protocol definitions needed before connecting.
    async fn load_definitions(&self) -> Result<(), CollaboratorError>;

    /// Connect and log in; resolves once the connection is ready.
    async fn connect(&self, credential: &str) -> Result<(), CollaboratorError>;

    /// Release the connection.
    async fn disconnect(&self);

    /// Current player state.
    fn player_state(&self) -> PlayerState;

    /// Receiver for game notifications.
    fn subscribe_events(&self) -> broadcast::Receiver<GameEvent>;
}

/// Periodic agent activity started once the connection is ready.
#[async_trait]
pub trait AgentLoop: Send + Sync {
    /// Stable name, used for on-demand triggering.
    fn name(&self) -> &'static str;

    /// Delay between ticks; re-read before every tick.
    fn interval(&self, config: &RuntimeConfig) -> Duration;

    /// Delay before the first tick.
    fn initial_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Run one iteration.
    async fn tick(&self) -> Result<(), CollaboratorError>;
}

/// One-shot invite code redemption.
#[async_trait]
pub trait InviteRedeemer: Send + Sync {
    /// Redeem every pending invite code, returning how many succeeded.
    async fn redeem_all(&self) -> Result<usize, CollaboratorError>;
}
