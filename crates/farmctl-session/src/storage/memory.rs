//! In-memory snapshot storage.

use std::sync::RwLock;

use async_trait::async_trait;
use farmctl_core::{SessionSnapshot, SnapshotStorage, StatsRecord, StorageError};

/// In-memory storage implementation.
///
/// Useful for tests and throwaway runs.
/// Data is lost on restart.
#[derive(Default)]
pub struct MemoryStorage {
    session: RwLock<Option<SessionSnapshot>>,
    stats: RwLock<Option<StatsRecord>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStorage for MemoryStorage {
    async fn load_session(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        Ok(self
            .session
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .clone())
    }

    async fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        *self
            .session
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))? = Some(snapshot.clone());
        Ok(())
    }

    async fn load_stats(&self) -> Result<Option<StatsRecord>, StorageError> {
        Ok(self
            .stats
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .clone())
    }

    async fn save_stats(&self, stats: &StatsRecord) -> Result<(), StorageError> {
        *self
            .stats
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))? = Some(stats.clone());
        Ok(())
    }
}
