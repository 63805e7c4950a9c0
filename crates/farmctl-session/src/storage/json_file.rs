//! Whole-document JSON snapshot files.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use farmctl_core::{SessionSnapshot, SnapshotStorage, StatsRecord, StorageError};
use serde::{Serialize, de::DeserializeOwned};

const SESSION_FILE: &str = "user.json";
const STATS_FILE: &str = "stats.json";

/// Stores each snapshot as a pretty-printed JSON file in one directory.
///
/// Writes go to a temporary file that is renamed over the target, so a
/// reader sees either the previous or the new document.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    dir: PathBuf,
}

impl JsonFileStorage {
    /// Create storage rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let data = match tokio::fs::read(self.dir.join(name)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    async fn write<T: Serialize + Sync>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let payload = serde_json::to_vec_pretty(value)?;
        let path = self.dir.join(name);
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for JsonFileStorage {
    async fn load_session(&self) -> Result<Option<SessionSnapshot>, StorageError> {
        self.read(SESSION_FILE).await
    }

    async fn save_session(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        self.write(SESSION_FILE, snapshot).await
    }

    async fn load_stats(&self) -> Result<Option<StatsRecord>, StorageError> {
        self.read(STATS_FILE).await
    }

    async fn save_stats(&self, stats: &StatsRecord) -> Result<(), StorageError> {
        self.write(STATS_FILE, stats).await
    }
}
