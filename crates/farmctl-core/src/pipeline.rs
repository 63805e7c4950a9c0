//! Log-to-metrics pipeline.
//!
//! Every captured log line lands in the [`LogRing`]; lines and typed
//! actions that map to a counter update the [`StatsRecord`], which is then
//! persisted and published as `statsUpdated`. The pipeline is the only
//! writer of the record.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    event::Event,
    extract::{LogLine, extract_actions},
    hub::Hub,
    log_ring::{LogEntry, LogRing},
    stats::{ActionKind, ActionPerformed, StatsRecord},
    traits::SnapshotStorage,
};

/// Input accepted by the ingestion task.
#[derive(Debug, Clone)]
pub enum PipelineInput {
    /// A log line; recorded and scanned for actions.
    Line(LogLine),
    /// A typed action; applied directly.
    Action(ActionPerformed),
}

/// Cheap handle for feeding the pipeline from anywhere.
#[derive(Debug, Clone)]
pub struct ActionSink {
    tx: mpsc::UnboundedSender<PipelineInput>,
}

impl ActionSink {
    /// Report a typed action.
    pub fn record(&self, kind: ActionKind, quantity: u64) {
        let _ = self
            .tx
            .send(PipelineInput::Action(ActionPerformed::new(kind, quantity)));
    }

    /// Report a log line.
    pub fn line(&self, line: LogLine) {
        let _ = self.tx.send(PipelineInput::Line(line));
    }
}

/// Create a sink and the receiver for [`StatsPipeline::spawn_ingest`].
#[must_use]
pub fn channel() -> (ActionSink, mpsc::UnboundedReceiver<PipelineInput>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ActionSink { tx }, rx)
}

/// Stats extraction pipeline.
pub struct StatsPipeline {
    storage: Arc<dyn SnapshotStorage>,
    hub: Arc<Hub>,
    // Serializes writers; held across persist + publish so events follow
    // the order in which counters changed.
    record: tokio::sync::Mutex<StatsRecord>,
    snapshot: RwLock<StatsRecord>,
    logs: LogRing,
}

impl StatsPipeline {
    /// Create a pipeline starting from `initial`.
    #[must_use]
    pub fn new(
        storage: Arc<dyn SnapshotStorage>,
        hub: Arc<Hub>,
        initial: StatsRecord,
        log_capacity: usize,
    ) -> Self {
        Self {
            storage,
            hub,
            record: tokio::sync::Mutex::new(initial.clone()),
            snapshot: RwLock::new(initial),
            logs: LogRing::new(log_capacity),
        }
    }

    /// Create a pipeline from the persisted record, or zeroes if there is none.
    pub async fn load(storage: Arc<dyn SnapshotStorage>, hub: Arc<Hub>, log_capacity: usize) -> Self {
        let initial = match storage.load_stats().await {
            Ok(Some(record)) => record,
            Ok(None) => StatsRecord::default(),
            Err(e) => {
                tracing::warn!("Failed to load stats, starting from zero: {e}");
                StatsRecord::default()
            }
        };
        Self::new(storage, hub, initial, log_capacity)
    }

    /// Current stats.
    #[must_use]
    pub fn stats(&self) -> StatsRecord {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured log history.
    #[must_use]
    pub const fn logs(&self) -> &LogRing {
        &self.logs
    }

    /// Record a log line and apply any actions it describes.
    ///
    /// Returns the number of actions applied.
    pub async fn ingest_line(&self, line: LogLine) -> usize {
        let actions = extract_actions(&line);
        self.logs.push(LogEntry {
            time: Utc::now(),
            level: line.level,
            tag: line.tag,
            message: line.message,
        });
        for action in &actions {
            self.record(*action).await;
        }
        actions.len()
    }

    /// Apply one action, persist, and publish the updated record.
    pub async fn record(&self, action: ActionPerformed) -> StatsRecord {
        let mut record = self.record.lock().await;
        record.apply(action, Utc::now());
        self.commit(&record).await
    }

    /// Zero every counter, persist, and publish the zeroed record.
    pub async fn reset(&self) -> StatsRecord {
        let mut record = self.record.lock().await;
        record.reset(Utc::now());
        tracing::info!("Stats reset");
        self.commit(&record).await
    }

    async fn commit(&self, record: &StatsRecord) -> StatsRecord {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = record.clone();
        if let Err(e) = self.storage.save_stats(record).await {
            tracing::warn!("Failed to persist stats: {e}");
        }
        self.hub.publish(Event::StatsUpdated(record.clone()));
        record.clone()
    }

    /// Consume pipeline input until every sink is dropped.
    pub fn spawn_ingest(
        self: Arc<Self>,
        mut rx: mpsc::UnboundedReceiver<PipelineInput>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(input) = rx.recv().await {
                match input {
                    PipelineInput::Line(line) => {
                        self.ingest_line(line).await;
                    }
                    PipelineInput::Action(action) => {
                        self.record(action).await;
                    }
                }
            }
        })
    }
}
