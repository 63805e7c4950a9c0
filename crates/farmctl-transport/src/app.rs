//! Transport-agnostic control plane operations.

use std::sync::Arc;

use farmctl_core::{
    ConfigUpdate, Event, Hub, LogEntry, RuntimeConfig, SessionStatus, SharedConfig,
    SnapshotStorage, StatsPipeline, StatsRecord, Subscription,
};
use farmctl_login::{LoginCode, LoginFlow};
use farmctl_session::{ControllerError, SessionController};

use crate::protocol::{ApiError, LoginStatusResponse, StartRequest, StatsResponse, StopResponse};

/// Default page size of the log history.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Platform used for sessions started by a completed login.
pub const LOGIN_PLATFORM: &str = "qq";

/// Loop run by the manual farm check.
pub const FARM_LOOP: &str = "farm";

/// Every operation of the control surface, independent of transport.
pub struct ControlPlane {
    controller: Arc<SessionController>,
    pipeline: Arc<StatsPipeline>,
    hub: Arc<Hub>,
    login: LoginFlow,
    config: SharedConfig,
    storage: Arc<dyn SnapshotStorage>,
}

impl ControlPlane {
    #[must_use]
    pub fn new(
        controller: Arc<SessionController>,
        pipeline: Arc<StatsPipeline>,
        hub: Arc<Hub>,
        login: LoginFlow,
        config: SharedConfig,
        storage: Arc<dyn SnapshotStorage>,
    ) -> Self {
        Self {
            controller,
            pipeline,
            hub,
            login,
            config,
            storage,
        }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    /// # Errors
    /// Returns `AlreadyRunning` or `ConnectionFailed`.
    pub async fn start_session(&self, request: StartRequest) -> Result<SessionStatus, ApiError> {
        if request.credential.trim().is_empty() {
            return Err(ApiError::validation("credential must not be empty"));
        }
        Ok(self
            .controller
            .start(&request.credential, &request.platform)
            .await?)
    }

    pub async fn stop_session(&self) -> StopResponse {
        StopResponse {
            stopped: self.controller.stop().await,
        }
    }

    /// # Errors
    /// Returns `AlreadyRunning` while a session runs, or `IssuanceError`.
    pub async fn request_login_code(&self) -> Result<LoginCode, ApiError> {
        if self.controller.is_running() {
            return Err(ControllerError::AlreadyRunning.into());
        }
        Ok(self.login.request_code().await?)
    }

    /// Poll `code` once. The poll that observes `OK` exchanges the ticket
    /// and starts the session before returning.
    ///
    /// # Errors
    /// Returns the poll, exchange or session start failure.
    pub async fn login_status(&self, code: &str) -> Result<LoginStatusResponse, ApiError> {
        let controller = Arc::clone(&self.controller);
        let status = self
            .login
            .advance(code, |credential| async move {
                controller
                    .start(&credential, LOGIN_PLATFORM)
                    .await
                    .map(|_| ())
            })
            .await?;
        Ok(status.into())
    }

    #[must_use]
    pub fn config(&self) -> RuntimeConfig {
        self.config.get()
    }

    /// # Errors
    /// Returns `ValidationError` if any interval is too short.
    pub fn update_config(&self, update: &ConfigUpdate) -> Result<RuntimeConfig, ApiError> {
        let config = self.config.update(update)?;
        tracing::info!(
            farm_ms = config.farm_check_interval_ms,
            friend_ms = config.friend_check_interval_ms,
            force_lowest = config.force_lowest_level_crop,
            "Config updated"
        );
        Ok(config)
    }

    /// Current counters and the last persisted session, if readable.
    pub async fn stats(&self) -> StatsResponse {
        let user = self.storage.load_session().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to read saved session: {e}");
            None
        });
        StatsResponse {
            stats: self.pipeline.stats(),
            user,
        }
    }

    pub async fn reset_stats(&self) -> StatsRecord {
        self.pipeline.reset().await
    }

    /// Newest `limit` log entries; a missing or zero limit means
    /// [`DEFAULT_LOG_LIMIT`].
    #[must_use]
    pub fn logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        let limit = limit.filter(|&n| n > 0).unwrap_or(DEFAULT_LOG_LIMIT);
        self.pipeline.logs().recent(limit)
    }

    pub fn clear_logs(&self) {
        self.pipeline.logs().clear();
    }

    /// Run the farm loop once now.
    ///
    /// # Errors
    /// Returns `NotRunning` without a session.
    pub async fn check_farm(&self) -> Result<(), ApiError> {
        Ok(self.controller.trigger(FARM_LOOP).await?)
    }

    /// Register an observer primed with the current status and stats.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe(|| {
            vec![
                Event::StateSnapshot(self.controller.status()),
                Event::StatsUpdated(self.pipeline.stats()),
            ]
        })
    }
}
