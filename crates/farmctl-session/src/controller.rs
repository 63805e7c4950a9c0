//! Session lifecycle controller.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use farmctl_core::{
    AgentLoop, CollaboratorError, Event, GameClient, GameEvent, Hub, InviteRedeemer,
    SessionSnapshot, SessionStatus, SharedConfig, SnapshotStorage,
};
use tokio::{
    sync::broadcast::error::RecvError,
    task::{JoinHandle, JoinSet},
};

/// Session controller error.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Session already running")]
    AlreadyRunning,
    #[error("Session not running")]
    NotRunning,
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] CollaboratorError),
    #[error("Unknown loop: {0}")]
    UnknownLoop(String),
    #[error("Loop {name} failed: {source}")]
    LoopFailed {
        name: &'static str,
        source: CollaboratorError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Starting,
    Running,
}

struct State {
    phase: Phase,
    login_code: Option<String>,
    // Bumped on every start so a start that lost a race with stop can tell.
    generation: u64,
}

/// Tasks owned by a running session.
#[derive(Default)]
struct Workers {
    loops: JoinSet<()>,
    forwarder: Option<JoinHandle<()>>,
}

impl Workers {
    fn abort(&mut self) {
        // Dropping the set aborts every loop task.
        self.loops = JoinSet::new();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// Controller for the single agent session.
///
/// The only writer of session state. `stop` flips the state before any
/// teardown, so readers never see a session that is half torn down as
/// running.
pub struct SessionController {
    client: Arc<dyn GameClient>,
    storage: Arc<dyn SnapshotStorage>,
    hub: Arc<Hub>,
    config: SharedConfig,
    loops: Vec<Arc<dyn AgentLoop>>,
    invites: Option<Arc<dyn InviteRedeemer>>,
    state: Mutex<State>,
    workers: Mutex<Workers>,
}

impl SessionController {
    /// Create a new session controller.
    #[must_use]
    pub fn new(
        client: Arc<dyn GameClient>,
        storage: Arc<dyn SnapshotStorage>,
        hub: Arc<Hub>,
        config: SharedConfig,
    ) -> Self {
        Self {
            client,
            storage,
            hub,
            config,
            loops: Vec::new(),
            invites: None,
            state: Mutex::new(State {
                phase: Phase::Stopped,
                login_code: None,
                generation: 0,
            }),
            workers: Mutex::new(Workers::default()),
        }
    }

    /// Add a loop started with every session.
    #[must_use]
    pub fn with_loop(mut self, agent_loop: Arc<dyn AgentLoop>) -> Self {
        self.loops.push(agent_loop);
        self
    }

    /// Set the invite redeemer run once per session start.
    #[must_use]
    pub fn with_invites(mut self, invites: Arc<dyn InviteRedeemer>) -> Self {
        self.invites = Some(invites);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current session status. Never blocks on collaborators.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        let (running, has_login_code) = {
            let state = self.state();
            (state.phase == Phase::Running, state.login_code.is_some())
        };
        SessionStatus {
            running,
            platform: self.config.get().platform,
            has_login_code,
            player: running.then(|| self.client.player_state()),
        }
    }

    /// Whether a session is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().phase == Phase::Running
    }

    /// Start a session.
    ///
    /// Loops are only started once the connection is ready, so a failed
    /// connection leaves nothing behind.
    ///
    /// # Errors
    /// Returns `AlreadyRunning` if a session is running or starting, and
    /// `ConnectionFailed` if definitions or the connection fail.
    pub async fn start(
        &self,
        credential: &str,
        platform: &str,
    ) -> Result<SessionStatus, ControllerError> {
        let generation = {
            let mut state = self.state();
            if state.phase != Phase::Stopped {
                return Err(ControllerError::AlreadyRunning);
            }
            state.phase = Phase::Starting;
            state.login_code = Some(credential.to_string());
            state.generation += 1;
            state.generation
        };
        self.config.set_platform(platform);
        tracing::info!(platform, "Starting session");

        if let Err(e) = self.connect(credential).await {
            let mut state = self.state();
            state.phase = Phase::Stopped;
            state.login_code = None;
            drop(state);
            tracing::warn!(platform, "Session start failed: {e}");
            return Err(ControllerError::ConnectionFailed(e));
        }

        {
            // Held across the flip so a concurrent stop aborts these workers
            // rather than an empty set.
            let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
            self.state().phase = Phase::Running;
            self.spawn_workers(&mut workers);
        }
        self.redeem_invites().await;

        let player = self.client.player_state();
        let snapshot = SessionSnapshot {
            gid: player.gid,
            name: player.name.clone(),
            level: player.level,
            platform: platform.to_string(),
            last_update: Utc::now(),
        };
        if let Err(e) = self.storage.save_session(&snapshot).await {
            tracing::warn!("Failed to persist session snapshot: {e}");
        }

        let status = self.status();
        let current = {
            let state = self.state();
            state.phase == Phase::Running && state.generation == generation
        };
        if current {
            tracing::info!(name = %player.name, level = player.level, "Session started");
            self.hub.publish(Event::SessionStarted {
                platform: platform.to_string(),
            });
            self.hub.publish(Event::StateSnapshot(status.clone()));
        }
        Ok(status)
    }

    async fn connect(&self, credential: &str) -> Result<(), CollaboratorError> {
        self.client.load_definitions().await?;
        self.client.connect(credential).await
    }

    fn spawn_workers(&self, workers: &mut Workers) {
        workers.abort();

        for agent_loop in &self.loops {
            let agent_loop = Arc::clone(agent_loop);
            let config = self.config.clone();
            workers.loops.spawn(async move {
                tokio::time::sleep(agent_loop.initial_delay()).await;
                loop {
                    if let Err(e) = agent_loop.tick().await {
                        tracing::warn!(name = agent_loop.name(), "Loop tick failed: {e}");
                    }
                    tokio::time::sleep(agent_loop.interval(&config.get())).await;
                }
            });
        }

        let mut events = self.client.subscribe_events();
        let hub = Arc::clone(&self.hub);
        workers.forwarder = Some(tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(GameEvent::LandsChanged(lands)) => {
                        hub.publish(Event::LandsChanged { count: lands.len() });
                    }
                    Ok(GameEvent::FriendApplicationReceived(applications)) => {
                        hub.publish(Event::FriendApplication {
                            count: applications.len(),
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Game event forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    async fn redeem_invites(&self) {
        let Some(invites) = &self.invites else {
            return;
        };
        match invites.redeem_all().await {
            Ok(redeemed) => tracing::info!(redeemed, "Invite codes processed"),
            Err(e) => tracing::warn!("Invite redemption failed: {e}"),
        }
    }

    /// Stop the running session. A no-op if none is running.
    ///
    /// Returns whether a session was stopped.
    pub async fn stop(&self) -> bool {
        {
            let mut state = self.state();
            if state.phase != Phase::Running {
                return false;
            }
            state.phase = Phase::Stopped;
            state.login_code = None;
        }

        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort();
        self.client.disconnect().await;

        self.hub.publish(Event::SessionStopped {});
        tracing::info!("Session stopped");
        true
    }

    /// Run one tick of the loop called `name` right away.
    ///
    /// # Errors
    /// Returns `NotRunning` without a session, `UnknownLoop` for an
    /// unregistered name, and `LoopFailed` if the tick fails.
    pub async fn trigger(&self, name: &str) -> Result<(), ControllerError> {
        if !self.is_running() {
            return Err(ControllerError::NotRunning);
        }
        let agent_loop = self
            .loops
            .iter()
            .find(|l| l.name() == name)
            .ok_or_else(|| ControllerError::UnknownLoop(name.to_string()))?;
        agent_loop
            .tick()
            .await
            .map_err(|source| ControllerError::LoopFailed {
                name: agent_loop.name(),
                source,
            })
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.workers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .abort();
    }
}
