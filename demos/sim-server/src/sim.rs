//! Simulated game client and agent loops.
//!
//! The loops report what they do the way the real ones do: farm, friend and
//! task work through tagged log lines, selling through typed actions.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use farmctl_core::{
    ActionKind, ActionSink, AgentLoop, CollaboratorError, GameClient, GameEvent, InviteRedeemer,
    PlayerState, RuntimeConfig,
    extract::{TAG_FARM, TAG_FRIEND, TAG_TASK, TAG_WAREHOUSE},
};
use serde_json::json;
use tokio::sync::broadcast;

const CONNECT_LATENCY: Duration = Duration::from_millis(300);
const LAND_COUNT: u64 = 18;

/// Game client that pretends to talk to the remote service.
pub struct SimClient {
    player: Mutex<PlayerState>,
    connected: AtomicBool,
    events: broadcast::Sender<GameEvent>,
}

impl SimClient {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            player: Mutex::new(PlayerState {
                gid: 10_001,
                name: "sim-farmer".to_string(),
                level: 12,
                gold: 1_200,
                exp: 3_400,
            }),
            connected: AtomicBool::new(false),
            events,
        }
    }

    fn earn(&self, gold: u64, exp: u64) {
        let mut player = self.player.lock().unwrap_or_else(PoisonError::into_inner);
        player.gold += gold;
        player.exp += exp;
        if player.exp >= u64::from(player.level) * 500 {
            player.level += 1;
            tracing::info!(tag = "升级", level = player.level, "Level up");
        }
    }

    fn emit(&self, event: GameEvent) {
        if self.connected.load(Ordering::SeqCst) {
            let _ = self.events.send(event);
        }
    }
}

#[async_trait]
impl GameClient for SimClient {
    async fn load_definitions(&self) -> Result<(), CollaboratorError> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tracing::info!(crops = 42, "Loaded game definitions");
        Ok(())
    }

    async fn connect(&self, credential: &str) -> Result<(), CollaboratorError> {
        tokio::time::sleep(CONNECT_LATENCY).await;
        if credential.len() < 4 {
            return Err(CollaboratorError::Connection("credential rejected".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("Connected to game server");
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("Disconnected from game server");
    }

    fn player_state(&self) -> PlayerState {
        self.player
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe_events(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }
}

/// Tends the player's own lands.
pub struct FarmLoop {
    client: Arc<SimClient>,
    ticks: AtomicU64,
}

impl FarmLoop {
    #[must_use]
    pub const fn new(client: Arc<SimClient>) -> Self {
        Self {
            client,
            ticks: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AgentLoop for FarmLoop {
    fn name(&self) -> &'static str {
        "farm"
    }

    fn interval(&self, config: &RuntimeConfig) -> Duration {
        config.farm_check_interval()
    }

    async fn tick(&self) -> Result<(), CollaboratorError> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        let ripe = n % 4 + 1;
        tracing::info!(tag = TAG_FARM, "收获{ripe}/种植{ripe}/浇水{}", n % 3);
        if n % 5 == 0 {
            tracing::info!(tag = TAG_FARM, "施肥 {}/{LAND_COUNT}", ripe * 2);
        }
        self.client.earn(ripe * 30, ripe * 20);

        if n % 3 == 0 {
            let lands = (0..LAND_COUNT).map(|id| json!({ "id": id })).collect();
            self.client.emit(GameEvent::LandsChanged(lands));
        }
        Ok(())
    }
}

/// Visits friends' farms.
pub struct FriendLoop {
    client: Arc<SimClient>,
    ticks: AtomicU64,
}

impl FriendLoop {
    #[must_use]
    pub const fn new(client: Arc<SimClient>) -> Self {
        Self {
            client,
            ticks: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl AgentLoop for FriendLoop {
    fn name(&self) -> &'static str {
        "friend"
    }

    fn interval(&self, config: &RuntimeConfig) -> Duration {
        config.friend_check_interval()
    }

    fn initial_delay(&self) -> Duration {
        Duration::from_secs(2)
    }

    async fn tick(&self) -> Result<(), CollaboratorError> {
        let n = self.ticks.fetch_add(1, Ordering::SeqCst);
        match n % 3 {
            0 => tracing::info!(tag = TAG_FRIEND, "偷{}", n % 5 + 1),
            1 => tracing::info!(tag = TAG_FRIEND, "帮忙除草1/除虫1"),
            _ => tracing::info!(tag = TAG_FRIEND, "No ripe crops to visit"),
        }
        if n % 7 == 6 {
            self.client
                .emit(GameEvent::FriendApplicationReceived(vec![json!({ "gid": 20_000 + n })]));
        }
        Ok(())
    }
}

/// Claims finished daily tasks.
#[derive(Default)]
pub struct TaskLoop {
    ticks: AtomicU64,
}

#[async_trait]
impl AgentLoop for TaskLoop {
    fn name(&self) -> &'static str {
        "task"
    }

    fn interval(&self, _config: &RuntimeConfig) -> Duration {
        Duration::from_secs(60)
    }

    fn initial_delay(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn tick(&self) -> Result<(), CollaboratorError> {
        if self.ticks.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
            tracing::info!(tag = TAG_TASK, "领取 daily task reward");
        }
        Ok(())
    }
}

/// Sells harvested fruit and reports through the typed action path.
pub struct SellLoop {
    client: Arc<SimClient>,
    sink: ActionSink,
}

impl SellLoop {
    #[must_use]
    pub const fn new(client: Arc<SimClient>, sink: ActionSink) -> Self {
        Self { client, sink }
    }
}

#[async_trait]
impl AgentLoop for SellLoop {
    fn name(&self) -> &'static str {
        "sell"
    }

    fn interval(&self, _config: &RuntimeConfig) -> Duration {
        Duration::from_secs(120)
    }

    fn initial_delay(&self) -> Duration {
        Duration::from_secs(30)
    }

    async fn tick(&self) -> Result<(), CollaboratorError> {
        let (species, gold) = (2, 180);
        self.sink.record(ActionKind::Sell, species);
        self.sink.record(ActionKind::SellGold, gold);
        self.client.earn(gold, 0);
        tracing::info!(tag = TAG_WAREHOUSE, species, gold, "Sold fruit");
        Ok(())
    }
}

/// Redeems invite codes; the simulation has none queued.
pub struct SimInvites;

#[async_trait]
impl InviteRedeemer for SimInvites {
    async fn redeem_all(&self) -> Result<usize, CollaboratorError> {
        Ok(0)
    }
}
