//! Control plane in front of a simulated farm agent.
//!
//! Run with: cargo run -p sim-server
//!
//! Then follow the live channel with
//! `curl -N http://127.0.0.1:9401/api/events`.

mod sim;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use farmctl_core::{
    CaptureLayer, GameClient, Hub, SharedConfig, SnapshotStorage, StatsPipeline,
    log_ring::DEFAULT_CAPACITY, pipeline,
};
use farmctl_login::{HttpLoginBackend, LoginFlow};
use farmctl_session::{SessionController, storage::JsonFileStorage};
use farmctl_transport::ControlPlane;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, filter::Targets, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::sim::{FarmLoop, FriendLoop, SellLoop, SimClient, SimInvites, TaskLoop};

#[derive(Debug, Parser)]
#[command(name = "sim-server", about = "Farm agent control plane with a simulated game")]
struct Args {
    /// Address to serve the control surface on.
    #[arg(long, env = "FARMCTL_BIND", default_value = "127.0.0.1:9401")]
    bind: SocketAddr,

    /// Directory holding user.json and stats.json.
    #[arg(long, env = "FARMCTL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL of the login code service.
    #[arg(long, env = "FARMCTL_LOGIN_URL", default_value = "http://127.0.0.1:9402/login")]
    login_url: String,

    /// Seconds between keep-alive frames on the event channel.
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,

    /// Log lines kept in memory.
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    log_capacity: usize,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("farmctl")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let (sink, rx) = pipeline::channel();

    // Only the agent's own lines feed the stats pipeline.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            CaptureLayer::new(sink.clone())
                .with_filter(Targets::new().with_target("sim_server", Level::INFO)),
        )
        .init();

    let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
    let storage: Arc<dyn SnapshotStorage> = Arc::new(JsonFileStorage::new(&data_dir));
    match storage.load_session().await {
        Ok(Some(user)) => tracing::info!(
            name = %user.name,
            level = user.level,
            platform = %user.platform,
            "Loaded last session"
        ),
        Ok(None) => tracing::info!(dir = %data_dir.display(), "No saved session"),
        Err(e) => tracing::warn!("Failed to read saved session: {e}"),
    }

    let hub = Arc::new(Hub::new());
    hub.start_heartbeat(Duration::from_secs(args.heartbeat_secs));

    let stats = Arc::new(
        StatsPipeline::load(Arc::clone(&storage), Arc::clone(&hub), args.log_capacity).await,
    );
    let record = stats.stats();
    tracing::info!(
        harvest = record.harvest_count,
        steal = record.steal_count,
        sell_gold = record.sell_gold,
        "Loaded stats"
    );
    let ingest = Arc::clone(&stats).spawn_ingest(rx);

    let config = SharedConfig::default();
    let client = Arc::new(SimClient::new());
    let game: Arc<dyn GameClient> = client.clone();
    let controller = SessionController::new(
        game,
        Arc::clone(&storage),
        Arc::clone(&hub),
        config.clone(),
    )
    .with_loop(Arc::new(FarmLoop::new(Arc::clone(&client))))
    .with_loop(Arc::new(FriendLoop::new(Arc::clone(&client))))
    .with_loop(Arc::new(TaskLoop::default()))
    .with_loop(Arc::new(SellLoop::new(Arc::clone(&client), sink)))
    .with_invites(Arc::new(SimInvites));

    let login = LoginFlow::new(Arc::new(HttpLoginBackend::new(args.login_url)));
    let plane = Arc::new(ControlPlane::new(
        Arc::new(controller),
        stats,
        Arc::clone(&hub),
        login,
        config,
        storage,
    ));

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    tracing::info!("Control plane listening on http://{}", args.bind);

    let shutdown_hub = Arc::clone(&hub);
    axum::serve(listener, farmctl_transport::router(Arc::clone(&plane)))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            // Ends every open event stream so the server can drain.
            shutdown_hub.shutdown();
        })
        .await
        .context("Server error")?;

    plane.stop_session().await;
    ingest.abort();
    Ok(())
}
