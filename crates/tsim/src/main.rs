//! tsim: trade cost simulator binary
//!
//! Streams an L2 order book, recomputes expected trade costs on every
//! snapshot and serves the results over HTTP.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tsim::{run_server, AppState, Coordinator, SimulatorService};
use tsim_config::SimulatorConfig;
use tsim_feed::{FeedManager, WsTransport};
use tsim_model::CostModel;

#[derive(Parser, Debug)]
#[command(name = "tsim")]
#[command(about = "Real-time trade cost simulator for L2 order book streams")]
struct Args {
    /// Path to YAML configuration file; built-in defaults when omitted
    #[arg(short, long, env = "TSIM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the feed WebSocket endpoint
    #[arg(long, env = "TSIM_ENDPOINT")]
    endpoint: Option<String>,

    /// HTTP server bind address
    #[arg(long, env = "TSIM_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tsim=info,tsim_feed=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let config = SimulatorConfig::load(path)?;
            info!(path = %path.display(), "Loaded configuration");
            config
        }
        None => SimulatorConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.feed.endpoint = endpoint;
        config.feed.validate()?;
    }

    let feed_name = format!("{}:{}", config.feed.exchange, config.feed.symbol);
    info!(
        feed = %feed_name,
        endpoint = %config.feed.endpoint,
        asset = %config.inputs.asset,
        fee_tier = config.inputs.fee_tier.as_str(),
        "Starting trade cost simulator"
    );

    let (feed, feed_task) = FeedManager::from_config(&config.feed, WsTransport).spawn();
    let coordinator = Coordinator::new(CostModel::new(config.model.clone()), config.inputs.clone());
    let (simulator, service_task) = SimulatorService::spawn(coordinator, feed);
    simulator.connect();

    // Setup shutdown signal
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(true).ok();
    });

    let state = AppState::new(feed_name, simulator.clone());
    run_server(args.listen_addr, state, async move {
        shutdown_rx.changed().await.ok();
    })
    .await?;

    simulator.shutdown();
    feed_task.await?;
    service_task.await?;
    info!("Shutdown complete");
    Ok(())
}
