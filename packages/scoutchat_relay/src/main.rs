use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

use scoutchat_relay::config::{self, FileConfig, RelayConfig};
use scoutchat_relay::identity::ClaimedNameIdentity;
use scoutchat_relay::metrics::RelayMetrics;
use scoutchat_relay::relay::ChatRelay;
use scoutchat_relay::{AppState, app};

#[derive(Parser)]
#[command(name = "scoutchat-relay")]
#[command(about = "WebSocket broadcast relay for the scout group chat")]
struct Cli {
    /// Host to bind to (overrides scoutchat.toml)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the relay (overrides scoutchat.toml)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory containing scoutchat.toml (defaults to the working directory)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "scoutchat_relay=debug,tower_http=debug,info"
    } else {
        "scoutchat_relay=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting scout chat relay");

    let config_dir = cli.config_dir.clone().unwrap_or_else(|| PathBuf::from("."));
    let file_config: FileConfig = config::load_config(&config_dir)
        .extract()
        .context("Failed to load configuration")?;
    let relay_config = RelayConfig::from_file(&file_config.relay);

    // CLI flags beat scoutchat.toml, which beats the built-in defaults.
    let host = cli
        .host
        .or(file_config.server.host)
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = cli.port.or(file_config.server.port).unwrap_or(4000);

    info!(
        "Relay config: max_connections={}, rate={}/s (burst {}), channel_capacity={}",
        relay_config.max_connections,
        relay_config.message_rate_per_sec,
        relay_config.message_burst,
        relay_config.send_channel_capacity,
    );

    let metrics = Arc::new(RelayMetrics::new());
    let relay = Arc::new(ChatRelay::new(
        relay_config,
        Arc::new(ClaimedNameIdentity),
        metrics.clone(),
    ));

    let app = app(AppState {
        relay,
        metrics: metrics.clone(),
    });

    let addr = format!("{}:{}", host, port).parse::<SocketAddr>()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Scout chat relay listening on http://{}", actual_addr);
    info!("Chat endpoint: ws://{}/ws", actual_addr);

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received shutdown signal, cleaning up...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    let snapshot = metrics.snapshot();
    info!(
        "Shutdown complete: {} connections served, {} messages broadcast, {} deliveries dropped",
        snapshot.connections.total, snapshot.messages.broadcast, snapshot.messages.dropped,
    );
    server_result
}
