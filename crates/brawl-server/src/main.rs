//! Brawl multiplayer fight server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use brawl_core::ReaperConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

use server::ServerState;

fn env_secs(name: &str, default: u64) -> Duration {
    let secs = std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default);
    Duration::from_secs(secs)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse address from env or use default
    let addr: SocketAddr = std::env::var("SERVER_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".into())
        .parse()?;

    // Cleanup grace windows, both tunable
    let config = ReaperConfig {
        finished_grace: env_secs("FIGHT_CLEANUP_SECS", 5 * 60),
        disconnect_grace: env_secs("DISCONNECT_CLEANUP_SECS", 10),
    };

    info!("Starting Brawl server...");

    let state = Arc::new(ServerState::new(config));

    server::run_server(addr, state).await
}
