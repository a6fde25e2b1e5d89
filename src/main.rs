//! Grid Battle Server - authoritative server for one battle round
//!
//! This is the main entry point. It handles:
//! - spawning the configured roster onto the map
//! - WebSocket connections for playing and for watching a player
//! - the round lifecycle: start delay, round timer and shutdown

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grid_battle_server::app::AppState;
use grid_battle_server::config::Config;
use grid_battle_server::http::build_router;
use grid_battle_server::notify::Severity;
use grid_battle_server::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Grid Battle Server");
    info!("Server address: {}", config.server_addr);

    // Create application state: map, roster and notification mailboxes
    let state = AppState::new(config.clone())?;
    info!(players = state.battle.player_count(), "Roster spawned");

    state.distributor.start();

    let listener = TcpListener::bind(config.server_addr).await?;

    info!(delay_secs = config.start_delay.as_secs(), "Waiting for round start");
    tokio::time::sleep(config.start_delay).await;

    let router = build_router(state.clone());

    info!("Server listening on {}", config.server_addr);
    info!("Health check: http://{}/health", config.server_addr);
    info!("Play endpoint: ws://{}/play", config.server_addr);
    info!("Watch endpoint: ws://{}/watch", config.server_addr);

    state
        .distributor
        .push_chat_broadcast("The round has started", Severity::Success);

    // Watchers are released together with the listener
    let distributor = state.distributor.clone();
    let round_duration = config.round_duration;
    let round_over = async move {
        shutdown_signal(round_duration).await;
        distributor.push_chat_broadcast("The round is over", Severity::Default);
        distributor.shutdown().await;
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(round_over)
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Resolves on Ctrl+C, SIGTERM or the end of the round
async fn shutdown_signal(round_duration: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
        _ = tokio::time::sleep(round_duration) => {
            info!("Round time elapsed, starting graceful shutdown");
        }
    }
}
