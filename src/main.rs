//! Alpagame Server
//!
//! Hosts meadow rooms: each room owns a world of players, wandering alpacas
//! and grass, simulated at a fixed tick and replicated to its clients over
//! WebSocket. Rooms are created on demand by the matchmaker and torn down
//! when they empty out.

mod app;
mod config;
mod game;
mod http;
mod matchmaking;
mod util;
mod ws;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::AppState;
use crate::config::{Config, LogFormat};
use crate::http::build_router;
use crate::util::time::{init_server_time, SIMULATION_TPS, SNAPSHOT_TPS};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config.log_level, config.log_format);
    init_server_time();

    info!(
        simulation_tps = SIMULATION_TPS,
        snapshot_tps = SNAPSHOT_TPS,
        alpacas = config.world.alpaca_count,
        decorations = config.world.decoration_count,
        clamp_intent = config.world.clamp_player_intent,
        admission = ?config.admission,
        "Starting Alpagame room server"
    );

    let state = AppState::new(config.clone());
    let rooms = state.rooms.clone();
    let router = build_router(state);

    let listener = TcpListener::bind(config.server_addr).await?;
    info!(addr = %config.server_addr, "Accepting room connections on /ws");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Connections are gone; stop the tick loops still running
    let remaining = rooms.active_rooms();
    rooms.shutdown().await;

    info!(rooms_closed = remaining, "Room server stopped");
    Ok(())
}

/// `RUST_LOG` wins over `LOG_LEVEL` when set
fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, closing rooms"),
        _ = terminate => info!("SIGTERM received, closing rooms"),
    }
}
