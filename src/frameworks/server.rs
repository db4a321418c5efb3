// Framework bootstrap for the pong server runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{create_game_handler, get_game_handler, ws_handler};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{SessionRegistry, SessionSettings};

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/create_game", post(create_game_handler))
        .route("/games/{game_key}", get(get_game_handler))
        .route("/ws/{game_key}", get(ws_handler))
        .with_state(state)
}

/// Serves on `listener` with settings read from the environment.
pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    run_with_settings(listener, config::session_settings()).await
}

pub async fn run_with_settings(
    listener: tokio::net::TcpListener,
    settings: SessionSettings,
) -> Result<()> {
    let address = listener.local_addr()?;
    tracing::debug!(
        tick_interval_ms = settings.coordinator.tick_interval.as_millis(),
        snapshot_every_ticks = settings.coordinator.snapshot_every_ticks,
        "session settings"
    );

    let state = Arc::new(AppState {
        session_registry: Arc::new(SessionRegistry::new(settings)),
    });

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    axum::serve(listener, router(state))
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::new(config::http_host(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}
