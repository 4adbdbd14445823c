//! Headless HTTP/WS control plane over the orchestration engine (spec §6).
//! Owns the `/process`, `/query`, `/status`, `/health` and `/ws` surfaces;
//! the chat-bot protocol adapter in [`chatbot`] is transport-agnostic and
//! meant to be driven by whatever bot-API client the binary wires up.

pub mod chatbot;
pub mod error;
pub mod routes;
pub mod state;
pub mod ws;

pub use state::{AppState, ResonanceEvent};

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builds the router; split out from [`serve`] so tests can exercise routes
/// with `tower::ServiceExt::oneshot` without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/process", post(routes::process::process))
        .route("/query", post(routes::query::query))
        .route("/status", get(routes::status::status))
        .route("/health", get(routes::health::health))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves the control plane until the process is terminated.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);
    tracing::info!(%addr, "resonance-server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
