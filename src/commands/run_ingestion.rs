//! `run-ingestion --all` (spec §6): the long-running daemon. Starts the
//! Scheduler's control loop (spec §4.5) and, when the `api` feature is
//! enabled, the HTTP/WS control plane alongside it. Runs until interrupted.

use crate::bootstrap::Engine;
use resonance_core::Result;

pub async fn run(engine: Engine) -> Result<()> {
    let mut scheduler = engine.scheduler("resonance-0");
    let pool_status = scheduler.pool_status_handle();

    tracing::info!("starting scheduler control loop");

    #[cfg(feature = "api")]
    {
        let addr_str = std::env::var("RESONANCE_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let addr: std::net::SocketAddr = addr_str.parse().map_err(|e| resonance_core::error::ResonanceError::InputInvalid(format!("RESONANCE_LISTEN_ADDR: {e}")))?;

        let state = resonance_server::AppState::new(
            engine.store.clone(),
            engine.artifacts.clone(),
            engine.vectors.clone(),
            engine
                .retrieval
                .clone()
                .ok_or_else(|| resonance_core::error::ResonanceError::InputInvalid("LLM_API_KEY is not set; the HTTP control plane needs it".into()))?,
            pool_status,
            engine.config.clone(),
        );

        tracing::info!(%addr, "starting HTTP control plane");
        tokio::select! {
            _ = scheduler.run() => {}
            result = resonance_server::serve(addr, state) => { result.map_err(|e| resonance_core::error::ResonanceError::Other(e))?; }
            _ = tokio::signal::ctrl_c() => { tracing::info!("received ctrl-c, shutting down"); }
        }
    }

    #[cfg(not(feature = "api"))]
    {
        let _ = pool_status;
        tokio::select! {
            _ = scheduler.run() => {}
            _ = tokio::signal::ctrl_c() => { tracing::info!("received ctrl-c, shutting down"); }
        }
    }

    Ok(())
}
