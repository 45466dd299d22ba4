//! Liveness endpoint for process supervisors.
//!
//! Answers `OK` on `/`. It holds no state and knows nothing about relay
//! runs; it only proves the process is scheduling work.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tracing::info;

/// Liveness response body
pub const HEALTH_OK: &str = "OK";

async fn liveness() -> &'static str {
    HEALTH_OK
}

/// Build the liveness router
pub fn router() -> Router {
    Router::new().route("/", any(liveness))
}

/// Bind the liveness listener
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind liveness endpoint on {}", addr))
}

/// Serve the liveness endpoint on an already bound listener until the
/// process ends
pub async fn serve(listener: TcpListener) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "Liveness endpoint listening");
    axum::serve(listener, router())
        .await
        .context("Liveness endpoint stopped")?;
    Ok(())
}
