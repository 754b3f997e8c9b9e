use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::{get, post};
use hark_core::Transcriber;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{api, mcp};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub transcriber: Arc<Transcriber>,
    /// Model directory every request is pinned to.
    pub models_dir: PathBuf,
    /// Cancelled on shutdown; each request runs under a child token.
    pub shutdown: CancellationToken,
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/transcribe", post(api::transcribe_handler))
        .route("/mcp", post(mcp::mcp_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until Ctrl-C, then cancel in-flight batches and drain.
pub async fn serve(listen: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind {listen}"))?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "hark server listening");

    let shutdown = state.shutdown.clone();
    let router = build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await
        .context("server error")?;
    Ok(())
}
