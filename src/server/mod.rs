pub mod stream;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use crate::error::Result;
use crate::export::MemoryExporter;
use crate::report::ComparisonReport;

/// Shared state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Recent export batches, filled by the scheduler's memory exporter
    pub windows: MemoryExporter,

    /// Running strategy comparison, updated on every export tick
    pub report: Arc<Mutex<ComparisonReport>>,
}

/// Builds the router for the live view.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/windows", get(stream::get_windows))
        .route("/api/windows/latest", get(stream::get_latest))
        .route("/api/windows/stream", get(stream::windows_stream))
        .route("/api/report", get(stream::get_report))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Bind first so a taken port fails startup, then serve in the background.
pub async fn spawn(addr: SocketAddr, state: Arc<AppState>) -> Result<JoinHandle<()>> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    tracing::info!(%local, "live view listening on http://{local}/api/windows");

    let app = create_router(state);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "live view server exited");
        }
    }))
}
