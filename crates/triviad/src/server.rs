//! HTTP server for triviad

use crate::routes;
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::info;
use trivia_common::SourceResolver;

/// Application state shared across handlers
pub struct AppState {
    pub resolver: Arc<SourceResolver>,
    /// Server-side cap on the caller-supplied recent list
    pub recent_window: usize,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(resolver: Arc<SourceResolver>, recent_window: usize) -> Self {
        Self {
            resolver,
            recent_window,
            start_time: Instant::now(),
        }
    }
}

/// Assemble the router (separate from `run` so tests can drive it).
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::question_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run(state: AppState, bind_addr: &str) -> Result<()> {
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("  Listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
