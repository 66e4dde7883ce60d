//! Server module for Glosa Core.
//!
//! This module contains the HTTP API (axum) over the cache setup pipeline,
//! the registry and the query router.

mod handlers;
pub mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::app::Glosa;
use crate::error::Result;
use crate::router::QueryRouter;
use logging::RequestLoggerLayer;

/// Request body limit; uploads carry whole documents.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Component wiring.
    pub glosa: Glosa,
    /// Router shared by the chat endpoints.
    pub router: Arc<QueryRouter>,
    /// Process start time.
    pub started: Instant,
}

impl AppState {
    /// Builds handler state from `glosa`.
    pub fn new(glosa: Glosa) -> Self {
        let router = Arc::new(glosa.router());
        Self { glosa, router, started: Instant::now() }
    }
}

/// Builds the HTTP application.
///
/// Routes:
/// - POST /cache/setup
/// - GET /cache, DELETE /cache
/// - POST /chat, POST /chat/upload
/// - GET /health
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/cache/setup", post(handlers::setup_cache))
        .route("/cache", get(handlers::list_caches).delete(handlers::clear_caches))
        .route("/chat", post(handlers::chat))
        .route("/chat/upload", post(handlers::chat_upload))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(RequestLoggerLayer)
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
}

/// Start the Glosa HTTP server on `address` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the server fails to bind to the address.
pub async fn run(glosa: Glosa, address: SocketAddr) -> Result<()> {
    let app = app(AppState::new(glosa));

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %listener.local_addr()?, "Glosa server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
