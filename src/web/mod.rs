//! Web layer
//!
//! Thin axum handlers over [`LocationLookupService`] for reads and the
//! loader for manual triggers. Loads requested over HTTP run on background
//! tasks and the handler answers `202 Accepted` immediately.

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::WebConfig;
use crate::ingestor::LocationCacheLoader;
use crate::services::LocationLookupService;

pub mod api;
pub mod responses;

pub use responses::{handle_error, handle_result, ApiResponse};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub loader: Arc<LocationCacheLoader>,
    pub lookup: LocationLookupService,
}

impl AppState {
    pub fn new(loader: Arc<LocationCacheLoader>) -> Self {
        let lookup =
            LocationLookupService::new(loader.store(), loader.state_manager().clone());
        Self { loader, lookup }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .nest("/api/v1/locations", location_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api::load_status))
        .route("/search", get(api::search_locations))
        .route("/provinces/{code}", get(api::get_province))
        .route("/districts/{code}", get(api::get_district))
        .route("/wards/{code}", get(api::get_ward))
        .route("/load", post(api::trigger_load))
        .route("/refresh", post(api::trigger_refresh))
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
        Ok(Self {
            app: router(state),
            addr,
        })
    }

    /// Serve until the token is cancelled
    pub async fn serve_with_cancellation(self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        info!("Web server listening on {}", self.addr);

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                cancellation_token.cancelled().await;
                info!("Web server received cancellation signal, shutting down gracefully");
            })
            .await?;
        Ok(())
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}
