//! Web layer
//!
//! HTTP interface for the asset service. Handlers are thin: parameter
//! parsing at the boundary, then a call into the locator, cache, or sync
//! service. Asset lookups never 404 for an unknown unit since resolution
//! always terminates at the bundled fallback; 404 is reserved for things
//! that genuinely do not exist (no manifest yet, unknown source name).

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{
    cache::CacheManager, config::Config, health::HealthTracker, locator::AssetLocator,
    manifest::ManifestStore, sources::SourceRegistry, store::LocalAssetStore,
    sync::BulkSyncService,
};

pub mod api;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: SourceRegistry,
    pub health: HealthTracker,
    pub locator: Arc<AssetLocator>,
    pub cache: CacheManager,
    pub store: LocalAssetStore,
    pub manifest: ManifestStore,
    pub sync: Arc<BulkSyncService>,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(state: AppState) -> Result<Self> {
        let addr: SocketAddr =
            format!("{}:{}", state.config.web.host, state.config.web.port).parse()?;
        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    /// Router with all routes and middleware. Split out so tests can drive
    /// it without binding a socket.
    pub fn create_router(state: AppState) -> Router {
        Router::new()
            // Liveness
            .route("/health", get(api::health_check))
            // Asset lookup API
            .route("/assets/unit/:game_id/portrait", get(api::get_portrait))
            .route("/assets/unit/:game_id/icon", get(api::get_icon))
            .route("/assets/unit/:game_id/assets", get(api::get_unit_assets))
            .route("/assets/manifest", get(api::get_manifest))
            .route("/assets/health", get(api::get_source_health))
            .route("/assets/refresh-cache", post(api::refresh_cache))
            // Byte-serving endpoints
            .route("/assets/image/:game_id", get(api::redirect_to_image))
            .route("/assets/proxy/:game_id", get(api::serve_asset_bytes))
            .route("/assets/fallback.png", get(api::serve_fallback))
            // Admin
            .route("/assets/cache/clear", post(api::clear_cache))
            .route("/assets/sources/:name/enable", post(api::enable_source))
            .route("/assets/sources/:name/disable", post(api::disable_source))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        tracing::info!("Web server listening on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}
