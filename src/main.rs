use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tb_asset_service::{
    cache::CacheManager,
    catalog::{CatalogClient, ShipNameMatcher},
    config::Config,
    health::HealthTracker,
    locator::{AssetLocator, HttpFetcher, LocatorOptions},
    manifest::ManifestStore,
    sources::SourceRegistry,
    store::LocalAssetStore,
    sync::BulkSyncService,
    web::{AppState, WebServer},
};

#[derive(Parser)]
#[command(name = "tb-asset-service")]
#[command(version = "0.1.0")]
#[command(about = "Unit asset resolution and caching service for Territory Battle tooling")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.log_level == "trace" {
        format!("tb_asset_service={},tower_http=trace", cli.log_level)
    } else {
        format!("tb_asset_service={}", cli.log_level)
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting asset service v{}", env!("CARGO_PKG_VERSION"));

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    info!("Configuration loaded from: {}", cli.config);

    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }

    let registry = SourceRegistry::new(&config.sources, &config.web.base_url);
    let health = HealthTracker::new(registry.clone());
    let store = LocalAssetStore::new(
        config.storage.asset_store_path.clone(),
        config.sync.min_asset_bytes,
    );
    let manifest = ManifestStore::new(config.storage.manifest_path.clone());
    if manifest.load().await?.is_none() {
        info!("No manifest on disk yet; run asset-sync to generate one");
    }

    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let locator = Arc::new(AssetLocator::new(
        health.clone(),
        fetcher,
        store.clone(),
        manifest.clone(),
        ShipNameMatcher::new(),
        LocatorOptions::from_config(&config),
    ));
    let cache = CacheManager::new(locator.clone(), config.cache.clone());

    let catalog = CatalogClient::new(
        config.sources.catalog_url.clone(),
        Duration::from_secs(config.http.download_timeout_secs),
        &config.http.user_agent,
    )?;
    let sync = Arc::new(BulkSyncService::new(
        catalog,
        locator.clone(),
        store.clone(),
        manifest.clone(),
        config.sync.clone(),
        &config.web.base_url,
        config.storage.report_path.clone(),
    ));

    let server = WebServer::new(AppState {
        config,
        registry,
        health,
        locator,
        cache,
        store,
        manifest,
        sync,
    })?;

    server.serve().await
}
