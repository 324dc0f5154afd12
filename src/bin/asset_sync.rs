//! Bulk sync CLI
//!
//! Populates the local asset store and regenerates the manifest outside
//! the serving path, typically from cron or CI. Exits non-zero only when
//! the run could not produce a usable manifest: a catalog fetch failure
//! or a manifest write failure. Individual asset failures and a failed
//! report write are logged and tolerated.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tb_asset_service::{
    catalog::{CatalogClient, ShipNameMatcher},
    config::Config,
    errors::SyncError,
    health::HealthTracker,
    locator::{AssetLocator, HttpFetcher, LocatorOptions},
    manifest::ManifestStore,
    sources::SourceRegistry,
    store::LocalAssetStore,
    sync::BulkSyncService,
};

#[derive(Parser)]
#[command(name = "asset-sync")]
#[command(version = "0.1.0")]
#[command(about = "Bulk-sync unit assets into the local store and regenerate the manifest")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Re-download assets that are already valid on disk
    #[arg(short, long)]
    force: bool,

    /// Override the configured batch size
    #[arg(short, long, value_name = "N")]
    batch_size: Option<usize>,

    /// Validate the store without downloading anything
    #[arg(long)]
    validate_only: bool,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tb_asset_service={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    std::env::set_var("CONFIG_FILE", &cli.config);
    let mut config = Config::load()?;
    if let Some(batch_size) = cli.batch_size {
        config.sync.batch_size = batch_size.max(1);
    }

    let registry = SourceRegistry::new(&config.sources, &config.web.base_url);
    let health = HealthTracker::new(registry);
    let store = LocalAssetStore::new(
        config.storage.asset_store_path.clone(),
        config.sync.min_asset_bytes,
    );
    let manifest = ManifestStore::new(config.storage.manifest_path.clone());
    manifest.load().await?;

    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let locator = Arc::new(AssetLocator::new(
        health,
        fetcher,
        store.clone(),
        manifest.clone(),
        ShipNameMatcher::new(),
        LocatorOptions::from_config(&config),
    ));

    let catalog = CatalogClient::new(
        config.sources.catalog_url.clone(),
        Duration::from_secs(config.http.download_timeout_secs),
        &config.http.user_agent,
    )?;
    let sync = BulkSyncService::new(
        catalog,
        locator,
        store,
        manifest,
        config.sync.clone(),
        &config.web.base_url,
        config.storage.report_path.clone(),
    );

    if cli.validate_only {
        return match sync.validate_all().await {
            Ok((report, _)) => {
                info!(
                    "Validation: {}/{} valid, {} corrupted, {} missing ({:.1}% coverage)",
                    report.valid,
                    report.checked,
                    report.corrupted,
                    report.missing,
                    report.coverage_percent
                );
                Ok(())
            }
            Err(err @ SyncError::ReportWrite { .. }) => {
                // The sweep itself succeeded; losing the advisory report is
                // not worth a failed cron run
                warn!("{err}");
                Ok(())
            }
            Err(err) => {
                error!("Validation failed: {err}");
                Err(err.into())
            }
        };
    }

    match sync.sync_all(cli.force).await {
        Ok(result) => {
            info!(
                "Sync finished: {} downloaded, {} skipped, {} failed of {}",
                result.downloaded, result.skipped, result.failed, result.total
            );
            for err in &result.errors {
                warn!("  {err}");
            }
            Ok(())
        }
        Err(err) => {
            error!("Sync failed: {err}");
            Err(err.into())
        }
    }
}
