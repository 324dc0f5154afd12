//! Bulk sync and validation
//!
//! Walks the unit catalog and populates the local asset store ahead of
//! demand: three portrait sizes plus the icon for every unit. Downloads
//! run in fixed-size batches with concurrency inside a batch and a pause
//! between batches to stay polite to upstream CDNs. A run is idempotent:
//! items already valid on disk are skipped unless `force` is set. The
//! manifest is regenerated from scratch at the end of each run and
//! swapped in atomically.

use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::catalog::{CatalogClient, ShipNameMatcher};
use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::locator::AssetLocator;
use crate::manifest::ManifestStore;
use crate::models::{
    AssetClass, AssetIdentity, CatalogUnit, Manifest, ManifestAssets, ManifestUnit, ManifestUrls,
    SizeVariant, SourceKind, SyncResult, ValidationReport,
};
use crate::store::LocalAssetStore;
use crate::utils::retry::{retry_with_backoff, Backoff};
use crate::utils::sanitize_base_url;

enum ItemOutcome {
    Downloaded { identity: AssetIdentity, url: String },
    Skipped,
    Failed { identity: AssetIdentity, error: String },
}

pub struct BulkSyncService {
    catalog: CatalogClient,
    locator: Arc<AssetLocator>,
    store: LocalAssetStore,
    manifest: ManifestStore,
    ships: ShipNameMatcher,
    config: SyncConfig,
    base_url: String,
    report_path: PathBuf,
}

impl BulkSyncService {
    pub fn new(
        catalog: CatalogClient,
        locator: Arc<AssetLocator>,
        store: LocalAssetStore,
        manifest: ManifestStore,
        config: SyncConfig,
        base_url: &str,
        report_path: PathBuf,
    ) -> Self {
        Self {
            catalog,
            locator,
            store,
            manifest,
            ships: ShipNameMatcher::new(),
            config,
            base_url: sanitize_base_url(base_url),
            report_path,
        }
    }

    /// Full sync run: fetch the catalog, download every missing asset,
    /// regenerate the manifest, and write a coverage report. A catalog or
    /// manifest failure aborts the run; individual asset failures are
    /// tallied and the run continues.
    pub async fn sync_all(&self, force: bool) -> Result<SyncResult, SyncError> {
        let units = self.catalog.fetch_units().await?;
        self.sync_units(&units, force).await
    }

    /// Sync a known unit list. Split from `sync_all` so the catalog fetch
    /// can be validated separately.
    pub async fn sync_units(
        &self,
        units: &[CatalogUnit],
        force: bool,
    ) -> Result<SyncResult, SyncError> {
        let items = Self::work_items(units);
        let mut result = SyncResult::default();
        let mut winning_urls: HashMap<String, String> = HashMap::new();

        info!(
            "Starting sync: {} units, {} assets, batch size {}{}",
            units.len(),
            items.len(),
            self.config.batch_size,
            if force { " (forced)" } else { "" }
        );

        let batch_count = items.len().div_ceil(self.config.batch_size.max(1));
        for (index, batch) in items.chunks(self.config.batch_size.max(1)).enumerate() {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|identity| self.sync_item(identity.clone(), force)),
            )
            .await;

            let mut batch_result = SyncResult {
                total: batch.len(),
                ..Default::default()
            };
            for outcome in outcomes {
                match outcome {
                    ItemOutcome::Downloaded { identity, url } => {
                        batch_result.downloaded += 1;
                        winning_urls.insert(identity.cache_key(), url);
                    }
                    ItemOutcome::Skipped => batch_result.skipped += 1,
                    ItemOutcome::Failed { identity, error } => {
                        batch_result.failed += 1;
                        batch_result.errors.push(format!("{identity}: {error}"));
                    }
                }
            }
            result.merge(batch_result);

            if index + 1 < batch_count {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        self.regenerate_manifest(units, &winning_urls).await?;

        if let Err(err) = self.write_report(&self.sweep(units).await.0).await {
            // The report is advisory; a failed write never fails the run
            warn!("{err}");
        }

        info!(
            "Sync complete: {} downloaded, {} skipped, {} failed of {}",
            result.downloaded, result.skipped, result.failed, result.total
        );
        Ok(result)
    }

    /// Validation sweep: re-check every expected asset on disk without
    /// downloading anything. Used by the refresh endpoint and the CLI's
    /// dry pass. Returns the coverage report that was persisted plus a
    /// sync-result-shaped summary (nothing downloaded; valid files count
    /// as skipped, corrupt and missing ones as failed).
    pub async fn validate_all(&self) -> Result<(ValidationReport, SyncResult), SyncError> {
        let units = self.catalog.fetch_units().await?;
        let (report, result) = self.sweep(&units).await;
        self.write_report(&report).await?;
        Ok((report, result))
    }

    fn work_items(units: &[CatalogUnit]) -> Vec<AssetIdentity> {
        let mut items = Vec::with_capacity(units.len() * 4);
        for unit in units {
            for size in SizeVariant::all() {
                items.push(AssetIdentity::portrait(unit.base_id.clone(), size));
            }
            items.push(AssetIdentity::icon(unit.base_id.clone()));
        }
        items
    }

    async fn sync_item(&self, identity: AssetIdentity, force: bool) -> ItemOutcome {
        if !force && self.store.has_valid(&identity).await {
            return ItemOutcome::Skipped;
        }

        let result = retry_with_backoff(
            self.config.max_attempts,
            Backoff::Exponential(Duration::from_millis(self.config.backoff_ms)),
            |_| self.download_once(&identity),
        )
        .await;

        match result {
            Ok(url) => ItemOutcome::Downloaded { identity, url },
            Err(error) => ItemOutcome::Failed { identity, error },
        }
    }

    /// One download attempt. The locator itself never fails, so "failure"
    /// here is the locator having fallen through to the bundled
    /// placeholder, which must never be written to the store.
    async fn download_once(&self, identity: &AssetIdentity) -> Result<String, String> {
        let fetched = self.locator.fetch(identity).await;
        if fetched.resolution.kind == SourceKind::BundledFallback {
            return Err("no source produced a valid payload".to_string());
        }

        self.store
            .write(identity, &fetched.bytes)
            .await
            .map_err(|e| format!("store write failed: {e}"))?;
        Ok(fetched.resolution.url)
    }

    /// Rebuild the manifest from this run's results. Items that were
    /// skipped or failed keep the URL the previous manifest recorded; a
    /// unit with no prior entry falls back to this service's proxy path,
    /// which serves whatever the store holds.
    async fn regenerate_manifest(
        &self,
        units: &[CatalogUnit],
        winning_urls: &HashMap<String, String>,
    ) -> Result<(), SyncError> {
        let mut manifest_units = Vec::with_capacity(units.len());
        for unit in units {
            let portrait_key =
                AssetIdentity::portrait(unit.base_id.clone(), SizeVariant::Md).cache_key();
            let icon_key = AssetIdentity::icon(unit.base_id.clone()).cache_key();

            let portrait = match winning_urls.get(&portrait_key) {
                Some(url) => url.clone(),
                None => self
                    .carried_url(&unit.base_id, AssetClass::Portrait)
                    .await,
            };
            let icon = match winning_urls.get(&icon_key) {
                Some(url) => url.clone(),
                None => self.carried_url(&unit.base_id, AssetClass::Icon).await,
            };

            manifest_units.push(ManifestUnit {
                game_id: unit.base_id.clone(),
                name: unit.name.clone(),
                unit_type: self.ships.unit_type_for(unit),
                urls: ManifestUrls { portrait, icon },
            });
        }

        let manifest = Manifest {
            generated: chrono::Utc::now(),
            version: ManifestStore::next_version(),
            assets: ManifestAssets {
                base_url: self.base_url.clone(),
                units: manifest_units,
            },
        };
        self.manifest.replace(manifest).await
    }

    async fn carried_url(&self, game_id: &str, class: AssetClass) -> String {
        match self.manifest.url_hint(game_id, class).await {
            Some(url) => url,
            None => format!(
                "{}/assets/proxy/{}?class={}",
                self.base_url,
                urlencoding::encode(game_id),
                class.as_str()
            ),
        }
    }

    /// Walk every expected identity against the store, partitioning into
    /// valid, corrupted, and missing.
    pub async fn sweep(&self, units: &[CatalogUnit]) -> (ValidationReport, SyncResult) {
        let items = Self::work_items(units);
        let mut valid = 0usize;
        let mut corrupted = 0usize;
        let mut missing = 0usize;
        let mut errors = Vec::new();

        for identity in &items {
            if self.store.has_valid(identity).await {
                valid += 1;
            } else if self.store.is_corrupted(identity).await {
                corrupted += 1;
                errors.push(format!("{identity}: corrupted"));
            } else {
                missing += 1;
                errors.push(format!("{identity}: missing"));
            }
        }

        let checked = items.len();
        let report = ValidationReport {
            generated: chrono::Utc::now(),
            checked,
            valid,
            corrupted,
            missing,
            coverage_percent: if checked == 0 {
                100.0
            } else {
                (valid as f64 / checked as f64) * 100.0
            },
        };
        let result = SyncResult {
            total: checked,
            downloaded: 0,
            skipped: valid,
            failed: corrupted + missing,
            errors,
        };
        (report, result)
    }

    async fn write_report(&self, report: &ValidationReport) -> Result<(), SyncError> {
        let path = self.report_path.clone();
        let json = serde_json::to_vec_pretty(report).map_err(|e| SyncError::ReportWrite {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::ReportWrite {
                    path: path.display().to_string(),
                    source: e,
                })?;
        }
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| SyncError::ReportWrite {
                path: path.display().to_string(),
                source: e,
            })
    }
}
