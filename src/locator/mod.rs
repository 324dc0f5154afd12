//! Asset Locator
//!
//! Resolves an `AssetIdentity` to a usable URL (or bytes) by walking
//! candidate sources in health-aware priority order. Resolution never
//! fails: remote exhaustion falls through to the local store, and the
//! local store falls through to the bundled placeholder, which is always
//! available. Per-source probes run sequentially within one call and
//! short-circuit on the first success; concurrent calls for different
//! identities are independent.

pub mod fetcher;

pub use fetcher::{AssetFetcher, HttpFetcher};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::catalog::ShipNameMatcher;
use crate::config::Config;
use crate::health::HealthTracker;
use crate::manifest::ManifestStore;
use crate::models::{
    AssetClass, AssetIdentity, Resolution, Source, SourceKind,
};
use crate::sources::{BUNDLED_FALLBACK_SOURCE, FALLBACK_PATH};
use crate::store::LocalAssetStore;
use crate::utils::retry::{retry_with_backoff, Backoff};
use crate::utils::sanitize_base_url;
use crate::utils::validation::{format_to_mime_type, validate_image_bytes};

#[derive(Debug, Clone)]
pub struct LocatorOptions {
    pub probe_attempts: u32,
    pub probe_backoff: Duration,
    pub min_asset_bytes: usize,
    pub fallback_url: String,
}

impl LocatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            probe_attempts: config.http.probe_attempts,
            probe_backoff: Duration::from_millis(config.http.probe_backoff_ms),
            min_asset_bytes: config.sync.min_asset_bytes,
            fallback_url: format!(
                "{}{}",
                sanitize_base_url(&config.web.base_url),
                FALLBACK_PATH
            ),
        }
    }
}

/// Bytes plus the resolution that produced them, for callers (the cache
/// layer) that need the payload rather than a URL.
pub struct FetchedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub resolution: Resolution,
}

pub struct AssetLocator {
    health: HealthTracker,
    fetcher: Arc<dyn AssetFetcher>,
    store: LocalAssetStore,
    manifest: ManifestStore,
    ships: ShipNameMatcher,
    options: LocatorOptions,
}

impl AssetLocator {
    pub fn new(
        health: HealthTracker,
        fetcher: Arc<dyn AssetFetcher>,
        store: LocalAssetStore,
        manifest: ManifestStore,
        ships: ShipNameMatcher,
        options: LocatorOptions,
    ) -> Self {
        Self {
            health,
            fetcher,
            store,
            manifest,
            ships,
            options,
        }
    }

    /// Resolve an identity to a URL. Never fails; the worst case is the
    /// bundled fallback.
    pub async fn resolve(&self, identity: &AssetIdentity) -> Resolution {
        for source in self.ordered_for(identity).await {
            match source.kind {
                SourceKind::Remote => {
                    let url = source.url_for(identity);
                    if let Some(resolution) = self.probe_remote(&source, url).await {
                        return resolution;
                    }
                }
                SourceKind::LocalStore => {
                    if self.store.has_valid(identity).await {
                        return Resolution {
                            url: source.url_for(identity),
                            source_used: source.name.clone(),
                            kind: SourceKind::LocalStore,
                        };
                    }
                    // Manifest hint: the URL the last sync validated
                    if let Some(hint) = self
                        .manifest
                        .url_hint(&identity.game_id, identity.class)
                        .await
                    {
                        return Resolution {
                            url: hint,
                            source_used: source.name.clone(),
                            kind: SourceKind::LocalStore,
                        };
                    }
                }
                SourceKind::BundledFallback => {
                    return Resolution {
                        url: source.url_for(identity),
                        source_used: source.name.clone(),
                        kind: SourceKind::BundledFallback,
                    };
                }
            }
        }

        // Registry produced no terminal source; still never fail.
        self.fallback_resolution()
    }

    /// Fetch validated payload bytes for an identity. Same walk as
    /// `resolve`, but downloads and integrity-checks each candidate. A
    /// 200 OK with a bad payload counts as a source failure.
    pub async fn fetch(&self, identity: &AssetIdentity) -> FetchedAsset {
        for source in self.ordered_for(identity).await {
            match source.kind {
                SourceKind::Remote => {
                    let url = source.url_for(identity);
                    if let Some(fetched) = self.download_remote(&source, url).await {
                        return fetched;
                    }
                }
                SourceKind::LocalStore => {
                    if let Some(bytes) = self.store.read_valid(identity).await {
                        return FetchedAsset {
                            content_type: identity.format.mime_type().to_string(),
                            resolution: Resolution {
                                url: source.url_for(identity),
                                source_used: source.name.clone(),
                                kind: SourceKind::LocalStore,
                            },
                            bytes,
                        };
                    }
                    if let Some(hint) = self
                        .manifest
                        .url_hint(&identity.game_id, identity.class)
                        .await
                    {
                        if let Ok(bytes) = self.fetcher.fetch(&hint).await {
                            if let Ok(format) =
                                validate_image_bytes(&bytes, self.options.min_asset_bytes)
                            {
                                return FetchedAsset {
                                    content_type: format_to_mime_type(format).to_string(),
                                    resolution: Resolution {
                                        url: hint,
                                        source_used: source.name.clone(),
                                        kind: SourceKind::LocalStore,
                                    },
                                    bytes,
                                };
                            }
                        }
                    }
                }
                SourceKind::BundledFallback => {
                    return self.fallback_asset(&source, identity);
                }
            }
        }

        let fallback = Resolution {
            url: self.options.fallback_url.clone(),
            source_used: BUNDLED_FALLBACK_SOURCE.to_string(),
            kind: SourceKind::BundledFallback,
        };
        FetchedAsset {
            bytes: LocalAssetStore::fallback_bytes(),
            content_type: "image/png".to_string(),
            resolution: fallback,
        }
    }

    /// Health-ordered sources with the ship-template source promoted ahead
    /// of other remotes when the game id matches ship naming conventions.
    /// The heuristic only affects probe order, never the outcome.
    async fn ordered_for(&self, identity: &AssetIdentity) -> Vec<Source> {
        let sources = self.health.ordered_sources(identity.class).await;

        if identity.class != AssetClass::Portrait || !self.ships.is_ship(&identity.game_id) {
            return sources;
        }

        let (ship_templates, rest): (Vec<Source>, Vec<Source>) = sources
            .into_iter()
            .partition(|s| s.kind == SourceKind::Remote && s.name.ends_with("-ships"));
        let mut ordered = ship_templates;
        ordered.extend(rest);
        ordered
    }

    async fn probe_remote(&self, source: &Source, url: String) -> Option<Resolution> {
        let started = Instant::now();
        let result = retry_with_backoff(
            self.options.probe_attempts,
            Backoff::Linear(self.options.probe_backoff),
            |_| self.fetcher.probe(&url),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.health.record_outcome(&source.name, true, latency_ms).await;
                Some(Resolution {
                    url,
                    source_used: source.name.clone(),
                    kind: SourceKind::Remote,
                })
            }
            Err(err) => {
                self.health
                    .record_outcome(&source.name, false, latency_ms)
                    .await;
                debug!("Probe via '{}' failed: {}", source.name, err);
                None
            }
        }
    }

    async fn download_remote(&self, source: &Source, url: String) -> Option<FetchedAsset> {
        let started = Instant::now();
        let min_bytes = self.options.min_asset_bytes;
        let result = retry_with_backoff(
            self.options.probe_attempts,
            Backoff::Linear(self.options.probe_backoff),
            |_| async {
                let bytes = self.fetcher.fetch(&url).await?;
                let format = validate_image_bytes(&bytes, min_bytes)
                    .map_err(|reason| crate::errors::ResolveError::invalid_payload(&url, reason))?;
                Ok::<_, crate::errors::ResolveError>((bytes, format))
            },
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok((bytes, format)) => {
                self.health.record_outcome(&source.name, true, latency_ms).await;
                Some(FetchedAsset {
                    content_type: format_to_mime_type(format).to_string(),
                    resolution: Resolution {
                        url,
                        source_used: source.name.clone(),
                        kind: SourceKind::Remote,
                    },
                    bytes,
                })
            }
            Err(err) => {
                self.health
                    .record_outcome(&source.name, false, latency_ms)
                    .await;
                debug!("Download via '{}' failed: {}", source.name, err);
                None
            }
        }
    }

    fn fallback_asset(&self, source: &Source, identity: &AssetIdentity) -> FetchedAsset {
        FetchedAsset {
            bytes: LocalAssetStore::fallback_bytes(),
            content_type: "image/png".to_string(),
            resolution: Resolution {
                url: source.url_for(identity),
                source_used: source.name.clone(),
                kind: SourceKind::BundledFallback,
            },
        }
    }

    fn fallback_resolution(&self) -> Resolution {
        Resolution {
            url: self.options.fallback_url.clone(),
            source_used: BUNDLED_FALLBACK_SOURCE.to_string(),
            kind: SourceKind::BundledFallback,
        }
    }
}
