//! Cache Manager
//!
//! Client-side cache over the locator's fetch path. Each asset class maps
//! to one named strategy (cache-first, network-first,
//! stale-while-revalidate) and one TTL. Entries are evicted lazily on
//! lookup past their TTL or explicitly by key prefix; there is no
//! background sweep. "Network failure" here means the locator fell all the
//! way through to the bundled fallback: real payloads always win over the
//! placeholder, and a stale cached asset wins over both.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::locator::{AssetLocator, FetchedAsset};
use crate::models::{AssetIdentity, CacheStrategy, SourceKind};

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<u8>,
    content_type: String,
    source_used: String,
    cached_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.cached_at) > ttl,
            Err(_) => false,
        }
    }
}

/// What a cache lookup hands back. Always carries bytes; `from_cache`
/// and `served_stale` exist for logging and tests.
#[derive(Debug, Clone)]
pub struct CachedPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_used: String,
    pub from_cache: bool,
    pub served_stale: bool,
}

#[derive(Clone)]
pub struct CacheManager {
    locator: Arc<AssetLocator>,
    config: CacheConfig,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl CacheManager {
    pub fn new(locator: Arc<AssetLocator>, config: CacheConfig) -> Self {
        Self {
            locator,
            config,
            entries: Arc::new(RwLock::new(HashMap::new())),
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Look up an identity through its class strategy. Never fails; the
    /// worst case is the bundled placeholder.
    pub async fn get(&self, identity: &AssetIdentity) -> CachedPayload {
        match self.config.strategy_for(identity.class) {
            CacheStrategy::CacheFirst => self.cache_first(identity).await,
            CacheStrategy::NetworkFirst => self.network_first(identity).await,
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(identity).await,
        }
    }

    async fn cache_first(&self, identity: &AssetIdentity) -> CachedPayload {
        let key = identity.cache_key();
        let now = Utc::now();
        let entry = self.entry_for(&key).await;

        if let Some(ref entry) = entry {
            if !entry.is_expired(now) {
                return Self::from_entry(entry, false);
            }
            // Expired: evict lazily, but keep the copy for stale serving
            self.entries.write().await.remove(&key);
        }

        match self.fetch_network(identity).await {
            Ok(fetched) => {
                self.store_entry(identity, &fetched).await;
                Self::from_network(fetched)
            }
            Err(fallback) => match entry {
                // Fetch failed but a stale entry exists: serve it rather
                // than propagating the failure
                Some(stale) => {
                    debug!("Serving stale cache entry for {}", identity);
                    self.entries.write().await.insert(key, stale.clone());
                    Self::from_entry(&stale, true)
                }
                None => Self::from_network(fallback),
            },
        }
    }

    async fn network_first(&self, identity: &AssetIdentity) -> CachedPayload {
        match self.fetch_network(identity).await {
            Ok(fetched) => {
                self.store_entry(identity, &fetched).await;
                Self::from_network(fetched)
            }
            Err(fallback) => {
                let key = identity.cache_key();
                match self.entry_for(&key).await {
                    Some(entry) => {
                        let stale = entry.is_expired(Utc::now());
                        Self::from_entry(&entry, stale)
                    }
                    None => Self::from_network(fallback),
                }
            }
        }
    }

    async fn stale_while_revalidate(&self, identity: &AssetIdentity) -> CachedPayload {
        let key = identity.cache_key();

        // Serve whatever is cached immediately; no TTL check blocks the
        // response. Freshness is the background refresh's problem.
        if let Some(entry) = self.entry_for(&key).await {
            let stale = entry.is_expired(Utc::now());
            self.spawn_refresh(identity.clone());
            return Self::from_entry(&entry, stale);
        }

        // Cold miss: the caller waits on the in-flight fetch
        match self.fetch_network(identity).await {
            Ok(fetched) => {
                self.store_entry(identity, &fetched).await;
                Self::from_network(fetched)
            }
            Err(fallback) => Self::from_network(fallback),
        }
    }

    /// Fire-and-forget refresh for the next caller. A per-key guard
    /// collapses a burst of stale hits into a single in-flight fetch, and
    /// refresh failures never surface to the caller that already got its
    /// stale response.
    fn spawn_refresh(&self, identity: AssetIdentity) {
        let key = identity.cache_key();
        {
            let mut refreshing = self.refreshing.lock().unwrap_or_else(|e| e.into_inner());
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        let manager = self.clone();
        tokio::spawn(async move {
            match manager.fetch_network(&identity).await {
                Ok(fetched) => manager.store_entry(&identity, &fetched).await,
                Err(_) => debug!("Background refresh failed for {}", identity),
            }
            let mut refreshing = manager.refreshing.lock().unwrap_or_else(|e| e.into_inner());
            refreshing.remove(&key);
        });
    }

    /// A fetch "succeeds" only when the locator produced real bytes; the
    /// bundled placeholder is returned as the error side so strategies can
    /// prefer stale cache over it.
    async fn fetch_network(&self, identity: &AssetIdentity) -> Result<FetchedAsset, FetchedAsset> {
        let fetched = self.locator.fetch(identity).await;
        if fetched.resolution.kind == SourceKind::BundledFallback {
            Err(fetched)
        } else {
            Ok(fetched)
        }
    }

    async fn store_entry(&self, identity: &AssetIdentity, fetched: &FetchedAsset) {
        let entry = CacheEntry {
            payload: fetched.bytes.clone(),
            content_type: fetched.content_type.clone(),
            source_used: fetched.resolution.source_used.clone(),
            cached_at: Utc::now(),
            ttl: self.config.ttl_for(identity.class),
        };
        self.entries
            .write()
            .await
            .insert(identity.cache_key(), entry);
    }

    async fn entry_for(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().await.get(key).cloned()
    }

    /// Explicit eviction by key prefix ("portrait" clears all portraits).
    /// Returns the number of entries removed.
    pub async fn clear_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            warn!("Cleared {} cache entries with prefix '{}'", removed, prefix);
        }
        removed
    }

    pub async fn clear_all(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    fn from_entry(entry: &CacheEntry, served_stale: bool) -> CachedPayload {
        CachedPayload {
            bytes: entry.payload.clone(),
            content_type: entry.content_type.clone(),
            source_used: entry.source_used.clone(),
            from_cache: true,
            served_stale,
        }
    }

    fn from_network(fetched: FetchedAsset) -> CachedPayload {
        CachedPayload {
            bytes: fetched.bytes,
            content_type: fetched.content_type,
            source_used: fetched.resolution.source_used,
            from_cache: false,
            served_stale: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SizeVariant;
    use crate::test_support::{build_harness, valid_png, MockFetcher, MockResponse};
    use std::sync::atomic::Ordering;

    fn cache_config(strategy: CacheStrategy, ttl_secs: u64) -> CacheConfig {
        CacheConfig {
            portrait_ttl_secs: ttl_secs,
            icon_ttl_secs: ttl_secs,
            planet_backdrop_ttl_secs: ttl_secs,
            portrait_strategy: strategy,
            icon_strategy: strategy,
            planet_backdrop_strategy: strategy,
        }
    }

    #[tokio::test]
    async fn cache_first_fresh_entry_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::CacheFirst, 3600),
        );

        let identity = AssetIdentity::portrait("DARTHVADER", SizeVariant::Md);

        let first = cache.get(&identity).await;
        assert!(!first.from_cache);
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 1);

        let second = cache.get(&identity).await;
        assert!(second.from_cache);
        assert_eq!(second.bytes, first.bytes);
        // No further network call was made
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cache_first_serves_stale_when_network_fails() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        // Zero TTL: every entry is stale by the next lookup
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::CacheFirst, 0),
        );

        let identity = AssetIdentity::portrait("DARTHVADER", SizeVariant::Md);
        let first = cache.get(&identity).await;
        assert!(!first.from_cache);

        // Provider goes dark; the stale entry is served instead of the
        // fallback placeholder
        fetcher.set_response("/textures/", MockResponse::Unreachable);
        let second = cache.get(&identity).await;
        assert!(second.from_cache);
        assert!(second.served_stale);
        assert_eq!(second.bytes, first.bytes);
    }

    #[tokio::test]
    async fn network_first_overwrites_cache_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::NetworkFirst, 3600),
        );

        let identity = AssetIdentity::portrait("HANSOLO", SizeVariant::Sm);
        cache.get(&identity).await;
        cache.get(&identity).await;
        // Network-first always fetches
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.entry_count().await, 1);
    }

    #[tokio::test]
    async fn network_first_falls_back_to_cache_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::NetworkFirst, 3600),
        );

        let identity = AssetIdentity::portrait("HANSOLO", SizeVariant::Sm);
        let first = cache.get(&identity).await;

        fetcher.set_response("/textures/", MockResponse::Rejected(503));
        let second = cache.get(&identity).await;
        assert!(second.from_cache);
        assert_eq!(second.bytes, first.bytes);
    }

    #[tokio::test]
    async fn network_first_with_no_cache_serves_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(MockFetcher::new());
        let harness = build_harness(fetcher, &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::NetworkFirst, 3600),
        );

        let identity = AssetIdentity::portrait("NOBODY", SizeVariant::Lg);
        let payload = cache.get(&identity).await;
        assert!(!payload.from_cache);
        assert_eq!(payload.source_used, crate::sources::BUNDLED_FALLBACK_SOURCE);
        assert!(!payload.bytes.is_empty());
    }

    #[tokio::test]
    async fn swr_cold_miss_waits_then_serves_cache_with_one_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::StaleWhileRevalidate, 3600),
        );

        let identity = AssetIdentity::portrait("DARTHVADER", SizeVariant::Md);

        // First call has no entry and waits on the network
        let first = cache.get(&identity).await;
        assert!(!first.from_cache);
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 1);

        // Second call returns immediately from cache and kicks off exactly
        // one background refresh
        let second = cache.get(&identity).await;
        assert!(second.from_cache);
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(fetcher.fetch_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn swr_refresh_failure_never_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher.clone(), &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::StaleWhileRevalidate, 3600),
        );

        let identity = AssetIdentity::portrait("DARTHVADER", SizeVariant::Md);
        let first = cache.get(&identity).await;

        fetcher.set_response("/textures/", MockResponse::Unreachable);
        let second = cache.get(&identity).await;
        assert!(second.from_cache);
        assert_eq!(second.bytes, first.bytes);

        // The failed background refresh leaves the old entry in place
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let third = cache.get(&identity).await;
        assert_eq!(third.bytes, first.bytes);
    }

    #[tokio::test]
    async fn clear_prefix_only_touches_matching_class() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond("/textures/", MockResponse::Ok(valid_png(8192)))
                .respond("wiki", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher, &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::CacheFirst, 3600),
        );

        cache
            .get(&AssetIdentity::portrait("DARTHVADER", SizeVariant::Md))
            .await;
        cache.get(&AssetIdentity::icon("DARTHVADER")).await;
        assert_eq!(cache.entry_count().await, 2);

        assert_eq!(cache.clear_prefix("portrait").await, 1);
        assert_eq!(cache.entry_count().await, 1);
        assert_eq!(cache.clear_all().await, 1);
    }

    #[tokio::test]
    async fn size_variants_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            MockFetcher::new().respond("/textures/", MockResponse::Ok(valid_png(8192))),
        );
        let harness = build_harness(fetcher, &dir);
        let cache = CacheManager::new(
            harness.locator.clone(),
            cache_config(CacheStrategy::CacheFirst, 3600),
        );

        cache
            .get(&AssetIdentity::portrait("DARTHVADER", SizeVariant::Sm))
            .await;
        cache
            .get(&AssetIdentity::portrait("DARTHVADER", SizeVariant::Lg))
            .await;
        assert_eq!(cache.entry_count().await, 2);
    }
}
