//! Shared fixtures for unit tests: a programmable fake fetcher with call
//! counting, payload generators, and a fully-wired locator over temp dirs.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::catalog::ShipNameMatcher;
use crate::config::Config;
use crate::errors::ResolveError;
use crate::health::HealthTracker;
use crate::locator::{AssetFetcher, AssetLocator, LocatorOptions};
use crate::manifest::ManifestStore;
use crate::sources::SourceRegistry;
use crate::store::LocalAssetStore;

#[derive(Clone)]
pub enum MockResponse {
    Ok(Vec<u8>),
    Unreachable,
    Rejected(u16),
}

/// Fake fetcher: URLs are matched against substring rules in order; an
/// unmatched URL behaves as unreachable. Rules can be swapped mid-test to
/// simulate a provider going down after a success.
#[derive(Default)]
pub struct MockFetcher {
    rules: Mutex<Vec<(String, MockResponse)>>,
    pub probe_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub seen_urls: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url_contains: &str, response: MockResponse) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((url_contains.to_string(), response));
        self
    }

    /// Replace or add the rule for a pattern.
    pub fn set_response(&self, url_contains: &str, response: MockResponse) {
        let mut rules = self.rules.lock().unwrap();
        if let Some(rule) = rules.iter_mut().find(|(p, _)| p == url_contains) {
            rule.1 = response;
        } else {
            rules.push((url_contains.to_string(), response));
        }
    }

    fn lookup(&self, url: &str) -> MockResponse {
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| url.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or(MockResponse::Unreachable)
    }

    fn record(&self, url: &str) {
        self.seen_urls.lock().unwrap().push(url.to_string());
    }

    pub fn urls_seen(&self) -> Vec<String> {
        self.seen_urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetFetcher for MockFetcher {
    async fn probe(&self, url: &str) -> Result<(), ResolveError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.record(url);
        match self.lookup(url) {
            MockResponse::Ok(_) => Ok(()),
            MockResponse::Unreachable => Err(ResolveError::unreachable(url)),
            MockResponse::Rejected(status) => Err(ResolveError::rejected(url, status)),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ResolveError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.record(url);
        match self.lookup(url) {
            MockResponse::Ok(bytes) => Ok(bytes),
            MockResponse::Unreachable => Err(ResolveError::unreachable(url)),
            MockResponse::Rejected(status) => Err(ResolveError::rejected(url, status)),
        }
    }
}

/// PNG-signature payload of the requested size.
pub fn valid_png(len: usize) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.resize(len.max(8), 0x42);
    data
}

pub const TEST_BASE_URL: &str = "http://localhost:8080";

pub struct TestHarness {
    pub locator: Arc<AssetLocator>,
    pub health: HealthTracker,
    pub registry: SourceRegistry,
    pub store: LocalAssetStore,
    pub manifest: ManifestStore,
}

/// Wire a locator over the default registry, a temp-dir store, and the
/// given fetcher. One probe attempt per source so health call counts in
/// assertions stay exact.
pub fn build_harness(fetcher: Arc<dyn AssetFetcher>, dir: &tempfile::TempDir) -> TestHarness {
    let config = Config::default();
    let registry = SourceRegistry::new(&config.sources, TEST_BASE_URL);
    let health = HealthTracker::new(registry.clone());
    let store = LocalAssetStore::new(dir.path().join("assets"), 1024);
    let manifest = ManifestStore::new(dir.path().join("asset-manifest.json"));

    let locator = Arc::new(AssetLocator::new(
        health.clone(),
        fetcher,
        store.clone(),
        manifest.clone(),
        ShipNameMatcher::new(),
        LocatorOptions {
            probe_attempts: 1,
            probe_backoff: Duration::from_millis(1),
            min_asset_bytes: 1024,
            fallback_url: format!("{TEST_BASE_URL}/assets/fallback.png"),
        },
    ));

    TestHarness {
        locator,
        health,
        registry,
        store,
        manifest,
    }
}
