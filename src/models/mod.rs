//! Domain models for the asset subsystem
//!
//! Everything here is plain data: the identity tuple that addresses one
//! logical image, the source descriptors the registry hands out, health
//! records, the on-disk manifest shape, and the request/response payloads
//! used by the web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Asset class partitions lookup tables and cache TTL policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Portrait,
    Icon,
    PlanetBackdrop,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Portrait => "portrait",
            AssetClass::Icon => "icon",
            AssetClass::PlanetBackdrop => "planet-backdrop",
        }
    }

    pub fn all() -> [AssetClass; 3] {
        [
            AssetClass::Portrait,
            AssetClass::Icon,
            AssetClass::PlanetBackdrop,
        ]
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeVariant {
    Sm,
    Md,
    Lg,
}

impl SizeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            SizeVariant::Sm => "sm",
            SizeVariant::Md => "md",
            SizeVariant::Lg => "lg",
        }
    }

    pub fn parse(value: &str) -> Option<SizeVariant> {
        match value.to_lowercase().as_str() {
            "sm" | "small" => Some(SizeVariant::Sm),
            "md" | "medium" => Some(SizeVariant::Md),
            "lg" | "large" => Some(SizeVariant::Lg),
            _ => None,
        }
    }

    pub fn all() -> [SizeVariant; 3] {
        [SizeVariant::Sm, SizeVariant::Md, SizeVariant::Lg]
    }
}

impl fmt::Display for SizeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Png,
    Webp,
}

impl AssetFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AssetFormat::Png => "png",
            AssetFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            AssetFormat::Png => "image/png",
            AssetFormat::Webp => "image/webp",
        }
    }

    pub fn parse(value: &str) -> Option<AssetFormat> {
        match value.to_lowercase().as_str() {
            "png" => Some(AssetFormat::Png),
            "webp" => Some(AssetFormat::Webp),
            _ => None,
        }
    }
}

/// Uniquely addresses one logical asset regardless of which source
/// ultimately produces the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetIdentity {
    pub game_id: String,
    pub class: AssetClass,
    pub size: SizeVariant,
    pub format: AssetFormat,
}

impl AssetIdentity {
    pub fn new(
        game_id: impl Into<String>,
        class: AssetClass,
        size: SizeVariant,
        format: AssetFormat,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            class,
            size,
            format,
        }
    }

    pub fn portrait(game_id: impl Into<String>, size: SizeVariant) -> Self {
        Self::new(game_id, AssetClass::Portrait, size, AssetFormat::Png)
    }

    pub fn icon(game_id: impl Into<String>) -> Self {
        Self::new(game_id, AssetClass::Icon, SizeVariant::Sm, AssetFormat::Png)
    }

    /// Cache key derived solely from the identity. Class-first so that
    /// key-prefix eviction can clear a whole asset class at once, and two
    /// size variants never collide.
    pub fn cache_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.class.as_str(),
            self.game_id,
            self.size.as_str(),
            self.format.extension()
        )
    }

    /// File name used by the local asset store.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.game_id,
            self.size.as_str(),
            self.format.extension()
        )
    }
}

impl fmt::Display for AssetIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_key())
    }
}

/// Where a source's bytes come from. Local kinds always sort after remote
/// providers and never fail to produce some payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Remote,
    LocalStore,
    BundledFallback,
}

/// One candidate provider for an asset class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub url_template: String,
    pub priority: u32,
    pub kind: SourceKind,
    pub enabled: bool,
}

impl Source {
    /// Render the URL template for a concrete identity. Placeholders:
    /// `{game_id}`, `{size}`, `{format}`. The game id is percent-encoded
    /// since upstream keys occasionally contain characters like `:`.
    pub fn url_for(&self, identity: &AssetIdentity) -> String {
        self.url_template
            .replace("{game_id}", &urlencoding::encode(&identity.game_id))
            .replace("{size}", identity.size.as_str())
            .replace("{format}", identity.format.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Down,
}

/// Rolling reachability signal for one source. Counters cover the current
/// tumbling window only; they reset at window rollover.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub source_name: String,
    pub window_successes: u32,
    pub window_failures: u32,
    pub avg_latency_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub state: HealthState,
}

/// Outcome of one `resolve()` call. Resolution never fails; the worst case
/// carries the bundled fallback URL.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub url: String,
    pub source_used: String,
    pub kind: SourceKind,
}

/// How a cached entry and a live fetch are reconciled, selected per
/// asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

// --- Manifest ---------------------------------------------------------

/// Versioned snapshot mapping every known unit to its resolved asset URLs.
/// Replaced atomically by bulk sync, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub generated: DateTime<Utc>,
    pub version: String,
    pub assets: ManifestAssets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAssets {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    pub units: Vec<ManifestUnit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestUnit {
    #[serde(rename = "gameId")]
    pub game_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    pub urls: ManifestUrls,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestUrls {
    pub portrait: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Character,
    Ship,
}

// --- Catalog ----------------------------------------------------------

/// One unit as reported by the upstream catalog. `combat_type` is 1 for
/// characters and 2 for ships when the catalog provides it; absent entries
/// fall back to the name-pattern heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogUnit {
    #[serde(rename = "base_id", alias = "baseId")]
    pub base_id: String,
    pub name: String,
    #[serde(rename = "combat_type", alias = "combatType", default)]
    pub combat_type: Option<u8>,
}

// --- Sync -------------------------------------------------------------

/// Transient report emitted by one bulk sync run; not persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub total: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.total += other.total;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

/// Coverage/health summary written next to the manifest after a sync or a
/// validation sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub generated: DateTime<Utc>,
    pub checked: usize,
    pub valid: usize,
    pub corrupted: usize,
    pub missing: usize,
    pub coverage_percent: f64,
}

// --- Web payloads -----------------------------------------------------

#[derive(Debug, Serialize)]
pub struct PortraitResponse {
    #[serde(rename = "gameId")]
    pub game_id: String,
    pub size: SizeVariant,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct IconResponse {
    #[serde(rename = "gameId")]
    pub game_id: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct UnitAssetsResponse {
    #[serde(rename = "gameId")]
    pub game_id: String,
    pub portraits: HashMap<String, String>,
    pub icons: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct HealthSummaryResponse {
    pub sources: Vec<HealthRecord>,
    pub healthy: usize,
    pub degraded: usize,
    pub down: usize,
}
