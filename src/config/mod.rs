use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::{AssetClass, CacheStrategy};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub web: WebConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub sync: SyncConfig,
    pub sources: SourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub asset_store_path: PathBuf,
    pub manifest_path: PathBuf,
    pub report_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for existence probes (HEAD requests)
    pub probe_timeout_secs: u64,
    /// Timeout for full asset downloads
    pub download_timeout_secs: u64,
    /// Attempts per source before moving on to the next one
    pub probe_attempts: u32,
    /// Base delay between probe attempts against the same source
    pub probe_backoff_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub portrait_ttl_secs: u64,
    pub icon_ttl_secs: u64,
    pub planet_backdrop_ttl_secs: u64,
    pub portrait_strategy: CacheStrategy,
    pub icon_strategy: CacheStrategy,
    pub planet_backdrop_strategy: CacheStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Items downloaded concurrently within one batch
    pub batch_size: usize,
    /// Pause between sequential batches
    pub batch_delay_ms: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
    /// Payloads smaller than this fail the integrity check
    pub min_asset_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub character_base_url: String,
    pub ship_base_url: String,
    pub mirror_base_url: String,
    pub catalog_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            storage: StorageConfig {
                asset_store_path: PathBuf::from("./data/assets"),
                manifest_path: PathBuf::from("./data/asset-manifest.json"),
                report_path: PathBuf::from("./data/validation-report.json"),
            },
            http: HttpConfig {
                probe_timeout_secs: 5,
                download_timeout_secs: 30,
                probe_attempts: 2,
                probe_backoff_ms: 250,
                user_agent: "tb-asset-service/0.1".to_string(),
            },
            cache: CacheConfig {
                portrait_ttl_secs: 24 * 60 * 60,
                icon_ttl_secs: 24 * 60 * 60,
                planet_backdrop_ttl_secs: 60 * 60,
                portrait_strategy: CacheStrategy::CacheFirst,
                icon_strategy: CacheStrategy::CacheFirst,
                planet_backdrop_strategy: CacheStrategy::StaleWhileRevalidate,
            },
            sync: SyncConfig {
                batch_size: 8,
                batch_delay_ms: 500,
                max_attempts: 3,
                backoff_ms: 500,
                min_asset_bytes: 1024,
            },
            sources: SourcesConfig {
                character_base_url: "https://game-assets.swgoh.gg".to_string(),
                ship_base_url: "https://game-assets.swgoh.gg/tex.charui".to_string(),
                mirror_base_url: "https://swgoh.wiki/images".to_string(),
                catalog_url: "https://swgoh.gg/api/units".to_string(),
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_file =
            std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());

        let mut config = if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(&config_file)?;
            toml::from_str(&contents)?
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::create_dir_all("./data/assets")?;
            std::fs::write(&config_file, contents)?;
            default_config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Provider base URLs can be swapped out without touching the config
    /// file, which is how the sync CLI picks up credentials-bearing URLs.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("TB_ASSET_CHARACTER_BASE_URL") {
            self.sources.character_base_url = url;
        }
        if let Ok(url) = std::env::var("TB_ASSET_SHIP_BASE_URL") {
            self.sources.ship_base_url = url;
        }
        if let Ok(url) = std::env::var("TB_ASSET_MIRROR_BASE_URL") {
            self.sources.mirror_base_url = url;
        }
        if let Ok(url) = std::env::var("TB_ASSET_CATALOG_URL") {
            self.sources.catalog_url = url;
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, class: AssetClass) -> Duration {
        let secs = match class {
            AssetClass::Portrait => self.portrait_ttl_secs,
            AssetClass::Icon => self.icon_ttl_secs,
            AssetClass::PlanetBackdrop => self.planet_backdrop_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    pub fn strategy_for(&self, class: AssetClass) -> CacheStrategy {
        match class {
            AssetClass::Portrait => self.portrait_strategy,
            AssetClass::Icon => self.icon_strategy,
            AssetClass::PlanetBackdrop => self.planet_backdrop_strategy,
        }
    }
}
