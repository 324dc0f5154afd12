//! Manifest store
//!
//! The manifest is a versioned snapshot mapping every known unit to its
//! resolved asset URLs. Bulk sync regenerates it wholesale; it is replaced
//! atomically (write to a temp path, then rename) so readers never observe
//! a half-written file. The locator consults the in-memory copy as a hint
//! map, and clients fetch it to pre-warm their caches.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::{AppError, SyncError};
use crate::models::{AssetClass, Manifest};

#[derive(Clone)]
pub struct ManifestStore {
    path: PathBuf,
    cached: Arc<RwLock<Option<Manifest>>>,
}

impl ManifestStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    /// Load the manifest from disk into the in-memory copy. Absence is not
    /// an error; the service simply starts without hints.
    pub async fn load(&self) -> Result<Option<Manifest>, AppError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).await?;
        let manifest: Manifest = serde_json::from_str(&contents)?;
        info!(
            "Loaded manifest version {} ({} units)",
            manifest.version,
            manifest.assets.units.len()
        );
        let mut cached = self.cached.write().await;
        *cached = Some(manifest.clone());
        Ok(Some(manifest))
    }

    pub async fn current(&self) -> Option<Manifest> {
        self.cached.read().await.clone()
    }

    /// Atomic full replace: serialize to `<path>.tmp`, then rename over
    /// the old file. A failure here is fatal to a sync run.
    pub async fn replace(&self, manifest: Manifest) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(&manifest).map_err(|e| SyncError::ManifestWrite {
            path: self.path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let write_err = |source| SyncError::ManifestWrite {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        fs::write(&tmp_path, &json).await.map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).await.map_err(write_err)?;

        info!(
            "Manifest {} written: version {}, {} units",
            self.path.display(),
            manifest.version,
            manifest.assets.units.len()
        );

        let mut cached = self.cached.write().await;
        *cached = Some(manifest);
        Ok(())
    }

    /// Hint lookup: the URL the last sync resolved for a unit, if any.
    pub async fn url_hint(&self, game_id: &str, class: AssetClass) -> Option<String> {
        let cached = self.cached.read().await;
        let manifest = cached.as_ref()?;
        let unit = manifest
            .assets
            .units
            .iter()
            .find(|u| u.game_id == game_id)?;
        let url = match class {
            AssetClass::Portrait => &unit.urls.portrait,
            AssetClass::Icon => &unit.urls.icon,
            AssetClass::PlanetBackdrop => return None,
        };
        if url.is_empty() {
            None
        } else {
            Some(url.clone())
        }
    }

    /// Fresh version string for a regenerated manifest.
    pub fn next_version() -> String {
        Utc::now().format("%Y%m%d%H%M%S").to_string()
    }
}
