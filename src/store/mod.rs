//! Local asset store
//!
//! Flat-file store populated by bulk sync and read by the locator as its
//! last-resort source before the bundled fallback. Layout is one directory
//! per asset class with `{game_id}_{size}.{ext}` files. Reads are always
//! integrity-checked so a corrupted file behaves like a missing one.

use rust_embed::RustEmbed;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, warn};

use crate::models::AssetIdentity;
use crate::utils::validation::validate_image_bytes;

#[derive(RustEmbed)]
#[folder = "assets/"]
struct BundledAssets;

const PLACEHOLDER_FILE: &str = "placeholder.png";

#[derive(Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
    min_asset_bytes: usize,
}

impl LocalAssetStore {
    pub fn new(root: PathBuf, min_asset_bytes: usize) -> Self {
        Self {
            root,
            min_asset_bytes,
        }
    }

    pub fn path_for(&self, identity: &AssetIdentity) -> PathBuf {
        self.root
            .join(identity.class.as_str())
            .join(identity.file_name())
    }

    /// Read an asset, returning `None` when the file is absent or fails
    /// the integrity check. The store never errors outward; a bad file is
    /// simply not a usable source.
    pub async fn read_valid(&self, identity: &AssetIdentity) -> Option<Vec<u8>> {
        let path = self.path_for(identity);
        let data = fs::read(&path).await.ok()?;
        match validate_image_bytes(&data, self.min_asset_bytes) {
            Ok(_) => Some(data),
            Err(reason) => {
                warn!(
                    "Local store file {} failed integrity check: {}",
                    path.display(),
                    reason
                );
                None
            }
        }
    }

    pub async fn has_valid(&self, identity: &AssetIdentity) -> bool {
        self.read_valid(identity).await.is_some()
    }

    /// True when a file exists for the identity but fails validation.
    /// Bulk sync counts these as corrupted rather than missing.
    pub async fn is_corrupted(&self, identity: &AssetIdentity) -> bool {
        let path = self.path_for(identity);
        match fs::read(&path).await {
            Ok(data) => validate_image_bytes(&data, self.min_asset_bytes).is_err(),
            Err(_) => false,
        }
    }

    pub async fn write(&self, identity: &AssetIdentity, data: &[u8]) -> std::io::Result<()> {
        let path = self.path_for(identity);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        debug!("Stored {} ({} bytes)", path.display(), data.len());
        Ok(())
    }

    /// The bundled placeholder, embedded at compile time. Guaranteed to be
    /// available; this is the terminal step of every fallback chain.
    pub fn fallback_bytes() -> Vec<u8> {
        BundledAssets::get(PLACEHOLDER_FILE)
            .map(|file| file.data.into_owned())
            .unwrap_or_default()
    }
}
