//! Source Registry
//!
//! Static, compiled configuration of candidate providers per asset class.
//! Lists are built once at startup from config base URLs, ordered by
//! priority, and never mutated at runtime except through the explicit
//! admin enable/disable action. `LocalStore` and `BundledFallback` entries
//! always sort last and never fail to produce some bytes.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::SourcesConfig;
use crate::models::{AssetClass, Source, SourceKind};
use crate::utils::sanitize_base_url;

pub const LOCAL_STORE_SOURCE: &str = "local-store";
pub const BUNDLED_FALLBACK_SOURCE: &str = "bundled-fallback";

/// Path (relative to the service base URL) where the embedded placeholder
/// is served. The bundled fallback source always resolves here.
pub const FALLBACK_PATH: &str = "/assets/fallback.png";

#[derive(Clone)]
pub struct SourceRegistry {
    by_class: Arc<RwLock<HashMap<AssetClass, Vec<Source>>>>,
}

impl SourceRegistry {
    /// Compile per-class source lists from the configured provider base
    /// URLs. `web_base` is this service's own base URL, used for the
    /// local-store and bundled-fallback entries.
    pub fn new(sources: &SourcesConfig, web_base: &str) -> Self {
        let char_base = sanitize_base_url(&sources.character_base_url);
        let ship_base = sanitize_base_url(&sources.ship_base_url);
        let mirror_base = sanitize_base_url(&sources.mirror_base_url);
        let web_base = sanitize_base_url(web_base);

        let mut by_class = HashMap::new();

        by_class.insert(
            AssetClass::Portrait,
            vec![
                remote(
                    "game-cdn",
                    format!("{char_base}/textures/{{game_id}}/portrait_{{size}}.{{format}}"),
                    1,
                ),
                remote(
                    "game-cdn-ships",
                    format!("{ship_base}/{{game_id}}/portrait_{{size}}.{{format}}"),
                    2,
                ),
                remote(
                    "wiki-mirror",
                    format!("{mirror_base}/units/{{game_id}}/{{size}}.{{format}}"),
                    3,
                ),
                local_store(&web_base, AssetClass::Portrait),
                bundled_fallback(&web_base),
            ],
        );

        by_class.insert(
            AssetClass::Icon,
            vec![
                remote(
                    "game-cdn",
                    format!("{char_base}/textures/{{game_id}}/icon.{{format}}"),
                    1,
                ),
                remote(
                    "wiki-mirror",
                    format!("{mirror_base}/icons/{{game_id}}.{{format}}"),
                    2,
                ),
                local_store(&web_base, AssetClass::Icon),
                bundled_fallback(&web_base),
            ],
        );

        by_class.insert(
            AssetClass::PlanetBackdrop,
            vec![
                remote(
                    "game-cdn",
                    format!("{char_base}/textures/planets/{{game_id}}_{{size}}.{{format}}"),
                    1,
                ),
                local_store(&web_base, AssetClass::PlanetBackdrop),
                bundled_fallback(&web_base),
            ],
        );

        for sources in by_class.values_mut() {
            sources.sort_by_key(|s| s.priority);
        }

        info!(
            "Source registry compiled: {} portrait, {} icon, {} planet-backdrop sources",
            by_class[&AssetClass::Portrait].len(),
            by_class[&AssetClass::Icon].len(),
            by_class[&AssetClass::PlanetBackdrop].len()
        );

        Self {
            by_class: Arc::new(RwLock::new(by_class)),
        }
    }

    /// Ordered, deterministic list of enabled sources for one class.
    pub async fn sources_for(&self, class: AssetClass) -> Vec<Source> {
        let by_class = self.by_class.read().await;
        by_class
            .get(&class)
            .map(|sources| sources.iter().filter(|s| s.enabled).cloned().collect())
            .unwrap_or_default()
    }

    /// Every configured source across all classes, deduplicated by name.
    /// Used by the health endpoint.
    pub async fn all_source_names(&self) -> Vec<String> {
        let by_class = self.by_class.read().await;
        let mut names = Vec::new();
        for sources in by_class.values() {
            for source in sources {
                if !names.contains(&source.name) {
                    names.push(source.name.clone());
                }
            }
        }
        names.sort();
        names
    }

    /// Admin action: enable or disable a remote source by name. Local
    /// kinds cannot be disabled since they terminate the fallback chain.
    /// Returns false if no such remote source exists.
    pub async fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut by_class = self.by_class.write().await;
        let mut found = false;
        for sources in by_class.values_mut() {
            for source in sources.iter_mut() {
                if source.name == name {
                    if source.kind != SourceKind::Remote {
                        warn!("Refusing to toggle non-remote source '{}'", name);
                        return false;
                    }
                    source.enabled = enabled;
                    found = true;
                }
            }
        }
        if found {
            info!(
                "Source '{}' {}",
                name,
                if enabled { "enabled" } else { "disabled" }
            );
        }
        found
    }
}

fn remote(name: &str, url_template: String, priority: u32) -> Source {
    Source {
        name: name.to_string(),
        url_template,
        priority,
        kind: SourceKind::Remote,
        enabled: true,
    }
}

fn local_store(web_base: &str, class: AssetClass) -> Source {
    Source {
        name: LOCAL_STORE_SOURCE.to_string(),
        url_template: format!(
            "{web_base}/assets/proxy/{{game_id}}?class={}&size={{size}}",
            class.as_str()
        ),
        priority: 90,
        kind: SourceKind::LocalStore,
        enabled: true,
    }
}

fn bundled_fallback(web_base: &str) -> Source {
    Source {
        name: BUNDLED_FALLBACK_SOURCE.to_string(),
        url_template: format!("{web_base}{FALLBACK_PATH}"),
        priority: 100,
        kind: SourceKind::BundledFallback,
        enabled: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn registry() -> SourceRegistry {
        let config = Config::default();
        SourceRegistry::new(&config.sources, "http://localhost:8080")
    }

    #[tokio::test]
    async fn portrait_sources_ordered_with_local_kinds_last() {
        let sources = registry().sources_for(AssetClass::Portrait).await;
        assert!(sources.len() >= 4);
        assert!(sources.windows(2).all(|w| w[0].priority <= w[1].priority));
        let last_two: Vec<_> = sources.iter().rev().take(2).map(|s| s.kind).collect();
        assert_eq!(
            last_two,
            vec![SourceKind::BundledFallback, SourceKind::LocalStore]
        );
    }

    #[tokio::test]
    async fn ordering_is_deterministic() {
        let registry = registry();
        let a = registry.sources_for(AssetClass::Icon).await;
        let b = registry.sources_for(AssetClass::Icon).await;
        let names_a: Vec<_> = a.iter().map(|s| &s.name).collect();
        let names_b: Vec<_> = b.iter().map(|s| &s.name).collect();
        assert_eq!(names_a, names_b);
    }

    #[tokio::test]
    async fn disable_removes_remote_from_listing() {
        let registry = registry();
        assert!(registry.set_enabled("wiki-mirror", false).await);
        let sources = registry.sources_for(AssetClass::Portrait).await;
        assert!(sources.iter().all(|s| s.name != "wiki-mirror"));

        assert!(registry.set_enabled("wiki-mirror", true).await);
        let sources = registry.sources_for(AssetClass::Portrait).await;
        assert!(sources.iter().any(|s| s.name == "wiki-mirror"));
    }

    #[tokio::test]
    async fn fallback_cannot_be_disabled() {
        let registry = registry();
        assert!(!registry.set_enabled(BUNDLED_FALLBACK_SOURCE, false).await);
        let sources = registry.sources_for(AssetClass::Portrait).await;
        assert!(sources
            .iter()
            .any(|s| s.kind == SourceKind::BundledFallback));
    }

    #[tokio::test]
    async fn unknown_source_toggle_reports_missing() {
        assert!(!registry().set_enabled("no-such-source", false).await);
    }
}
