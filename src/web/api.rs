use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Json, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info};

use super::AppState;
use crate::errors::SyncError;
use crate::models::{
    AssetClass, AssetFormat, AssetIdentity, HealthState, HealthSummaryResponse, IconResponse,
    PortraitResponse, SizeVariant, SyncResult, UnitAssetsResponse,
};
use crate::store::LocalAssetStore;

#[derive(Debug, Deserialize)]
pub struct VariantParams {
    pub size: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyParams {
    pub class: Option<String>,
    pub size: Option<String>,
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    pub prefix: Option<String>,
}

fn parse_size(value: Option<&str>) -> Result<SizeVariant, StatusCode> {
    match value {
        None => Ok(SizeVariant::Md),
        Some(raw) => SizeVariant::parse(raw).ok_or(StatusCode::BAD_REQUEST),
    }
}

fn parse_format(value: Option<&str>) -> Result<AssetFormat, StatusCode> {
    match value {
        None => Ok(AssetFormat::Png),
        Some(raw) => AssetFormat::parse(raw).ok_or(StatusCode::BAD_REQUEST),
    }
}

fn parse_class(value: Option<&str>) -> Result<AssetClass, StatusCode> {
    match value {
        None | Some("portrait") => Ok(AssetClass::Portrait),
        Some("icon") => Ok(AssetClass::Icon),
        Some("planet-backdrop") => Ok(AssetClass::PlanetBackdrop),
        Some(_) => Err(StatusCode::BAD_REQUEST),
    }
}

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn get_portrait(
    Path(game_id): Path<String>,
    Query(params): Query<VariantParams>,
    State(state): State<AppState>,
) -> Result<Json<PortraitResponse>, StatusCode> {
    let size = parse_size(params.size.as_deref())?;
    let format = parse_format(params.format.as_deref())?;

    let identity = AssetIdentity::new(game_id.clone(), AssetClass::Portrait, size, format);
    let resolution = state.locator.resolve(&identity).await;

    Ok(Json(PortraitResponse {
        game_id,
        size,
        url: resolution.url,
    }))
}

pub async fn get_icon(
    Path(game_id): Path<String>,
    Query(params): Query<VariantParams>,
    State(state): State<AppState>,
) -> Result<Json<IconResponse>, StatusCode> {
    let format = parse_format(params.format.as_deref())?;

    let identity = AssetIdentity::new(game_id.clone(), AssetClass::Icon, SizeVariant::Sm, format);
    let resolution = state.locator.resolve(&identity).await;

    Ok(Json(IconResponse {
        game_id,
        url: resolution.url,
    }))
}

/// Every variant for one unit in a single response, so clients warming a
/// squad view need one round trip per unit instead of four.
pub async fn get_unit_assets(
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Json<UnitAssetsResponse> {
    let mut portraits = HashMap::new();
    for size in SizeVariant::all() {
        let identity = AssetIdentity::portrait(game_id.clone(), size);
        let resolution = state.locator.resolve(&identity).await;
        portraits.insert(size.as_str().to_string(), resolution.url);
    }

    let mut icons = HashMap::new();
    let icon_identity = AssetIdentity::icon(game_id.clone());
    let resolution = state.locator.resolve(&icon_identity).await;
    icons.insert("sm".to_string(), resolution.url);

    Json(UnitAssetsResponse {
        game_id,
        portraits,
        icons,
    })
}

pub async fn get_manifest(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let manifest = state.manifest.current().await.ok_or(StatusCode::NOT_FOUND)?;
    let body = serde_json::to_string(&manifest).map_err(|e| {
        error!("Manifest serialization failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Response::builder()
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(body))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn get_source_health(State(state): State<AppState>) -> Json<HealthSummaryResponse> {
    let sources = state.health.records().await;
    let healthy = sources
        .iter()
        .filter(|r| r.state == HealthState::Healthy)
        .count();
    let degraded = sources
        .iter()
        .filter(|r| r.state == HealthState::Degraded)
        .count();
    let down = sources
        .iter()
        .filter(|r| r.state == HealthState::Down)
        .count();

    Json(HealthSummaryResponse {
        sources,
        healthy,
        degraded,
        down,
    })
}

/// Validation sweep over the whole expected asset set. Nothing is
/// downloaded; the response summarizes store coverage in the same shape
/// a sync run reports.
pub async fn refresh_cache(
    State(state): State<AppState>,
) -> Result<Json<SyncResult>, StatusCode> {
    match state.sync.validate_all().await {
        Ok((report, result)) => {
            info!(
                "Validation sweep: {}/{} valid ({:.1}%)",
                report.valid, report.checked, report.coverage_percent
            );
            Ok(Json(result))
        }
        Err(SyncError::Catalog { message }) => {
            error!("Validation sweep failed, catalog unavailable: {}", message);
            Err(StatusCode::BAD_GATEWAY)
        }
        Err(e) => {
            error!("Validation sweep failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// 302 to wherever the identity currently resolves. `<img src>` clients
/// follow this without caring which source won.
pub async fn redirect_to_image(
    Path(game_id): Path<String>,
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let class = parse_class(params.class.as_deref())?;
    let size = parse_size(params.size.as_deref())?;
    let format = parse_format(params.format.as_deref())?;

    let identity = AssetIdentity::new(game_id, class, size, format);
    let resolution = state.locator.resolve(&identity).await;

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, resolution.url)
        .body(Body::empty())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serve the actual bytes through the cache layer. This is also the URL
/// the registry's local-store source points at.
pub async fn serve_asset_bytes(
    Path(game_id): Path<String>,
    Query(params): Query<ProxyParams>,
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let class = parse_class(params.class.as_deref())?;
    let size = parse_size(params.size.as_deref())?;
    let format = parse_format(params.format.as_deref())?;

    let identity = AssetIdentity::new(game_id, class, size, format);
    let payload = state.cache.get(&identity).await;

    Response::builder()
        .header(header::CONTENT_TYPE, payload.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=3600")
        .body(Body::from(payload.bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn serve_fallback() -> Result<Response, StatusCode> {
    Response::builder()
        .header(header::CONTENT_TYPE, "image/png")
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(LocalAssetStore::fallback_bytes()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub async fn clear_cache(
    Query(params): Query<ClearParams>,
    State(state): State<AppState>,
) -> Json<serde_json::Value> {
    let cleared = match params.prefix.as_deref() {
        Some(prefix) if !prefix.is_empty() => state.cache.clear_prefix(prefix).await,
        _ => state.cache.clear_all().await,
    };
    info!("Cache clear requested: {} entries removed", cleared);
    Json(json!({ "cleared": cleared }))
}

pub async fn enable_source(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    set_source_enabled(&state, &name, true).await
}

pub async fn disable_source(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    set_source_enabled(&state, &name, false).await
}

async fn set_source_enabled(
    state: &AppState,
    name: &str,
    enabled: bool,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if state.registry.set_enabled(name, enabled).await {
        Ok(Json(json!({ "source": name, "enabled": enabled })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
