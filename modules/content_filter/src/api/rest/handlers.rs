//! HTTP request handlers - thin layer that delegates to domain service

use super::{
    dto::*,
    error::{map_domain_error, Problem},
};
use crate::contract::{AuthContext, FilterMode, PostId, SettingsError, SiteId};
use crate::domain::Service;
use axum::{extract::Path, Json};
use std::sync::Arc;

// ===== Access checks =====

fn require_user(auth: Option<&AuthContext>) -> Result<&AuthContext, Problem> {
    auth.ok_or_else(Problem::unauthorized)
}

fn require_admin(auth: Option<&AuthContext>) -> Result<&AuthContext, Problem> {
    let auth = require_user(auth)?;
    if !auth.is_admin {
        return Err(map_domain_error(SettingsError::Forbidden {
            reason: "Administrator privileges are required".to_string(),
        }));
    }
    Ok(auth)
}

// ===== Transform =====

/// Transform content on demand with the current site's options
pub async fn transform(
    service: Arc<Service>,
    auth: Option<AuthContext>,
    Json(req): Json<TransformRequest>,
) -> Result<Json<TransformResponse>, Problem> {
    require_user(auth.as_ref())?;

    let mode = match req.mode.as_deref() {
        Some(name) => Some(FilterMode::parse(name).ok_or_else(|| {
            map_domain_error(SettingsError::validation(format!(
                "unknown filter mode '{}'",
                name
            )))
        })?),
        None => None,
    };

    let outcome = service
        .transform_on_demand(&req.content, mode, req.options.as_ref())
        .await;

    Ok(Json(TransformResponse {
        original_length: req.content.len(),
        filtered_length: outcome.filtered.len(),
        filtered_content: outcome.filtered,
        mode: outcome.mode.as_str().to_string(),
    }))
}

// ===== Cache =====

pub async fn cache_stats(
    service: Arc<Service>,
    auth: Option<AuthContext>,
) -> Result<Json<CacheStatsDto>, Problem> {
    require_admin(auth.as_ref())?;
    Ok(Json(service.cache_stats().into()))
}

pub async fn clear_cache(
    service: Arc<Service>,
    auth: Option<AuthContext>,
) -> Result<Json<CacheClearedDto>, Problem> {
    let auth = require_admin(auth.as_ref())?;
    let removed = service.clear_cache().await;
    tracing::info!(user = ?auth.user_id, removed, "Transform cache cleared");
    Ok(Json(CacheClearedDto { removed }))
}

pub async fn clear_post_cache(
    service: Arc<Service>,
    auth: Option<AuthContext>,
    Path(post_id): Path<PostId>,
) -> Result<Json<CacheClearedDto>, Problem> {
    require_admin(auth.as_ref())?;
    let removed = service.on_post_updated(post_id).await;
    Ok(Json(CacheClearedDto { removed }))
}

// ===== Options =====

pub async fn get_site_options(
    service: Arc<Service>,
    auth: Option<AuthContext>,
    Path(site_id): Path<SiteId>,
) -> Result<Json<EffectiveOptionsDto>, Problem> {
    require_admin(auth.as_ref())?;
    Ok(Json(service.get_effective_options(site_id).await.into()))
}

pub async fn update_site_options(
    service: Arc<Service>,
    auth: Option<AuthContext>,
    Path(site_id): Path<SiteId>,
    Json(req): Json<UpdateSiteOptionsRequest>,
) -> Result<Json<SiteSettingsDto>, Problem> {
    let auth = require_admin(auth.as_ref())?;
    let settings = service
        .update_site_options(site_id, req.options, req.overrides)
        .await
        .map_err(map_domain_error)?;
    tracing::info!(user = ?auth.user_id, site_id, "Site options written");
    Ok(Json(SiteSettingsDto::new(site_id, settings)))
}

pub async fn get_network_options(
    service: Arc<Service>,
    auth: Option<AuthContext>,
) -> Result<Json<NetworkOptionsDto>, Problem> {
    require_admin(auth.as_ref())?;
    Ok(Json(service.get_network_options().await.into()))
}

pub async fn update_network_options(
    service: Arc<Service>,
    auth: Option<AuthContext>,
    Json(req): Json<UpdateNetworkOptionsRequest>,
) -> Result<Json<NetworkOptionsDto>, Problem> {
    let auth = require_admin(auth.as_ref())?;
    let network = service
        .update_network_options(req.options)
        .await
        .map_err(map_domain_error)?;
    tracing::info!(user = ?auth.user_id, "Network options written");
    Ok(Json(network.into()))
}

pub async fn sync_network(
    service: Arc<Service>,
    auth: Option<AuthContext>,
) -> Result<Json<SyncReportDto>, Problem> {
    require_admin(auth.as_ref())?;
    let report = service.sync_all_sites().await.map_err(map_domain_error)?;
    Ok(Json(report.into()))
}

// ===== Status =====

pub async fn status(
    service: Arc<Service>,
    auth: Option<AuthContext>,
) -> Result<Json<StatusDto>, Problem> {
    require_admin(auth.as_ref())?;
    Ok(Json(service.status().into()))
}
