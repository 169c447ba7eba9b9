//! Route registration and OpenAPI document

use super::{dto::*, error::Problem, handlers};
use crate::contract::{AuthContext, PostId, SiteId};
use crate::domain::Service;
use axum::{
    extract::Path,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// Mount point of the management API
pub const BASE_PATH: &str = "/content-filter/v1";

/// OpenAPI components of the management API
#[derive(OpenApi)]
#[openapi(components(schemas(
    TransformRequest,
    TransformResponse,
    CacheStatsDto,
    CacheClearedDto,
    EffectiveOptionsDto,
    UpdateSiteOptionsRequest,
    SiteSettingsDto,
    UpdateNetworkOptionsRequest,
    NetworkOptionsDto,
    SyncReportDto,
    SurfaceStatusDto,
    NoticeDto,
    StatusDto
)))]
pub struct ContentFilterApiDoc;

/// Register all REST routes under [`BASE_PATH`]
pub fn register_routes(router: Router, service: Arc<Service>) -> anyhow::Result<Router> {
    let api = Router::new()
        .route("/transform", post(transform_handler))
        .route("/cache", delete(clear_cache_handler))
        .route("/cache/stats", get(cache_stats_handler))
        .route("/cache/posts/{post_id}", delete(clear_post_cache_handler))
        .route(
            "/sites/{site_id}/options",
            get(get_site_options_handler).put(update_site_options_handler),
        )
        .route(
            "/network/options",
            get(get_network_options_handler).put(update_network_options_handler),
        )
        .route("/network/sync", post(sync_network_handler))
        .route("/status", get(status_handler))
        .layer(Extension(service));

    Ok(router.nest(BASE_PATH, api))
}

type Auth = Option<Extension<AuthContext>>;

fn auth_of(auth: Auth) -> Option<AuthContext> {
    auth.map(|Extension(auth)| auth)
}

// ===== Handler wrappers that extract service and caller from extensions =====

async fn transform_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
    json: Json<TransformRequest>,
) -> Result<Json<TransformResponse>, Problem> {
    handlers::transform(service, auth_of(auth), json).await
}

async fn cache_stats_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
) -> Result<Json<CacheStatsDto>, Problem> {
    handlers::cache_stats(service, auth_of(auth)).await
}

async fn clear_cache_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
) -> Result<Json<CacheClearedDto>, Problem> {
    handlers::clear_cache(service, auth_of(auth)).await
}

async fn clear_post_cache_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
    path: Path<PostId>,
) -> Result<Json<CacheClearedDto>, Problem> {
    handlers::clear_post_cache(service, auth_of(auth), path).await
}

async fn get_site_options_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
    path: Path<SiteId>,
) -> Result<Json<EffectiveOptionsDto>, Problem> {
    handlers::get_site_options(service, auth_of(auth), path).await
}

async fn update_site_options_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
    path: Path<SiteId>,
    json: Json<UpdateSiteOptionsRequest>,
) -> Result<Json<SiteSettingsDto>, Problem> {
    handlers::update_site_options(service, auth_of(auth), path, json).await
}

async fn get_network_options_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
) -> Result<Json<NetworkOptionsDto>, Problem> {
    handlers::get_network_options(service, auth_of(auth)).await
}

async fn update_network_options_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
    json: Json<UpdateNetworkOptionsRequest>,
) -> Result<Json<NetworkOptionsDto>, Problem> {
    handlers::update_network_options(service, auth_of(auth), json).await
}

async fn sync_network_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
) -> Result<Json<SyncReportDto>, Problem> {
    handlers::sync_network(service, auth_of(auth)).await
}

async fn status_handler(
    Extension(service): Extension<Arc<Service>>,
    auth: Auth,
) -> Result<Json<StatusDto>, Problem> {
    handlers::status(service, auth_of(auth)).await
}
