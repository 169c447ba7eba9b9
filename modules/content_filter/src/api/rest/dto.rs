//! REST DTOs with serde derives for HTTP API

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

// ===== Transform DTOs =====

/// On-demand transform request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransformRequest {
    /// Raw HTML to transform
    #[schema(example = "<p>Hello <strong>world</strong>!</p>")]
    pub content: String,

    /// Filter mode; the site's configured mode when omitted
    #[serde(default)]
    #[schema(example = "markdown")]
    pub mode: Option<String>,

    /// Option values overlaid on the site's effective options for this call
    #[serde(default)]
    pub options: Option<BTreeMap<String, serde_json::Value>>,
}

/// On-demand transform response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransformResponse {
    pub filtered_content: String,

    /// Input length in bytes
    pub original_length: usize,

    /// Output length in bytes
    pub filtered_length: usize,

    /// Mode that was applied
    pub mode: String,
}

// ===== Cache DTOs =====

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheStatsDto {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Result of a cache clear
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheClearedDto {
    /// Entries removed
    pub removed: usize,
}

// ===== Options DTOs =====

/// Effective options of a site
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EffectiveOptionsDto {
    pub site_id: i64,
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Site options update request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateSiteOptionsRequest {
    /// Values to write
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,

    /// Override flags to set (`true`) or clear (`false`)
    #[serde(default)]
    pub overrides: BTreeMap<String, bool>,
}

/// Stored site record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SiteSettingsDto {
    pub site_id: i64,
    pub options: BTreeMap<String, serde_json::Value>,
    pub overrides: BTreeMap<String, bool>,
    /// Unix timestamp of the last network sync
    pub last_sync: Option<i64>,
}

/// Network options update request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateNetworkOptionsRequest {
    pub options: BTreeMap<String, serde_json::Value>,
}

/// Network record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NetworkOptionsDto {
    pub options: BTreeMap<String, serde_json::Value>,
    pub enforce_network_settings: bool,
    pub allow_site_overrides: bool,
}

/// Network sync outcome
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncReportDto {
    pub synced_count: usize,
    /// Sites whose sync failed
    pub failures: Vec<i64>,
}

// ===== Status DTOs =====

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SurfaceStatusDto {
    #[schema(example = "graphql")]
    pub surface: String,
    #[schema(example = "registered")]
    pub state: String,
    pub hooks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NoticeDto {
    pub surface: String,
    pub message: String,
}

/// Module status
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusDto {
    pub surfaces: Vec<SurfaceStatusDto>,
    pub notices: Vec<NoticeDto>,
    pub cache: CacheStatsDto,
}
