//! Contract models for the content filter
//!
//! These models are transport-agnostic and used for inter-module communication.
//! NO serde derives - storage and REST layers carry their own JSON shapes.

use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a tenant site
pub type SiteId = i64;

/// Identifier of a post
pub type PostId = i64;

/// Flat option map as persisted by the host (key -> scalar/list JSON value)
pub type OptionMap = BTreeMap<String, serde_json::Value>;

/// Per-key override flags of a site
pub type OverrideMap = BTreeMap<String, bool>;

/// Top-level transform selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Content passes through untouched
    None,
    /// All markup removed
    #[default]
    StripAll,
    /// Markup converted to Markdown syntax
    Markdown,
    /// Only an operator-supplied tag allowlist survives
    Custom,
}

impl FilterMode {
    pub const ALL: [FilterMode; 4] = [
        FilterMode::None,
        FilterMode::StripAll,
        FilterMode::Markdown,
        FilterMode::Custom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterMode::None => "none",
            FilterMode::StripAll => "strip_all",
            FilterMode::Markdown => "markdown",
            FilterMode::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(FilterMode::None),
            "strip_all" => Some(FilterMode::StripAll),
            "markdown" => Some(FilterMode::Markdown),
            "custom" => Some(FilterMode::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post field that can be intercepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContentFieldName {
    Content,
    Excerpt,
}

impl ContentFieldName {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentFieldName::Content => "content",
            ContentFieldName::Excerpt => "excerpt",
        }
    }
}

impl fmt::Display for ContentFieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value captured during response serialization
///
/// `raw` is whatever the host pipeline produced: a plain string for GraphQL,
/// usually an object with a `rendered` string for REST.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentField {
    pub post_id: PostId,
    pub field: ContentFieldName,
    pub raw: serde_json::Value,
}

/// Stored per-site record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SiteSettings {
    /// Site values (overridden ones and synced copies of network values)
    pub options: OptionMap,
    /// `true` marks a key that intentionally diverges from the network
    pub overrides: OverrideMap,
    /// Unix timestamp of the last network sync
    pub last_sync: Option<i64>,
}

impl SiteSettings {
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.get(key).copied().unwrap_or(false)
    }
}

/// Site record as found in storage, before migration
#[derive(Debug, Clone, PartialEq)]
pub enum StoredSiteRecord {
    /// `{ options, overrides, last_sync }`
    Structured(SiteSettings),
    /// Flat option map written before override tracking existed
    Legacy(OptionMap),
}

/// Network-wide record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkSettings {
    pub options: OptionMap,
}

impl NetworkSettings {
    pub const ENFORCE_KEY: &'static str = "enforce_network_settings";
    pub const ALLOW_OVERRIDES_KEY: &'static str = "allow_site_overrides";

    pub fn new(options: OptionMap) -> Self {
        Self { options }
    }

    /// Network values are authoritative over every site
    pub fn enforce(&self) -> bool {
        self.options
            .get(Self::ENFORCE_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// Sites may keep per-key overrides
    pub fn allow_site_overrides(&self) -> bool {
        self.options
            .get(Self::ALLOW_OVERRIDES_KEY)
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true)
    }
}

/// Typed view over resolved options
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterOptions {
    pub filter_mode: FilterMode,
    pub preserve_line_breaks: bool,
    pub convert_headings: bool,
    pub convert_links: bool,
    pub convert_lists: bool,
    pub convert_emphasis: bool,
    pub convert_code: bool,
    pub custom_allowed_tags: String,
    pub apply_to_content: bool,
    pub apply_to_excerpt: bool,
    pub apply_to_rest_api: bool,
    pub apply_to_graphql: bool,
    pub enabled_post_types: Vec<String>,
    pub enable_cache: bool,
    /// Seconds, clamped to 60..=86400
    pub cache_ttl: u32,
    /// Clamped to 10..=1000
    pub batch_size: u32,
    pub debug_mode: bool,
}

impl FilterOptions {
    pub fn applies_to(&self, field: ContentFieldName) -> bool {
        match field {
            ContentFieldName::Content => self.apply_to_content,
            ContentFieldName::Excerpt => self.apply_to_excerpt,
        }
    }

    pub fn is_post_type_enabled(&self, post_type: &str) -> bool {
        self.enabled_post_types.iter().any(|t| t == post_type)
    }
}

/// Fully resolved configuration for one site
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveOptions {
    pub site_id: SiteId,
    /// Merged raw values, one entry per known key
    pub values: OptionMap,
    /// Typed interpretation of `values`
    pub filter: FilterOptions,
}

impl EffectiveOptions {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }
}

/// Which memoized options to drop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationScope {
    CurrentSite,
    Network,
    All,
}

/// Aggregate result of a network-to-sites sync
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub synced_count: usize,
    pub failures: Vec<SiteId>,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Transform cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// API surface a field hook is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiSurface {
    Graphql,
    Rest,
}

impl ApiSurface {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiSurface::Graphql => "graphql",
            ApiSurface::Rest => "rest",
        }
    }
}

impl fmt::Display for ApiSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one surface's hook registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    Registering,
    Registered,
    Unregistering,
}

/// Outcome of one registration pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub surface: ApiSurface,
    /// Types that received at least one new hook
    pub registered: Vec<String>,
    /// Types dropped by the type ceiling or the memory budget
    pub skipped: Vec<String>,
    /// Types whose attachment failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Pass did not run because registration was already in progress or done
    pub noop: bool,
}

impl RegistrationReport {
    pub fn new(surface: ApiSurface) -> Self {
        Self {
            surface,
            registered: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
            noop: false,
        }
    }

    pub fn noop(surface: ApiSurface) -> Self {
        Self {
            noop: true,
            ..Self::new(surface)
        }
    }
}

/// Operator-visible notice (missing integration, degraded mode)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub surface: ApiSurface,
    pub message: String,
}

/// Registration status of one surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStatus {
    pub surface: ApiSurface,
    pub state: RegistrationState,
    /// Hooks currently attached
    pub hooks: usize,
}

/// Operational snapshot for operators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleStatus {
    pub surfaces: Vec<SurfaceStatus>,
    pub notices: Vec<Notice>,
    pub cache: CacheStats,
}

/// Authentication context for privilege-aware operations
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthContext {
    /// Whether the caller may manage settings and caches
    pub is_admin: bool,
    /// Optional user identifier for audit logging
    pub user_id: Option<String>,
}

impl AuthContext {
    /// Authenticated caller without management rights
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            is_admin: false,
            user_id: Some(user_id.into()),
        }
    }

    /// Administrator
    pub fn admin(user_id: Option<String>) -> Self {
        Self {
            is_admin: true,
            user_id,
        }
    }
}
