//! Native client trait for inter-module communication
//!
//! Other modules (admin surface, CLI tooling) use this to read and manage the
//! filter without going through HTTP.

use super::{
    error::SettingsError,
    model::{
        CacheStats, EffectiveOptions, FilterMode, NetworkSettings, OptionMap, OverrideMap, PostId,
        SiteId, SiteSettings, SyncReport,
    },
};
use async_trait::async_trait;

/// Content filter API for inter-module communication
#[async_trait]
pub trait ContentFilterApi: Send + Sync {
    // ===== Options =====

    /// Resolve the options a request on `site_id` would use
    async fn get_effective_options(&self, site_id: SiteId) -> EffectiveOptions;

    /// Persist site values and override flags
    async fn update_site_options(
        &self,
        site_id: SiteId,
        options: OptionMap,
        overrides: OverrideMap,
    ) -> Result<SiteSettings, SettingsError>;

    /// Persist network values
    async fn update_network_options(
        &self,
        options: OptionMap,
    ) -> Result<NetworkSettings, SettingsError>;

    /// Push current network values to every site
    async fn sync_all_sites(&self) -> Result<SyncReport, SettingsError>;

    // ===== Content =====

    /// Transform `content` with the current site's options, optionally forcing a mode
    async fn transform(&self, content: &str, mode: Option<FilterMode>) -> String;

    // ===== Cache =====

    /// Drop every cached transform
    async fn clear_cache(&self) -> usize;

    /// Drop cached transforms of one post
    async fn clear_post_cache(&self, post_id: PostId) -> usize;

    /// Cache counters
    fn cache_stats(&self) -> CacheStats;
}
