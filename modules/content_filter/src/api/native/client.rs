//! Native client implementation - wraps domain service for in-process calls

use crate::contract::{
    CacheStats, ContentFilterApi, EffectiveOptions, FilterMode, NetworkSettings, OptionMap,
    OverrideMap, PostId, SettingsError, SiteId, SiteSettings, SyncReport,
};
use crate::domain::Service;
use async_trait::async_trait;
use std::sync::Arc;

/// Native client that calls the domain service directly
///
/// Used by other in-process modules without HTTP overhead.
#[derive(Clone)]
pub struct NativeClient {
    service: Arc<Service>,
}

impl NativeClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ContentFilterApi for NativeClient {
    async fn get_effective_options(&self, site_id: SiteId) -> EffectiveOptions {
        self.service.get_effective_options(site_id).await
    }

    async fn update_site_options(
        &self,
        site_id: SiteId,
        options: OptionMap,
        overrides: OverrideMap,
    ) -> Result<SiteSettings, SettingsError> {
        self.service
            .update_site_options(site_id, options, overrides)
            .await
    }

    async fn update_network_options(
        &self,
        options: OptionMap,
    ) -> Result<NetworkSettings, SettingsError> {
        self.service.update_network_options(options).await
    }

    async fn sync_all_sites(&self) -> Result<SyncReport, SettingsError> {
        self.service.sync_all_sites().await
    }

    async fn transform(&self, content: &str, mode: Option<FilterMode>) -> String {
        self.service
            .transform_on_demand(content, mode, None)
            .await
            .filtered
    }

    async fn clear_cache(&self) -> usize {
        self.service.clear_cache().await
    }

    async fn clear_post_cache(&self, post_id: PostId) -> usize {
        self.service.on_post_updated(post_id).await
    }

    fn cache_stats(&self) -> CacheStats {
        self.service.cache_stats()
    }
}
