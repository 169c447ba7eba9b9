//! Domain service - application context
//!
//! Owns one instance of every component and wires them to the host bindings.
//! Nothing here is global: tests build a fresh service per case.

use super::events::{CacheInvalidatingPublisher, EventPublisher, OptionsEvent};
use super::host::{HostBindings, SiteContext};
use super::interception::{GraphqlInterceptor, HookManager, RestInterceptor};
use super::resolver::SettingsResolver;
use super::sync::SettingsSynchronizer;
use super::transform::{ContentTransformer, HtmlTransformer, RequestScope, TransformCache, TransformEngine};
use crate::config::Config;
use crate::contract::{
    ApiSurface, CacheStats, ContentField, EffectiveOptions, FilterMode, FilterOptions,
    ModuleStatus, NetworkSettings, Notice, OptionMap, OverrideMap, PostId, RegistrationReport,
    SettingsError, SiteId, SiteSettings, SurfaceStatus, SyncReport,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Result of an on-demand transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    pub filtered: String,
    pub mode: FilterMode,
}

/// Domain service for content filtering
pub struct Service {
    resolver: Arc<SettingsResolver>,
    engine: Arc<TransformEngine>,
    graphql: Option<Arc<GraphqlInterceptor>>,
    rest: Arc<RestInterceptor>,
    synchronizer: SettingsSynchronizer,
    events: Arc<dyn EventPublisher>,
    sites: Arc<dyn SiteContext>,
    notices: RwLock<Vec<Notice>>,
}

impl Service {
    /// Create a service with the HTML transformer
    pub fn new(bindings: HostBindings, config: &Config) -> Self {
        Self::with_transformer(bindings, config, Arc::new(HtmlTransformer))
    }

    /// Create a service around a specific transformer
    pub fn with_transformer(
        bindings: HostBindings,
        config: &Config,
        transformer: Arc<dyn ContentTransformer>,
    ) -> Self {
        let cache = Arc::new(TransformCache::with_max_entries(config.cache_max_entries));
        let events: Arc<dyn EventPublisher> =
            Arc::new(CacheInvalidatingPublisher::new(cache.clone()));
        let engine = Arc::new(TransformEngine::new(transformer, cache, config));
        let resolver = Arc::new(SettingsResolver::new(
            bindings.options.clone(),
            bindings.sites.clone(),
            events.clone(),
            config.options_cache_ttl(),
        ));

        let graphql = bindings.graphql.clone().map(|host| {
            Arc::new(GraphqlInterceptor::new(
                host,
                resolver.clone(),
                engine.clone(),
                bindings.posts.clone(),
                bindings.memory.clone(),
                config,
            ))
        });
        let rest = Arc::new(RestInterceptor::new(
            bindings.rest.clone(),
            resolver.clone(),
            engine.clone(),
            bindings.posts.clone(),
            bindings.memory.clone(),
            config,
        ));
        let synchronizer = SettingsSynchronizer::new(resolver.clone(), bindings.sites.clone());

        Self {
            resolver,
            engine,
            graphql,
            rest,
            synchronizer,
            events,
            sites: bindings.sites,
            notices: RwLock::new(Vec::new()),
        }
    }

    pub fn resolver(&self) -> &Arc<SettingsResolver> {
        &self.resolver
    }

    pub fn engine(&self) -> &Arc<TransformEngine> {
        &self.engine
    }

    pub fn graphql(&self) -> Option<&Arc<GraphqlInterceptor>> {
        self.graphql.as_ref()
    }

    pub fn rest(&self) -> &Arc<RestInterceptor> {
        &self.rest
    }

    fn managers(&self) -> Vec<&dyn HookManager> {
        let mut managers: Vec<&dyn HookManager> = Vec::new();
        if let Some(graphql) = &self.graphql {
            managers.push(graphql.as_ref());
        }
        managers.push(self.rest.as_ref());
        managers
    }

    // ===== Lifecycle =====

    /// Write default records once
    pub async fn activate(&self, site_id: SiteId) -> Result<(), SettingsError> {
        let site_written = self.resolver.ensure_site_defaults(site_id).await?;
        let network_written = if self.sites.is_multisite() {
            self.resolver.ensure_network_defaults().await?
        } else {
            false
        };
        tracing::info!(site_id, site_written, network_written, "Content filter activated");
        Ok(())
    }

    /// Register hooks on every surface that should be active
    ///
    /// A missing or incompatible GraphQL engine is recorded as a notice and
    /// the REST surface keeps working.
    pub async fn bootstrap(&self) -> Vec<RegistrationReport> {
        let mut reports = Vec::new();

        match &self.graphql {
            None => self.notify(
                ApiSurface::Graphql,
                "GraphQL engine is not installed; filtering REST responses only".to_string(),
            ),
            Some(graphql) => {
                if let Some(reason) = graphql.incompatibility() {
                    self.notify(ApiSurface::Graphql, reason);
                } else if graphql.should_activate().await {
                    reports.push(graphql.register_all().await);
                }
            }
        }

        if self.rest.should_activate().await {
            reports.push(self.rest.register_all().await);
        }
        reports
    }

    /// Remove every attached hook
    pub fn deactivate(&self) -> usize {
        let removed: usize = self.managers().iter().map(|m| m.deregister()).sum();
        tracing::info!(removed, "Content filter deactivated");
        removed
    }

    /// Deactivate and optionally delete all stored options
    pub async fn uninstall(&self, remove_data: bool) -> Result<usize, SettingsError> {
        self.deactivate();
        if !remove_data {
            return Ok(0);
        }
        let removed = self.resolver.remove_all_data().await?;
        self.engine.cache().clear_all();
        tracing::info!(removed, "Content filter data removed");
        Ok(removed)
    }

    fn notify(&self, surface: ApiSurface, message: String) {
        tracing::warn!(%surface, "{}", message);
        let notice = Notice { surface, message };
        let mut notices = self.notices.write();
        if !notices.contains(&notice) {
            notices.push(notice);
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.read().clone()
    }

    pub fn status(&self) -> ModuleStatus {
        ModuleStatus {
            surfaces: self
                .managers()
                .into_iter()
                .map(|m| SurfaceStatus {
                    surface: m.surface(),
                    state: m.state(),
                    hooks: m.hook_count(),
                })
                .collect(),
            notices: self.notices(),
            cache: self.engine.cache().stats(),
        }
    }

    // ===== Interception =====

    /// Budget for one host request
    pub fn begin_request(&self) -> RequestScope {
        self.engine.begin_request()
    }

    /// Rewrite a field on `surface`; unchanged when that surface is not wired
    pub async fn intercept(
        &self,
        surface: ApiSurface,
        field: ContentField,
        scope: &RequestScope,
    ) -> Value {
        match surface {
            ApiSurface::Graphql => match &self.graphql {
                Some(graphql) => graphql.intercept(field, scope).await,
                None => field.raw,
            },
            ApiSurface::Rest => self.rest.intercept(field, scope).await,
        }
    }

    // ===== Options =====

    pub async fn get_effective_options(&self, site_id: SiteId) -> EffectiveOptions {
        self.resolver.get_effective_options(site_id).await
    }

    pub async fn update_site_options(
        &self,
        site_id: SiteId,
        options: OptionMap,
        overrides: OverrideMap,
    ) -> Result<SiteSettings, SettingsError> {
        self.resolver
            .update_site_options(site_id, options, overrides)
            .await
    }

    pub async fn get_network_options(&self) -> NetworkSettings {
        self.resolver.get_network_options().await
    }

    pub async fn update_network_options(
        &self,
        options: OptionMap,
    ) -> Result<NetworkSettings, SettingsError> {
        self.resolver.update_network_options(options).await
    }

    pub async fn sync_all_sites(&self) -> Result<SyncReport, SettingsError> {
        self.synchronizer.sync_all_sites().await
    }

    // ===== Content =====

    /// Transform `content` with the current site's options
    ///
    /// `overlay` replaces individual option values for this call only;
    /// `mode` forces the filter mode.
    pub async fn transform_on_demand(
        &self,
        content: &str,
        mode: Option<FilterMode>,
        overlay: Option<&OptionMap>,
    ) -> TransformOutcome {
        let effective = self.resolver.current_options().await;
        let options = match overlay {
            Some(overlay) => {
                let mut values = effective.values;
                values.extend(overlay.iter().map(|(k, v)| (k.clone(), v.clone())));
                FilterOptions::from_map(&values)
            }
            None => effective.filter,
        };
        let mode = mode.unwrap_or(options.filter_mode);
        TransformOutcome {
            filtered: self.engine.transform(content, mode, &options),
            mode,
        }
    }

    // ===== Cache =====

    /// Drop cached transforms of a post after it changed
    pub async fn on_post_updated(&self, post_id: PostId) -> usize {
        let removed = self.engine.cache().clear_post(post_id);
        self.publish(OptionsEvent::cache_cleared(Some(post_id), removed))
            .await;
        removed
    }

    pub async fn clear_cache(&self) -> usize {
        let removed = self.engine.cache().clear_all();
        tracing::debug!(removed, "Transform cache cleared");
        self.publish(OptionsEvent::cache_cleared(None, removed)).await;
        removed
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache().stats()
    }

    async fn publish(&self, event: OptionsEvent) {
        if let Err(e) = self.events.publish(event).await {
            tracing::warn!(error = %e, "Failed to publish cache event");
        }
    }
}
