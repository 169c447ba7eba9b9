//! Settings resolver - tiered options resolution
//!
//! Effective options are computed from three tiers:
//! compiled defaults, the network record and the site record.
//! On a network, `enforce_network_settings` makes the network authoritative;
//! otherwise a site value only wins for keys the site flags as overridden.

use super::defaults::{self, KEYS};
use super::events::{EventPublisher, OptionsEvent};
use super::host::SiteContext;
use super::repository::OptionsRepository;
use super::validation;
use crate::contract::{
    EffectiveOptions, FilterOptions, InvalidationScope, NetworkSettings, OptionMap, OverrideMap,
    SettingsError, SiteId, SiteSettings, StoredSiteRecord,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Merge the tiers for one site
///
/// `network` is `None` outside a network; site values are then laid directly
/// over the defaults.
pub fn merge_tiers(site: Option<&SiteSettings>, network: Option<&NetworkSettings>) -> OptionMap {
    let mut values = defaults::option_map();

    let Some(network) = network else {
        if let Some(site) = site {
            for (key, value) in &site.options {
                if defaults::is_known_key(key) {
                    values.insert(key.clone(), value.clone());
                }
            }
        }
        return values;
    };

    let honour_overrides = !network.enforce() && network.allow_site_overrides();
    for key in KEYS {
        let site_value = site
            .filter(|site| honour_overrides && site.is_overridden(key))
            .and_then(|site| site.options.get(key));
        if let Some(value) = site_value.or_else(|| network.options.get(key)) {
            values.insert(key.to_string(), value.clone());
        }
    }
    values
}

/// Structured view of a flat legacy record
///
/// Every key whose stored value differs from the compiled default becomes an
/// override; the rest track the network.
pub fn migrate_legacy(flat: &OptionMap) -> SiteSettings {
    let mut settings = SiteSettings::default();
    for (key, value) in flat {
        if !defaults::is_known_key(key) {
            continue;
        }
        if defaults::default_value(key).as_ref() != Some(value) {
            settings.overrides.insert(key.clone(), true);
        }
        settings.options.insert(key.clone(), value.clone());
    }
    settings
}

fn structured(record: StoredSiteRecord) -> SiteSettings {
    match record {
        StoredSiteRecord::Structured(settings) => settings,
        StoredSiteRecord::Legacy(flat) => migrate_legacy(&flat),
    }
}

/// Resolves, persists and synchronizes option tiers
pub struct SettingsResolver {
    repo: Arc<dyn OptionsRepository>,
    sites: Arc<dyn SiteContext>,
    events: Arc<dyn EventPublisher>,
    memo_ttl: Duration,
    /// site_id -> (computed at, options)
    memo: RwLock<HashMap<SiteId, (Instant, EffectiveOptions)>>,
}

impl SettingsResolver {
    pub fn new(
        repo: Arc<dyn OptionsRepository>,
        sites: Arc<dyn SiteContext>,
        events: Arc<dyn EventPublisher>,
        memo_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            sites,
            events,
            memo_ttl,
            memo: RwLock::new(HashMap::new()),
        }
    }

    pub fn sites(&self) -> &Arc<dyn SiteContext> {
        &self.sites
    }

    // ===== Read path =====

    /// Effective options of `site_id`; never fails
    pub async fn get_effective_options(&self, site_id: SiteId) -> EffectiveOptions {
        let memoized = self
            .memo
            .read()
            .get(&site_id)
            .filter(|(computed_at, _)| computed_at.elapsed() < self.memo_ttl)
            .map(|(_, options)| options.clone());
        if let Some(options) = memoized {
            return options;
        }

        // A result built around a failed tier read is served but not memoized
        let mut degraded = false;
        let site = match self.repo.find_site(site_id).await {
            Ok(record) => record.map(structured),
            Err(e) => {
                tracing::warn!(site_id, error = %e, "Failed to read site options; using lower tiers");
                degraded = true;
                None
            }
        };
        let network = if self.sites.is_multisite() {
            match self.repo.find_network().await {
                Ok(record) => Some(record.unwrap_or_default()),
                Err(e) => {
                    tracing::warn!(site_id, error = %e, "Failed to read network options; using defaults");
                    degraded = true;
                    Some(NetworkSettings::default())
                }
            }
        } else {
            None
        };

        let values = merge_tiers(site.as_ref(), network.as_ref());
        let effective = EffectiveOptions {
            site_id,
            filter: FilterOptions::from_map(&values),
            values,
        };
        if !degraded {
            self.memo
                .write()
                .insert(site_id, (Instant::now(), effective.clone()));
        }
        effective
    }

    /// Effective options of the site the current request executes in
    pub async fn current_options(&self) -> EffectiveOptions {
        self.get_effective_options(self.sites.current_site()).await
    }

    /// Stored network values laid over the network defaults
    pub async fn get_network_options(&self) -> NetworkSettings {
        let stored = self.read_network().await;
        let mut options = defaults::network_option_map();
        options.extend(stored.options);
        NetworkSettings::new(options)
    }

    /// Stored network record for write paths; a missing record is empty
    pub async fn stored_network(&self) -> Result<NetworkSettings, SettingsError> {
        Ok(self
            .repo
            .find_network()
            .await
            .map_err(SettingsError::persistence)?
            .unwrap_or_default())
    }

    async fn read_network(&self) -> NetworkSettings {
        match self.repo.find_network().await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read network options; using defaults");
                NetworkSettings::default()
            }
        }
    }

    // ===== Write path =====

    /// Persist site values and override flags
    ///
    /// `options` and `overrides` are merged into the stored record; a `false`
    /// override removes the flag. Nothing changes when the write fails.
    pub async fn update_site_options(
        &self,
        site_id: SiteId,
        options: OptionMap,
        overrides: OverrideMap,
    ) -> Result<SiteSettings, SettingsError> {
        validation::validate_site_options(&options)?;
        validation::validate_overrides(&overrides)?;

        if self.sites.is_multisite() {
            let network = self.stored_network().await?;
            if !network.allow_site_overrides() {
                let keys: Vec<String> = overrides
                    .iter()
                    .filter(|(_, flag)| **flag)
                    .map(|(key, _)| key.clone())
                    .collect();
                if !keys.is_empty() {
                    return Err(SettingsError::OverridesNotAllowed { site_id, keys });
                }
            }
        }

        let mut settings = self
            .repo
            .find_site(site_id)
            .await
            .map_err(SettingsError::persistence)?
            .map(structured)
            .unwrap_or_default();

        let mut touched: Vec<String> = options.keys().cloned().collect();
        settings.options.extend(options);
        for (key, flag) in overrides {
            if flag {
                settings.overrides.insert(key.clone(), true);
            } else {
                settings.overrides.remove(&key);
            }
            if !touched.contains(&key) {
                touched.push(key);
            }
        }

        self.repo
            .save_site(site_id, &settings)
            .await
            .map_err(SettingsError::persistence)?;
        self.memo.write().remove(&site_id);

        tracing::info!(site_id, keys = ?touched, "Site options updated");
        self.publish(OptionsEvent::site_updated(site_id, touched)).await;
        Ok(settings)
    }

    /// Persist network values, merged into the stored record
    pub async fn update_network_options(
        &self,
        options: OptionMap,
    ) -> Result<NetworkSettings, SettingsError> {
        validation::validate_network_options(&options)?;

        let mut network = self.stored_network().await?;
        let touched: Vec<String> = options.keys().cloned().collect();
        network.options.extend(options);

        self.repo
            .save_network(&network)
            .await
            .map_err(SettingsError::persistence)?;
        self.invalidate(InvalidationScope::Network);

        tracing::info!(keys = ?touched, "Network options updated");
        self.publish(OptionsEvent::network_updated(touched)).await;
        Ok(network)
    }

    /// Copy the current network values into `site_id`
    pub async fn sync_network_to_site(
        &self,
        site_id: SiteId,
    ) -> Result<SiteSettings, SettingsError> {
        let network = self.stored_network().await?;
        self.sync_site_with(site_id, &network).await
    }

    /// Copy `network` into every non-overridden key of `site_id`
    ///
    /// A legacy flat record is migrated in the same write.
    pub async fn sync_site_with(
        &self,
        site_id: SiteId,
        network: &NetworkSettings,
    ) -> Result<SiteSettings, SettingsError> {
        let record = self
            .repo
            .find_site(site_id)
            .await
            .map_err(SettingsError::persistence)?;
        let migrated = matches!(record, Some(StoredSiteRecord::Legacy(_)));
        let mut settings = record.map(structured).unwrap_or_default();

        let mut synced = Vec::new();
        for key in KEYS {
            if settings.is_overridden(key) {
                continue;
            }
            let value = network
                .options
                .get(key)
                .cloned()
                .or_else(|| defaults::default_value(key));
            if let Some(value) = value {
                settings.options.insert(key.to_string(), value);
                synced.push(key.to_string());
            }
        }
        settings.last_sync = Some(chrono::Utc::now().timestamp());

        self.repo
            .save_site(site_id, &settings)
            .await
            .map_err(SettingsError::persistence)?;
        self.memo.write().remove(&site_id);

        if migrated {
            tracing::info!(
                site_id,
                overrides = settings.overrides.len(),
                "Migrated legacy site options"
            );
        }
        tracing::debug!(site_id, keys = synced.len(), "Site synced with network");
        self.publish(OptionsEvent::site_synced(site_id, synced)).await;
        Ok(settings)
    }

    /// Rewrite a legacy site record in the structured shape
    ///
    /// Returns whether a migration happened.
    pub async fn migrate_site(&self, site_id: SiteId) -> Result<bool, SettingsError> {
        let record = self
            .repo
            .find_site(site_id)
            .await
            .map_err(SettingsError::persistence)?;
        let Some(StoredSiteRecord::Legacy(flat)) = record else {
            return Ok(false);
        };
        let settings = migrate_legacy(&flat);
        self.repo
            .save_site(site_id, &settings)
            .await
            .map_err(SettingsError::persistence)?;
        self.memo.write().remove(&site_id);
        tracing::info!(site_id, "Migrated legacy site options");
        Ok(true)
    }

    /// Drop memoized options
    pub fn invalidate(&self, scope: InvalidationScope) {
        let mut memo = self.memo.write();
        match scope {
            InvalidationScope::CurrentSite => {
                memo.remove(&self.sites.current_site());
            }
            InvalidationScope::Network | InvalidationScope::All => memo.clear(),
        }
    }

    // ===== Lifecycle =====

    /// Write the default site record when none exists
    pub async fn ensure_site_defaults(&self, site_id: SiteId) -> Result<bool, SettingsError> {
        let existing = self
            .repo
            .find_site(site_id)
            .await
            .map_err(SettingsError::persistence)?;
        if existing.is_some() {
            return Ok(false);
        }
        let settings = SiteSettings {
            options: defaults::option_map(),
            ..SiteSettings::default()
        };
        self.repo
            .save_site(site_id, &settings)
            .await
            .map_err(SettingsError::persistence)?;
        self.memo.write().remove(&site_id);
        Ok(true)
    }

    /// Write the default network record when none exists
    pub async fn ensure_network_defaults(&self) -> Result<bool, SettingsError> {
        let existing = self
            .repo
            .find_network()
            .await
            .map_err(SettingsError::persistence)?;
        if existing.is_some() {
            return Ok(false);
        }
        self.repo
            .save_network(&NetworkSettings::new(defaults::network_option_map()))
            .await
            .map_err(SettingsError::persistence)?;
        self.invalidate(InvalidationScope::Network);
        Ok(true)
    }

    /// Delete every stored record; returns the number of site records removed
    pub async fn remove_all_data(&self) -> Result<usize, SettingsError> {
        let site_ids = self
            .repo
            .list_site_ids()
            .await
            .map_err(SettingsError::persistence)?;
        for site_id in &site_ids {
            self.repo
                .delete_site(*site_id)
                .await
                .map_err(SettingsError::persistence)?;
        }
        self.repo
            .delete_network()
            .await
            .map_err(SettingsError::persistence)?;
        self.invalidate(InvalidationScope::All);
        Ok(site_ids.len())
    }

    async fn publish(&self, event: OptionsEvent) {
        if let Err(e) = self.events.publish(event).await {
            tracing::warn!(error = %e, "Failed to publish options event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::FilterMode;
    use serde_json::json;

    fn site(options: &[(&str, serde_json::Value)], overrides: &[&str]) -> SiteSettings {
        SiteSettings {
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            overrides: overrides.iter().map(|k| (k.to_string(), true)).collect(),
            last_sync: None,
        }
    }

    fn network(options: &[(&str, serde_json::Value)]) -> NetworkSettings {
        NetworkSettings::new(
            options
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_enforcement_beats_override() {
        let site = site(&[("filter_mode", json!("markdown"))], &["filter_mode"]);
        let network = network(&[
            ("filter_mode", json!("strip_all")),
            ("enforce_network_settings", json!(true)),
        ]);
        let merged = merge_tiers(Some(&site), Some(&network));
        assert_eq!(merged["filter_mode"], json!("strip_all"));
    }

    #[test]
    fn test_override_beats_network_without_enforcement() {
        let site = site(&[("filter_mode", json!("markdown"))], &["filter_mode"]);
        let network = network(&[
            ("filter_mode", json!("strip_all")),
            ("enforce_network_settings", json!(false)),
        ]);
        let merged = merge_tiers(Some(&site), Some(&network));
        assert_eq!(merged["filter_mode"], json!("markdown"));
    }

    #[test]
    fn test_non_overridden_site_value_tracks_network() {
        let site = site(&[("filter_mode", json!("markdown"))], &[]);
        let network = network(&[("filter_mode", json!("custom"))]);
        let merged = merge_tiers(Some(&site), Some(&network));
        assert_eq!(merged["filter_mode"], json!("custom"));
    }

    #[test]
    fn test_missing_everywhere_resolves_to_default() {
        let merged = merge_tiers(Some(&SiteSettings::default()), Some(&NetworkSettings::default()));
        assert_eq!(merged, defaults::option_map());
        assert_eq!(merge_tiers(None, None), defaults::option_map());
    }

    #[test]
    fn test_disallowed_overrides_are_ignored() {
        let site = site(&[("cache_ttl", json!(120))], &["cache_ttl"]);
        let network = network(&[("allow_site_overrides", json!(false))]);
        let merged = merge_tiers(Some(&site), Some(&network));
        assert_eq!(merged["cache_ttl"], json!(3600));
    }

    #[test]
    fn test_single_site_lays_site_over_defaults() {
        let site = site(&[("filter_mode", json!("markdown")), ("bogus", json!(1))], &[]);
        let merged = merge_tiers(Some(&site), None);
        assert_eq!(merged["filter_mode"], json!("markdown"));
        assert!(!merged.contains_key("bogus"));
        assert_eq!(
            FilterOptions::from_map(&merged).filter_mode,
            FilterMode::Markdown
        );
    }

    #[test]
    fn test_legacy_migration_marks_divergent_keys() {
        let mut flat = OptionMap::new();
        flat.insert("filter_mode".into(), json!("markdown"));
        flat.insert("cache_ttl".into(), json!(3600));
        let settings = migrate_legacy(&flat);
        assert_eq!(settings.overrides.len(), 1);
        assert!(settings.is_overridden("filter_mode"));
        assert!(!settings.is_overridden("cache_ttl"));
        assert_eq!(settings.options["filter_mode"], json!("markdown"));
        assert_eq!(settings.last_sync, None);
    }
}
