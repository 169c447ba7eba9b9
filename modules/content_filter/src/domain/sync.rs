//! Network-to-sites synchronizer
//!
//! Visits every site of the network inside that site's context and copies
//! the network values into keys the site does not override. One sync runs at
//! a time per process: tenant switching is not reentrant.

use super::host::{SiteContext, SiteSwitch};
use super::resolver::SettingsResolver;
use crate::contract::{NetworkSettings, SettingsError, SiteId, SyncReport};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct SettingsSynchronizer {
    resolver: Arc<SettingsResolver>,
    sites: Arc<dyn SiteContext>,
    flight: Mutex<()>,
}

impl SettingsSynchronizer {
    pub fn new(resolver: Arc<SettingsResolver>, sites: Arc<dyn SiteContext>) -> Self {
        Self {
            resolver,
            sites,
            flight: Mutex::new(()),
        }
    }

    /// Sync every site against the stored network record
    pub async fn sync_all_sites(&self) -> Result<SyncReport, SettingsError> {
        let network = self.resolver.stored_network().await?;
        self.sync_all_sites_with(&network).await
    }

    /// Sync every site against `network`
    ///
    /// Individual site failures are collected, never abort the run. Outside a
    /// network the current site's record is only migrated to the structured
    /// shape.
    pub async fn sync_all_sites_with(
        &self,
        network: &NetworkSettings,
    ) -> Result<SyncReport, SettingsError> {
        let Ok(_flight) = self.flight.try_lock() else {
            return Err(SettingsError::SyncInProgress);
        };

        if !self.sites.is_multisite() {
            return Ok(self.migrate_current_site().await);
        }

        let site_ids = self
            .sites
            .list_sites()
            .await
            .map_err(SettingsError::persistence)?;
        let batch_size = self.resolver.current_options().await.filter.batch_size.max(1) as usize;

        let mut report = SyncReport::default();
        for batch in site_ids.chunks(batch_size) {
            for &site_id in batch {
                match self.sync_one(site_id, network).await {
                    Ok(()) => report.synced_count += 1,
                    Err(e) => {
                        tracing::warn!(site_id, error = %e, "Site sync failed");
                        report.failures.push(site_id);
                    }
                }
            }
            tokio::task::yield_now().await;
        }

        tracing::info!(
            synced = report.synced_count,
            failed = report.failures.len(),
            "Network options synced to sites"
        );
        Ok(report)
    }

    async fn sync_one(&self, site_id: SiteId, network: &NetworkSettings) -> anyhow::Result<()> {
        let switch = SiteSwitch::enter(self.sites.as_ref(), site_id)?;
        self.resolver
            .sync_site_with(switch.site_id(), network)
            .await?;
        Ok(())
    }

    async fn migrate_current_site(&self) -> SyncReport {
        let site_id = self.sites.current_site();
        match self.resolver.migrate_site(site_id).await {
            Ok(_) => SyncReport {
                synced_count: 1,
                failures: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(site_id, error = %e, "Site options migration failed");
                SyncReport {
                    synced_count: 0,
                    failures: vec![site_id],
                }
            }
        }
    }
}
