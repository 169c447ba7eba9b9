//! Repository traits for option persistence
//!
//! The host's key-value options store sits behind this trait.
//! Implementations are in infra/storage/repositories.rs

use crate::contract::{NetworkSettings, SiteId, SiteSettings, StoredSiteRecord};
use anyhow::Result;
use async_trait::async_trait;

/// Repository for site and network option records
#[async_trait]
pub trait OptionsRepository: Send + Sync {
    /// Find a site record, in whatever shape it was stored
    async fn find_site(&self, site_id: SiteId) -> Result<Option<StoredSiteRecord>>;

    /// Create or replace a site record
    async fn save_site(&self, site_id: SiteId, settings: &SiteSettings) -> Result<()>;

    /// Delete a site record
    async fn delete_site(&self, site_id: SiteId) -> Result<()>;

    /// Find the network record
    async fn find_network(&self) -> Result<Option<NetworkSettings>>;

    /// Create or replace the network record
    async fn save_network(&self, settings: &NetworkSettings) -> Result<()>;

    /// Delete the network record
    async fn delete_network(&self) -> Result<()>;

    /// Sites that have a stored record
    async fn list_site_ids(&self) -> Result<Vec<SiteId>>;
}
