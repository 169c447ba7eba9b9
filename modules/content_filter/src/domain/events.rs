//! Domain events for the content filter
//!
//! Events are published after every successful options write or sync:
//! - `SiteOptionsUpdated` / `NetworkOptionsUpdated`: an admin changed a tier
//! - `SiteSynced`: the synchronizer pushed network values into a site
//! - `CacheCleared`: transforms were dropped on request
//!
//! The default publisher uses them to invalidate the transform cache.

use super::transform::TransformCache;
use crate::contract::{PostId, SiteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Domain event types for options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum OptionsEvent {
    /// Site values or override flags changed
    SiteOptionsUpdated(SiteEvent),
    /// Network values changed
    NetworkOptionsUpdated(NetworkEvent),
    /// Network values were synced into a site
    SiteSynced(SiteEvent),
    /// Cached transforms were dropped
    CacheCleared(CacheClearedEvent),
}

/// Event data for site-scoped changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEvent {
    pub site_id: SiteId,
    /// Keys touched by the change
    pub keys: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event data for network changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEvent {
    pub keys: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Event data for cache clears
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheClearedEvent {
    /// `None` for a full clear
    pub post_id: Option<PostId>,
    pub removed: usize,
    pub timestamp: DateTime<Utc>,
}

impl OptionsEvent {
    pub fn site_updated(site_id: SiteId, keys: Vec<String>) -> Self {
        OptionsEvent::SiteOptionsUpdated(SiteEvent {
            site_id,
            keys,
            timestamp: Utc::now(),
        })
    }

    pub fn network_updated(keys: Vec<String>) -> Self {
        OptionsEvent::NetworkOptionsUpdated(NetworkEvent {
            keys,
            timestamp: Utc::now(),
        })
    }

    pub fn site_synced(site_id: SiteId, keys: Vec<String>) -> Self {
        OptionsEvent::SiteSynced(SiteEvent {
            site_id,
            keys,
            timestamp: Utc::now(),
        })
    }

    pub fn cache_cleared(post_id: Option<PostId>, removed: usize) -> Self {
        OptionsEvent::CacheCleared(CacheClearedEvent {
            post_id,
            removed,
            timestamp: Utc::now(),
        })
    }

    /// Whether cached transforms may be stale after this event
    pub fn invalidates_transforms(&self) -> bool {
        !matches!(self, OptionsEvent::CacheCleared(_))
    }
}

/// Event publisher trait for domain events
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event; failures are logged by the caller, never propagated
    async fn publish(&self, event: OptionsEvent) -> anyhow::Result<()>;
}

/// No-op event publisher for testing or when events are disabled
pub struct NoOpEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: OptionsEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Publisher that drops cached transforms whenever options change
pub struct CacheInvalidatingPublisher {
    cache: Arc<TransformCache>,
}

impl CacheInvalidatingPublisher {
    pub fn new(cache: Arc<TransformCache>) -> Self {
        Self { cache }
    }
}

#[async_trait::async_trait]
impl EventPublisher for CacheInvalidatingPublisher {
    async fn publish(&self, event: OptionsEvent) -> anyhow::Result<()> {
        if event.invalidates_transforms() {
            let removed = self.cache.clear_all();
            tracing::debug!(removed, ?event, "Transform cache invalidated by options change");
        }
        Ok(())
    }
}
