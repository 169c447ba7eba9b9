//! Host integration seams
//!
//! The CMS around this module is reached only through these traits: tenant
//! context, post metadata, the two field-resolution pipelines and a memory
//! probe. Tests and adapters provide the implementations.

use super::interception::HookSignature;
use super::transform::RequestScope;
use crate::contract::{ContentField, PostId, SiteId};
use async_trait::async_trait;
use std::sync::Arc;

/// Multi-tenant execution context of the host
///
/// Switching is not reentrant-safe: callers must not interleave two
/// switching operations in one process.
#[async_trait]
pub trait SiteContext: Send + Sync {
    /// Whether a network of sites is active
    fn is_multisite(&self) -> bool;

    /// Site the current request executes in
    fn current_site(&self) -> SiteId;

    /// Enter another site's context; pushes the previous one
    fn switch_to_site(&self, site_id: SiteId) -> anyhow::Result<()>;

    /// Pop back to the context active before the last switch
    fn restore_current_site(&self);

    /// Every site of the network
    async fn list_sites(&self) -> anyhow::Result<Vec<SiteId>>;
}

/// Scoped tenant switch, restored on drop
pub struct SiteSwitch<'a> {
    context: &'a dyn SiteContext,
    site_id: SiteId,
}

impl<'a> SiteSwitch<'a> {
    pub fn enter(context: &'a dyn SiteContext, site_id: SiteId) -> anyhow::Result<Self> {
        context.switch_to_site(site_id)?;
        Ok(Self { context, site_id })
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }
}

impl Drop for SiteSwitch<'_> {
    fn drop(&mut self) {
        self.context.restore_current_site();
    }
}

/// Post metadata lookups
#[async_trait]
pub trait PostLookup: Send + Sync {
    /// Post type slug of a post, if the post exists
    async fn post_type(&self, post_id: PostId) -> anyhow::Result<Option<String>>;
}

/// Callback bound into a host field pipeline
#[async_trait]
pub trait FieldHook: Send + Sync {
    /// Rewrite a field value; must never fail
    async fn apply(&self, field: ContentField, scope: &RequestScope) -> serde_json::Value;
}

/// Field-level registration mechanism of a host pipeline
pub trait FieldPipeline: Send + Sync {
    /// Attach `hook` under `signature`
    fn attach(&self, signature: &HookSignature, hook: Arc<dyn FieldHook>) -> anyhow::Result<()>;

    /// Remove the hook attached under `signature`
    fn detach(&self, signature: &HookSignature) -> anyhow::Result<()>;
}

/// GraphQL type exposed by the GraphQL engine for a post type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphqlType {
    /// Schema type name, e.g. `Post`
    pub type_name: String,
    /// Underlying post type slug, e.g. `post`
    pub post_type: String,
}

/// GraphQL engine of the host
#[async_trait]
pub trait GraphqlHost: FieldPipeline {
    /// Whether the engine is loaded in this process
    fn is_loaded(&self) -> bool;

    /// Engine version, when it reports one
    fn version(&self) -> Option<String>;

    /// Types the engine exposes for post types
    async fn allowed_types(&self) -> anyhow::Result<Vec<GraphqlType>>;
}

/// REST response pipeline of the host
#[async_trait]
pub trait RestHost: FieldPipeline {
    /// Public post types served by REST endpoints
    async fn public_post_types(&self) -> anyhow::Result<Vec<String>>;
}

/// Memory reading used for registration admission control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    pub fn fraction(&self) -> f64 {
        if self.limit_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.limit_bytes as f64
    }
}

/// Advisory memory probe
pub trait MemoryProbe: Send + Sync {
    /// Current reading; `None` when the platform cannot report
    fn sample(&self) -> Option<MemorySample>;
}

/// Probe that never reports, disabling admission control
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        None
    }
}

/// Everything the host provides at module init
#[derive(Clone)]
pub struct HostBindings {
    pub options: Arc<dyn super::repository::OptionsRepository>,
    pub sites: Arc<dyn SiteContext>,
    pub posts: Arc<dyn PostLookup>,
    pub graphql: Option<Arc<dyn GraphqlHost>>,
    pub rest: Arc<dyn RestHost>,
    pub memory: Arc<dyn MemoryProbe>,
}
