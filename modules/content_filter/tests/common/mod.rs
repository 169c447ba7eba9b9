//! In-memory host doubles shared by the integration tests

#![allow(dead_code)]

use anyhow::bail;
use async_trait::async_trait;
use content_filter::config::Config;
use content_filter::contract::*;
use content_filter::domain::transform::HtmlTransformer;
use content_filter::domain::*;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

// ===== Options repository =====

#[derive(Default)]
pub struct MockOptionsRepo {
    sites: RwLock<HashMap<SiteId, StoredSiteRecord>>,
    network: RwLock<Option<NetworkSettings>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

impl MockOptionsRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_site(&self, site_id: SiteId, settings: SiteSettings) {
        self.sites
            .write()
            .insert(site_id, StoredSiteRecord::Structured(settings));
    }

    pub fn put_legacy(&self, site_id: SiteId, flat: OptionMap) {
        self.sites
            .write()
            .insert(site_id, StoredSiteRecord::Legacy(flat));
    }

    pub fn put_network(&self, options: OptionMap) {
        *self.network.write() = Some(NetworkSettings::new(options));
    }

    pub fn site(&self, site_id: SiteId) -> Option<StoredSiteRecord> {
        self.sites.read().get(&site_id).cloned()
    }

    /// Structured record of a site; panics on a legacy or missing record
    pub fn structured(&self, site_id: SiteId) -> SiteSettings {
        match self.site(site_id) {
            Some(StoredSiteRecord::Structured(settings)) => settings,
            other => panic!("site {site_id} has no structured record: {other:?}"),
        }
    }

    pub fn network(&self) -> Option<NetworkSettings> {
        self.network.read().clone()
    }

    pub fn site_count(&self) -> usize {
        self.sites.read().len()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_read(&self) -> anyhow::Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("options table unavailable");
        }
        Ok(())
    }

    fn check_write(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("options table is read-only");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl OptionsRepository for MockOptionsRepo {
    async fn find_site(&self, site_id: SiteId) -> anyhow::Result<Option<StoredSiteRecord>> {
        self.check_read()?;
        Ok(self.site(site_id))
    }

    async fn save_site(&self, site_id: SiteId, settings: &SiteSettings) -> anyhow::Result<()> {
        self.check_write()?;
        self.put_site(site_id, settings.clone());
        Ok(())
    }

    async fn delete_site(&self, site_id: SiteId) -> anyhow::Result<()> {
        self.check_write()?;
        self.sites.write().remove(&site_id);
        Ok(())
    }

    async fn find_network(&self) -> anyhow::Result<Option<NetworkSettings>> {
        self.check_read()?;
        Ok(self.network())
    }

    async fn save_network(&self, settings: &NetworkSettings) -> anyhow::Result<()> {
        self.check_write()?;
        *self.network.write() = Some(settings.clone());
        Ok(())
    }

    async fn delete_network(&self) -> anyhow::Result<()> {
        self.check_write()?;
        *self.network.write() = None;
        Ok(())
    }

    async fn list_site_ids(&self) -> anyhow::Result<Vec<SiteId>> {
        self.check_read()?;
        let mut ids: Vec<SiteId> = self.sites.read().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

// ===== Tenant context =====

pub struct MockSites {
    multisite: bool,
    /// Context stack; the last entry is the current site
    stack: Mutex<Vec<SiteId>>,
    sites: Vec<SiteId>,
    unreachable: RwLock<HashSet<SiteId>>,
    visited: Mutex<Vec<SiteId>>,
    list_calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl MockSites {
    pub fn single(site_id: SiteId) -> Self {
        Self::build(false, site_id, vec![site_id])
    }

    pub fn network(sites: Vec<SiteId>) -> Self {
        let main = sites.first().copied().unwrap_or(1);
        Self::build(true, main, sites)
    }

    fn build(multisite: bool, current: SiteId, sites: Vec<SiteId>) -> Self {
        Self {
            multisite,
            stack: Mutex::new(vec![current]),
            sites,
            unreachable: RwLock::new(HashSet::new()),
            visited: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Switching into `site_id` fails
    pub fn make_unreachable(&self, site_id: SiteId) {
        self.unreachable.write().insert(site_id);
    }

    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn visited(&self) -> Vec<SiteId> {
        self.visited.lock().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Make `list_sites` wait until the returned notify fires
    pub fn hold_listing(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }
}

#[async_trait]
impl SiteContext for MockSites {
    fn is_multisite(&self) -> bool {
        self.multisite
    }

    fn current_site(&self) -> SiteId {
        self.stack.lock().last().copied().unwrap_or(1)
    }

    fn switch_to_site(&self, site_id: SiteId) -> anyhow::Result<()> {
        if self.unreachable.read().contains(&site_id) {
            bail!("site {site_id} is archived");
        }
        self.stack.lock().push(site_id);
        self.visited.lock().push(site_id);
        Ok(())
    }

    fn restore_current_site(&self) {
        let mut stack = self.stack.lock();
        if stack.len() > 1 {
            stack.pop();
        }
    }

    async fn list_sites(&self) -> anyhow::Result<Vec<SiteId>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.sites.clone())
    }
}

// ===== Posts =====

#[derive(Default)]
pub struct MockPosts {
    types: RwLock<HashMap<PostId, String>>,
}

impl MockPosts {
    pub fn insert(&self, post_id: PostId, post_type: &str) {
        self.types.write().insert(post_id, post_type.to_string());
    }
}

#[async_trait]
impl PostLookup for MockPosts {
    async fn post_type(&self, post_id: PostId) -> anyhow::Result<Option<String>> {
        if post_id < 0 {
            bail!("post lookup failed");
        }
        Ok(self.types.read().get(&post_id).cloned())
    }
}

// ===== Field pipelines =====

/// Hook storage shared by both host pipelines; duplicates are kept so
/// double registration would be visible
#[derive(Default)]
pub struct MockPipeline {
    hooks: Mutex<Vec<(HookSignature, Arc<dyn FieldHook>)>>,
    failing_types: RwLock<HashSet<String>>,
    fail_enumeration: AtomicBool,
    fail_detach: AtomicBool,
}

impl MockPipeline {
    pub fn fail_type(&self, type_name: &str) {
        self.failing_types.write().insert(type_name.to_string());
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.fail_enumeration.store(fail, Ordering::SeqCst);
    }

    pub fn fail_detach(&self, fail: bool) {
        self.fail_detach.store(fail, Ordering::SeqCst);
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .hooks
            .lock()
            .iter()
            .map(|(signature, _)| signature.type_name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn hook(&self, type_name: &str, field: ContentFieldName) -> Option<Arc<dyn FieldHook>> {
        self.hooks
            .lock()
            .iter()
            .find(|(signature, _)| signature.type_name == type_name && signature.field == field)
            .map(|(_, hook)| hook.clone())
    }

    fn check_enumeration(&self) -> anyhow::Result<()> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            bail!("type registry not ready");
        }
        Ok(())
    }
}

impl FieldPipeline for MockPipeline {
    fn attach(&self, signature: &HookSignature, hook: Arc<dyn FieldHook>) -> anyhow::Result<()> {
        if self.failing_types.read().contains(&signature.type_name) {
            bail!("type {} rejected the field hook", signature.type_name);
        }
        self.hooks.lock().push((signature.clone(), hook));
        Ok(())
    }

    fn detach(&self, signature: &HookSignature) -> anyhow::Result<()> {
        if self.fail_detach.load(Ordering::SeqCst) {
            bail!("hook {} is locked", signature.type_name);
        }
        self.hooks.lock().retain(|(s, _)| s != signature);
        Ok(())
    }
}

pub struct MockGraphql {
    pub pipeline: MockPipeline,
    loaded: bool,
    version: Option<String>,
    types: Vec<GraphqlType>,
}

impl MockGraphql {
    pub fn new(version: Option<&str>, types: &[(&str, &str)]) -> Self {
        Self {
            pipeline: MockPipeline::default(),
            loaded: true,
            version: version.map(str::to_string),
            types: types
                .iter()
                .map(|(type_name, post_type)| GraphqlType {
                    type_name: type_name.to_string(),
                    post_type: post_type.to_string(),
                })
                .collect(),
        }
    }

    pub fn standard() -> Self {
        Self::new(
            Some("1.14.0"),
            &[("Post", "post"), ("Page", "page"), ("Product", "product")],
        )
    }

    pub fn unloaded() -> Self {
        Self {
            loaded: false,
            ..Self::standard()
        }
    }
}

impl FieldPipeline for MockGraphql {
    fn attach(&self, signature: &HookSignature, hook: Arc<dyn FieldHook>) -> anyhow::Result<()> {
        self.pipeline.attach(signature, hook)
    }

    fn detach(&self, signature: &HookSignature) -> anyhow::Result<()> {
        self.pipeline.detach(signature)
    }
}

#[async_trait]
impl GraphqlHost for MockGraphql {
    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    async fn allowed_types(&self) -> anyhow::Result<Vec<GraphqlType>> {
        self.pipeline.check_enumeration()?;
        Ok(self.types.clone())
    }
}

pub struct MockRest {
    pub pipeline: MockPipeline,
    types: Vec<String>,
}

impl MockRest {
    pub fn new(types: &[&str]) -> Self {
        Self {
            pipeline: MockPipeline::default(),
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn standard() -> Self {
        Self::new(&["post", "page", "attachment"])
    }
}

impl FieldPipeline for MockRest {
    fn attach(&self, signature: &HookSignature, hook: Arc<dyn FieldHook>) -> anyhow::Result<()> {
        self.pipeline.attach(signature, hook)
    }

    fn detach(&self, signature: &HookSignature) -> anyhow::Result<()> {
        self.pipeline.detach(signature)
    }
}

#[async_trait]
impl RestHost for MockRest {
    async fn public_post_types(&self) -> anyhow::Result<Vec<String>> {
        self.pipeline.check_enumeration()?;
        Ok(self.types.clone())
    }
}

// ===== Memory =====

#[derive(Default)]
pub struct MockMemory {
    sample: Mutex<Option<MemorySample>>,
}

impl MockMemory {
    pub fn set(&self, used_bytes: u64, limit_bytes: u64) {
        *self.sample.lock() = Some(MemorySample {
            used_bytes,
            limit_bytes,
        });
    }
}

impl MemoryProbe for MockMemory {
    fn sample(&self) -> Option<MemorySample> {
        *self.sample.lock()
    }
}

// ===== Transformers =====

/// Regex transformer that counts its invocations
#[derive(Default)]
pub struct CountingTransformer {
    calls: AtomicUsize,
}

impl CountingTransformer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentTransformer for CountingTransformer {
    fn transform(
        &self,
        raw: &str,
        mode: FilterMode,
        options: &FilterOptions,
    ) -> Result<String, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HtmlTransformer.transform(raw, mode, options)
    }
}

pub struct FailingTransformer;

impl ContentTransformer for FailingTransformer {
    fn transform(
        &self,
        _raw: &str,
        _mode: FilterMode,
        _options: &FilterOptions,
    ) -> Result<String, TransformError> {
        Err(TransformError::Malformed("unbalanced markup".to_string()))
    }
}

pub struct PanickingTransformer;

impl ContentTransformer for PanickingTransformer {
    fn transform(
        &self,
        _raw: &str,
        _mode: FilterMode,
        _options: &FilterOptions,
    ) -> Result<String, TransformError> {
        panic!("markdown converter hit an unexpected token")
    }
}

// ===== Host assembly =====

pub struct TestHost {
    pub repo: Arc<MockOptionsRepo>,
    pub sites: Arc<MockSites>,
    pub posts: Arc<MockPosts>,
    pub graphql: Option<Arc<MockGraphql>>,
    pub rest: Arc<MockRest>,
    pub memory: Arc<MockMemory>,
}

impl TestHost {
    /// Single site `1` with both surfaces and posts 10 (post), 11 (page), 12 (product)
    pub fn single_site() -> Self {
        Self::with_sites(MockSites::single(1))
    }

    /// Network whose first site is the current one
    pub fn network(sites: Vec<SiteId>) -> Self {
        Self::with_sites(MockSites::network(sites))
    }

    fn with_sites(sites: MockSites) -> Self {
        let posts = MockPosts::default();
        posts.insert(10, "post");
        posts.insert(11, "page");
        posts.insert(12, "product");
        Self {
            repo: Arc::new(MockOptionsRepo::new()),
            sites: Arc::new(sites),
            posts: Arc::new(posts),
            graphql: Some(Arc::new(MockGraphql::standard())),
            rest: Arc::new(MockRest::standard()),
            memory: Arc::new(MockMemory::default()),
        }
    }

    pub fn with_graphql(mut self, graphql: Option<MockGraphql>) -> Self {
        self.graphql = graphql.map(Arc::new);
        self
    }

    pub fn with_rest(mut self, rest: MockRest) -> Self {
        self.rest = Arc::new(rest);
        self
    }

    pub fn bindings(&self) -> HostBindings {
        HostBindings {
            options: self.repo.clone(),
            sites: self.sites.clone(),
            posts: self.posts.clone(),
            graphql: self
                .graphql
                .clone()
                .map(|graphql| graphql as Arc<dyn GraphqlHost>),
            rest: self.rest.clone(),
            memory: self.memory.clone(),
        }
    }

    pub fn service(&self) -> Arc<Service> {
        self.service_with(&Config::default())
    }

    pub fn service_with(&self, config: &Config) -> Arc<Service> {
        Arc::new(Service::new(self.bindings(), config))
    }

    pub fn service_with_transformer(
        &self,
        config: &Config,
        transformer: Arc<dyn ContentTransformer>,
    ) -> Arc<Service> {
        Arc::new(Service::with_transformer(self.bindings(), config, transformer))
    }

    pub fn graphql_pipeline(&self) -> &MockPipeline {
        match &self.graphql {
            Some(graphql) => &graphql.pipeline,
            None => panic!("host has no GraphQL engine"),
        }
    }
}

/// Option map from literal pairs
pub fn options(pairs: &[(&str, serde_json::Value)]) -> OptionMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Override map flagging `keys`
pub fn overrides(keys: &[&str]) -> OverrideMap {
    keys.iter().map(|k| (k.to_string(), true)).collect()
}

pub fn field(post_id: PostId, name: ContentFieldName, raw: serde_json::Value) -> ContentField {
    ContentField {
        post_id,
        field: name,
        raw,
    }
}
