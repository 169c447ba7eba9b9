//! Field interception layer
//!
//! Each API surface owns a [`HookManager`] that enumerates eligible types,
//! attaches one [`FieldInterceptor`] per (type, field) into the host pipeline
//! and tears everything down again on deactivation. Registration is tracked by
//! [`HookSignature`] so repeated passes never attach a hook twice.

pub mod graphql;
pub mod rest;

pub use graphql::GraphqlInterceptor;
pub use rest::RestInterceptor;

use super::host::{FieldHook, FieldPipeline, MemoryProbe, MemorySample, PostLookup};
use super::resolver::SettingsResolver;
use super::transform::{RequestScope, TransformEngine};
use crate::config::Config;
use crate::contract::{
    ApiSurface, ContentField, ContentFieldName, FilterOptions, RegistrationReport,
    RegistrationState,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Identity of one attached hook
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookSignature {
    pub surface: ApiSurface,
    pub type_name: String,
    pub field: ContentFieldName,
    pub priority: i32,
}

/// Per-type registration failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Failed to attach {field} hook on {type_name}: {reason}")]
    Attach {
        type_name: String,
        field: ContentFieldName,
        reason: String,
    },

    #[error("Hooks are being removed from the {0} surface")]
    Unregistering(ApiSurface),
}

/// Registration capability of one API surface
#[async_trait]
pub trait HookManager: Send + Sync {
    fn surface(&self) -> ApiSurface;

    /// Whether the target API is present and enabled
    async fn should_activate(&self) -> bool;

    /// Eligible type names, capped at the per-pass ceiling; empty on enumeration failure
    async fn discover_eligible_types(&self) -> Vec<String>;

    /// Attach hooks on one type; returns the number of hooks newly attached
    async fn register(&self, type_name: &str) -> Result<usize, RegistrationError>;

    /// Full registration pass over every eligible type
    async fn register_all(&self) -> RegistrationReport;

    /// Remove every hook this manager attached; returns the number removed
    fn deregister(&self) -> usize;

    /// Rewrite one field value
    async fn intercept(&self, field: ContentField, scope: &RequestScope) -> Value;

    fn state(&self) -> RegistrationState;

    fn hook_count(&self) -> usize;
}

/// Fields a pass attaches to, given the current options
pub fn target_fields(options: &FilterOptions) -> Vec<ContentFieldName> {
    let mut fields = vec![ContentFieldName::Content];
    if options.apply_to_excerpt {
        fields.push(ContentFieldName::Excerpt);
    }
    fields
}

/// Hook bound into a host pipeline for one surface
pub struct FieldInterceptor {
    surface: ApiSurface,
    resolver: Arc<SettingsResolver>,
    engine: Arc<TransformEngine>,
    posts: Arc<dyn PostLookup>,
}

impl FieldInterceptor {
    pub fn new(
        surface: ApiSurface,
        resolver: Arc<SettingsResolver>,
        engine: Arc<TransformEngine>,
        posts: Arc<dyn PostLookup>,
    ) -> Self {
        Self {
            surface,
            resolver,
            engine,
            posts,
        }
    }

    fn surface_enabled(&self, options: &FilterOptions) -> bool {
        match self.surface {
            ApiSurface::Graphql => options.apply_to_graphql,
            ApiSurface::Rest => options.apply_to_rest_api,
        }
    }
}

#[async_trait]
impl FieldHook for FieldInterceptor {
    async fn apply(&self, field: ContentField, scope: &RequestScope) -> Value {
        let effective = self.resolver.current_options().await;
        let options = &effective.filter;
        if !self.surface_enabled(options) || !options.applies_to(field.field) {
            return field.raw;
        }

        let post_type = match self.posts.post_type(field.post_id).await {
            Ok(Some(post_type)) => post_type,
            Ok(None) => return field.raw,
            Err(e) => {
                tracing::debug!(post_id = field.post_id, error = %e, "Post type lookup failed");
                return field.raw;
            }
        };
        if !options.is_post_type_enabled(&post_type) {
            return field.raw;
        }

        let post_id = field.post_id;
        rewrite_value(field.raw, |raw| {
            self.engine.transform_field(Some(post_id), raw, options, scope)
        })
    }
}

/// Apply `rewrite` to a string value or to the `rendered` member of an object
fn rewrite_value(value: Value, rewrite: impl FnOnce(&str) -> String) -> Value {
    match value {
        Value::String(raw) => Value::String(rewrite(&raw)),
        Value::Object(mut object) => {
            if let Some(Value::String(rendered)) = object.get("rendered") {
                let rewritten = rewrite(rendered);
                object.insert("rendered".to_string(), Value::String(rewritten));
            }
            Value::Object(object)
        }
        other => other,
    }
}

/// Type ceiling and memory budget applied to every pass
pub struct AdmissionControl {
    max_types: usize,
    budget_fraction: f64,
    probe: Arc<dyn MemoryProbe>,
}

impl AdmissionControl {
    pub fn new(config: &Config, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            max_types: config.max_types_per_pass,
            budget_fraction: config.memory_budget_fraction,
            probe,
        }
    }

    /// Split `types` at the ceiling into (kept, dropped)
    pub fn cap(&self, surface: ApiSurface, mut types: Vec<String>) -> (Vec<String>, Vec<String>) {
        if types.len() <= self.max_types {
            return (types, Vec::new());
        }
        let dropped = types.split_off(self.max_types);
        tracing::warn!(
            %surface,
            ceiling = self.max_types,
            dropped = dropped.len(),
            "Type ceiling reached; truncating registration"
        );
        (types, dropped)
    }

    /// Reading that exceeds the budget, if any
    pub fn over_budget(&self) -> Option<MemorySample> {
        let sample = self.probe.sample()?;
        (sample.fraction() >= self.budget_fraction).then_some(sample)
    }
}

#[derive(Debug)]
struct RegistrarInner {
    state: RegistrationState,
    signatures: HashSet<HookSignature>,
}

/// Signature bookkeeping and state machine of one surface
pub struct Registrar {
    surface: ApiSurface,
    priority: i32,
    inner: Mutex<RegistrarInner>,
}

impl Registrar {
    pub fn new(surface: ApiSurface, priority: i32) -> Self {
        Self {
            surface,
            priority,
            inner: Mutex::new(RegistrarInner {
                state: RegistrationState::Unregistered,
                signatures: HashSet::new(),
            }),
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.inner.lock().state
    }

    pub fn hook_count(&self) -> usize {
        self.inner.lock().signatures.len()
    }

    pub fn signature(&self, type_name: &str, field: ContentFieldName) -> HookSignature {
        HookSignature {
            surface: self.surface,
            type_name: type_name.to_string(),
            field,
            priority: self.priority,
        }
    }

    /// `Unregistered -> Registering`; `false` when a pass already ran or is running
    pub fn begin_pass(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != RegistrationState::Unregistered {
            tracing::debug!(surface = %self.surface, state = ?inner.state, "Registration pass skipped");
            return false;
        }
        inner.state = RegistrationState::Registering;
        true
    }

    /// Attach hooks for `fields` on `type_name`, skipping known signatures
    pub fn attach<P: FieldPipeline + ?Sized>(
        &self,
        pipeline: &P,
        type_name: &str,
        fields: &[ContentFieldName],
        hook: &Arc<dyn FieldHook>,
    ) -> Result<usize, RegistrationError> {
        let mut inner = self.inner.lock();
        if inner.state == RegistrationState::Unregistering {
            return Err(RegistrationError::Unregistering(self.surface));
        }

        let mut attached = 0;
        for &field in fields {
            let signature = self.signature(type_name, field);
            if inner.signatures.contains(&signature) {
                continue;
            }
            pipeline
                .attach(&signature, hook.clone())
                .map_err(|e| RegistrationError::Attach {
                    type_name: type_name.to_string(),
                    field,
                    reason: e.to_string(),
                })?;
            tracing::debug!(surface = %self.surface, type_name, %field, "Field hook attached");
            inner.signatures.insert(signature);
            attached += 1;
        }

        if attached > 0 && inner.state == RegistrationState::Unregistered {
            inner.state = RegistrationState::Registered;
        }
        Ok(attached)
    }

    /// Body of a pass started with [`Registrar::begin_pass`]
    pub fn run_pass<P: FieldPipeline + ?Sized>(
        &self,
        pipeline: &P,
        types: anyhow::Result<Vec<String>>,
        fields: &[ContentFieldName],
        hook: &Arc<dyn FieldHook>,
        admission: &AdmissionControl,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::new(self.surface);
        let types = match types {
            Ok(types) => types,
            Err(e) => {
                tracing::warn!(surface = %self.surface, error = %e, "Type enumeration failed; registering nothing");
                self.finish_pass();
                return report;
            }
        };

        let (kept, dropped) = admission.cap(self.surface, types);
        report.skipped = dropped;

        for (index, type_name) in kept.iter().enumerate() {
            if let Some(sample) = admission.over_budget() {
                tracing::warn!(
                    surface = %self.surface,
                    used_bytes = sample.used_bytes,
                    limit_bytes = sample.limit_bytes,
                    remaining = kept.len() - index,
                    "Memory budget exceeded; truncating registration"
                );
                report.skipped.extend(kept[index..].iter().cloned());
                break;
            }
            match self.attach(pipeline, type_name, fields, hook) {
                Ok(0) => {}
                Ok(_) => report.registered.push(type_name.clone()),
                Err(e) => {
                    tracing::warn!(surface = %self.surface, type_name = %type_name, error = %e, "Type registration failed");
                    report.failed.push((type_name.clone(), e.to_string()));
                }
            }
        }

        self.finish_pass();
        tracing::info!(
            surface = %self.surface,
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Field hook registration finished"
        );
        report
    }

    fn finish_pass(&self) {
        let mut inner = self.inner.lock();
        inner.state = if inner.signatures.is_empty() {
            RegistrationState::Unregistered
        } else {
            RegistrationState::Registered
        };
    }

    /// Detach every tracked signature
    ///
    /// Signatures whose detach fails stay tracked, and the registrar stays
    /// `Registered` while any remain, so a later pass never attaches them twice.
    pub fn detach_all<P: FieldPipeline + ?Sized>(&self, pipeline: &P) -> usize {
        let mut inner = self.inner.lock();
        if inner.state == RegistrationState::Registering {
            tracing::debug!(surface = %self.surface, "Deregistration skipped during a registration pass");
            return 0;
        }
        inner.state = RegistrationState::Unregistering;

        let mut removed = 0;
        for signature in std::mem::take(&mut inner.signatures) {
            match pipeline.detach(&signature) {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(
                        surface = %self.surface,
                        type_name = %signature.type_name,
                        field = %signature.field,
                        error = %e,
                        "Failed to detach field hook"
                    );
                    inner.signatures.insert(signature);
                }
            }
        }

        let remaining = inner.signatures.len();
        inner.state = if remaining == 0 {
            RegistrationState::Unregistered
        } else {
            RegistrationState::Registered
        };
        tracing::info!(surface = %self.surface, removed, remaining, "Field hooks removed");
        removed
    }
}
