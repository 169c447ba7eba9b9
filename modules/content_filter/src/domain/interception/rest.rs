//! REST side of field interception
//!
//! The host REST layer is always present, so activation only depends on the
//! `apply_to_rest_api` flag. Hooks go on every public post type; whether a
//! field is rewritten is decided per post at interception time.

use super::{target_fields, AdmissionControl, FieldInterceptor, HookManager, Registrar, RegistrationError};
use crate::config::Config;
use crate::contract::{ApiSurface, ContentField, RegistrationReport, RegistrationState};
use crate::domain::host::{FieldHook, MemoryProbe, PostLookup, RestHost};
use crate::domain::resolver::SettingsResolver;
use crate::domain::transform::{RequestScope, TransformEngine};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Hook manager for the REST response pipeline
pub struct RestInterceptor {
    host: Arc<dyn RestHost>,
    resolver: Arc<SettingsResolver>,
    hook: Arc<FieldInterceptor>,
    registrar: Registrar,
    admission: AdmissionControl,
}

impl RestInterceptor {
    pub fn new(
        host: Arc<dyn RestHost>,
        resolver: Arc<SettingsResolver>,
        engine: Arc<TransformEngine>,
        posts: Arc<dyn PostLookup>,
        memory: Arc<dyn MemoryProbe>,
        config: &Config,
    ) -> Self {
        let hook = Arc::new(FieldInterceptor::new(
            ApiSurface::Rest,
            resolver.clone(),
            engine,
            posts,
        ));
        Self {
            host,
            resolver,
            hook,
            registrar: Registrar::new(ApiSurface::Rest, config.hook_priority),
            admission: AdmissionControl::new(config, memory),
        }
    }

    async fn public_types(&self) -> anyhow::Result<Vec<String>> {
        let mut types = self.host.public_post_types().await?;
        let mut seen = std::collections::HashSet::new();
        types.retain(|t| seen.insert(t.clone()));
        Ok(types)
    }
}

#[async_trait]
impl HookManager for RestInterceptor {
    fn surface(&self) -> ApiSurface {
        ApiSurface::Rest
    }

    async fn should_activate(&self) -> bool {
        self.resolver.current_options().await.filter.apply_to_rest_api
    }

    async fn discover_eligible_types(&self) -> Vec<String> {
        match self.public_types().await {
            Ok(types) => self.admission.cap(ApiSurface::Rest, types).0,
            Err(e) => {
                tracing::warn!(error = %e, "REST post type enumeration failed");
                Vec::new()
            }
        }
    }

    async fn register(&self, type_name: &str) -> Result<usize, RegistrationError> {
        let options = self.resolver.current_options().await;
        let hook: Arc<dyn FieldHook> = self.hook.clone();
        self.registrar.attach(
            self.host.as_ref(),
            type_name,
            &target_fields(&options.filter),
            &hook,
        )
    }

    async fn register_all(&self) -> RegistrationReport {
        if !self.registrar.begin_pass() {
            return RegistrationReport::noop(ApiSurface::Rest);
        }
        let options = self.resolver.current_options().await;
        let types = self.public_types().await;
        let hook: Arc<dyn FieldHook> = self.hook.clone();
        self.registrar.run_pass(
            self.host.as_ref(),
            types,
            &target_fields(&options.filter),
            &hook,
            &self.admission,
        )
    }

    fn deregister(&self) -> usize {
        self.registrar.detach_all(self.host.as_ref())
    }

    async fn intercept(&self, field: ContentField, scope: &RequestScope) -> Value {
        self.hook.apply(field, scope).await
    }

    fn state(&self) -> RegistrationState {
        self.registrar.state()
    }

    fn hook_count(&self) -> usize {
        self.registrar.hook_count()
    }
}
