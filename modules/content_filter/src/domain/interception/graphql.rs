//! GraphQL side of field interception

use super::{target_fields, AdmissionControl, FieldInterceptor, HookManager, Registrar, RegistrationError};
use crate::config::Config;
use crate::contract::{ApiSurface, ContentField, RegistrationReport, RegistrationState};
use crate::domain::host::{FieldHook, GraphqlHost, MemoryProbe, PostLookup};
use crate::domain::resolver::SettingsResolver;
use crate::domain::transform::{RequestScope, TransformEngine};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Whether dotted version `version` is at least `minimum`
///
/// Non-numeric suffixes (`-beta`) are ignored; missing components count as zero.
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    fn components(version: &str) -> Vec<u64> {
        version
            .trim()
            .trim_start_matches(['v', 'V'])
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }

    let actual = components(version);
    let required = components(minimum);
    let len = actual.len().max(required.len());
    for i in 0..len {
        let a = actual.get(i).copied().unwrap_or(0);
        let r = required.get(i).copied().unwrap_or(0);
        if a != r {
            return a > r;
        }
    }
    true
}

/// Hook manager for the GraphQL engine
pub struct GraphqlInterceptor {
    host: Arc<dyn GraphqlHost>,
    resolver: Arc<SettingsResolver>,
    hook: Arc<FieldInterceptor>,
    registrar: Registrar,
    admission: AdmissionControl,
    min_version: String,
}

impl GraphqlInterceptor {
    pub fn new(
        host: Arc<dyn GraphqlHost>,
        resolver: Arc<SettingsResolver>,
        engine: Arc<TransformEngine>,
        posts: Arc<dyn PostLookup>,
        memory: Arc<dyn MemoryProbe>,
        config: &Config,
    ) -> Self {
        let hook = Arc::new(FieldInterceptor::new(
            ApiSurface::Graphql,
            resolver.clone(),
            engine,
            posts,
        ));
        Self {
            host,
            resolver,
            hook,
            registrar: Registrar::new(ApiSurface::Graphql, config.hook_priority),
            admission: AdmissionControl::new(config, memory),
            min_version: config.min_graphql_version.clone(),
        }
    }

    /// Reason the engine cannot be used, if any
    ///
    /// An engine that does not report its version is accepted.
    pub fn incompatibility(&self) -> Option<String> {
        if !self.host.is_loaded() {
            return Some("GraphQL engine is not loaded; filtering REST responses only".to_string());
        }
        match self.host.version() {
            Some(version) if !version_at_least(&version, &self.min_version) => Some(format!(
                "GraphQL engine {version} is older than the supported {}; filtering REST responses only",
                self.min_version
            )),
            _ => None,
        }
    }

    async fn eligible_types(&self) -> anyhow::Result<Vec<String>> {
        let options = self.resolver.current_options().await;
        let mut names: Vec<String> = Vec::new();
        for exposed in self.host.allowed_types().await? {
            if options.filter.is_post_type_enabled(&exposed.post_type)
                && !names.contains(&exposed.type_name)
            {
                names.push(exposed.type_name);
            }
        }
        Ok(names)
    }
}

#[async_trait]
impl HookManager for GraphqlInterceptor {
    fn surface(&self) -> ApiSurface {
        ApiSurface::Graphql
    }

    async fn should_activate(&self) -> bool {
        if self.incompatibility().is_some() {
            return false;
        }
        self.resolver.current_options().await.filter.apply_to_graphql
    }

    async fn discover_eligible_types(&self) -> Vec<String> {
        match self.eligible_types().await {
            Ok(types) => self.admission.cap(ApiSurface::Graphql, types).0,
            Err(e) => {
                tracing::warn!(error = %e, "GraphQL type enumeration failed");
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
            return RegistrationReport::noop(ApiSurface::Graphql);
        }
        let options = self.resolver.current_options().await;
        let types = self.eligible_types().await;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_comparison() {
        assert!(version_at_least("1.0.0", "1.0.0"));
        assert!(version_at_least("1.14.3", "1.2"));
        assert!(version_at_least("v2.0", "1.9.9"));
        assert!(version_at_least("1.0.0-beta", "1.0"));
        assert!(!version_at_least("0.9.12", "1.0.0"));
        assert!(!version_at_least("1.1", "1.1.1"));
    }
}
