//! Content transform engine
//!
//! Pure string rewriting behind a fail-open boundary: whatever goes wrong in a
//! transformer, callers get the original input back.

pub mod cache;
pub mod html;

pub use cache::{CacheKey, TransformCache};
pub use html::HtmlTransformer;

use crate::config::Config;
use crate::contract::{FilterMode, FilterOptions, PostId};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Error type for a single transform
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("Input of {size} bytes exceeds the {limit} byte limit")]
    InputTooLarge { size: usize, limit: usize },

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Transformer panicked in {mode} mode")]
    Panicked { mode: FilterMode },
}

/// Pluggable rewriting strategy
pub trait ContentTransformer: Send + Sync {
    fn transform(
        &self,
        raw: &str,
        mode: FilterMode,
        options: &FilterOptions,
    ) -> Result<String, TransformError>;
}

/// Per-request invocation budget
///
/// Once more than `ceiling` transforms have been requested, every further
/// transform in the same request is an identity.
#[derive(Debug)]
pub struct RequestScope {
    ceiling: usize,
    invocations: AtomicUsize,
    tripped: AtomicBool,
}

impl RequestScope {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            invocations: AtomicUsize::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// Count one invocation; `false` once the ceiling is exceeded
    pub fn admit(&self) -> bool {
        let count = self.invocations.fetch_add(1, Ordering::Relaxed) + 1;
        if count <= self.ceiling {
            return true;
        }
        if !self.tripped.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                ceiling = self.ceiling,
                "Transform circuit breaker tripped; remaining fields pass through unfiltered"
            );
        }
        false
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::Relaxed)
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::Relaxed)
    }
}

/// Transform engine with input guards, circuit breaker and cache
pub struct TransformEngine {
    transformer: Arc<dyn ContentTransformer>,
    cache: Arc<TransformCache>,
    max_input_bytes: usize,
    transform_ceiling: usize,
}

impl TransformEngine {
    pub fn new(
        transformer: Arc<dyn ContentTransformer>,
        cache: Arc<TransformCache>,
        config: &Config,
    ) -> Self {
        Self {
            transformer,
            cache,
            max_input_bytes: config.max_input_bytes,
            transform_ceiling: config.transform_ceiling,
        }
    }

    /// Engine over the HTML transformer with default limits
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(HtmlTransformer),
            Arc::new(TransformCache::new()),
            &Config::default(),
        )
    }

    /// Budget for one host request
    pub fn begin_request(&self) -> RequestScope {
        RequestScope::new(self.transform_ceiling)
    }

    pub fn cache(&self) -> &Arc<TransformCache> {
        &self.cache
    }

    /// Run the transformer, surfacing failures
    pub fn try_transform(
        &self,
        raw: &str,
        mode: FilterMode,
        options: &FilterOptions,
    ) -> Result<String, TransformError> {
        if raw.is_empty() || mode == FilterMode::None {
            return Ok(raw.to_string());
        }
        if raw.len() > self.max_input_bytes {
            return Err(TransformError::InputTooLarge {
                size: raw.len(),
                limit: self.max_input_bytes,
            });
        }
        if raw.contains('\0') {
            return Err(TransformError::Malformed("embedded NUL byte".to_string()));
        }

        let transformer = self.transformer.as_ref();
        catch_unwind(AssertUnwindSafe(|| transformer.transform(raw, mode, options)))
            .map_err(|_| TransformError::Panicked { mode })?
    }

    /// Transform, returning `raw` unchanged on any failure
    pub fn transform(&self, raw: &str, mode: FilterMode, options: &FilterOptions) -> String {
        match self.try_transform(raw, mode, options) {
            Ok(output) => output,
            Err(error) => {
                report_failure(&error, mode, options);
                raw.to_string()
            }
        }
    }

    /// Transform a field inside a request, honouring the breaker and the cache
    pub fn transform_field(
        &self,
        post_id: Option<PostId>,
        raw: &str,
        options: &FilterOptions,
        scope: &RequestScope,
    ) -> String {
        let mode = options.filter_mode;
        if raw.is_empty() || mode == FilterMode::None {
            return raw.to_string();
        }
        if !scope.admit() {
            return raw.to_string();
        }

        let key = options.enable_cache.then(|| CacheKey::new(raw, mode, options));
        if let Some(hit) = key.as_ref().and_then(|key| self.cache.get(key)) {
            return hit;
        }

        match self.try_transform(raw, mode, options) {
            Ok(output) => {
                if let Some(key) = key {
                    let ttl = Duration::from_secs(u64::from(options.cache_ttl));
                    self.cache.insert(key, post_id, output.clone(), ttl);
                }
                output
            }
            Err(error) => {
                report_failure(&error, mode, options);
                raw.to_string()
            }
        }
    }
}

fn report_failure(error: &TransformError, mode: FilterMode, options: &FilterOptions) {
    if options.debug_mode {
        tracing::warn!(%error, %mode, "Transform failed; returning original content");
    } else {
        tracing::trace!(%error, %mode, "Transform failed");
    }
}
