//! Configuration for the content filter module

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "CONTENT_FILTER_";

/// Keys read from the environment; other `CONTENT_FILTER_*` variables are ignored
const ENV_KEYS: &[&str] = &[
    "max_types_per_pass",
    "memory_budget_fraction",
    "memory_limit_bytes",
    "transform_ceiling",
    "max_input_bytes",
    "options_cache_ttl_secs",
    "cache_max_entries",
    "min_graphql_version",
    "hook_priority",
];

/// Content filter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Type-count ceiling per registration pass
    #[serde(default = "default_max_types_per_pass")]
    pub max_types_per_pass: usize,

    /// Fraction of the memory limit past which registration truncates
    #[serde(default = "default_memory_budget_fraction")]
    pub memory_budget_fraction: f64,

    /// Explicit memory limit; total system memory when unset
    #[serde(default)]
    pub memory_limit_bytes: Option<u64>,

    /// Transform invocations serviced per request scope
    #[serde(default = "default_transform_ceiling")]
    pub transform_ceiling: usize,

    /// Inputs larger than this pass through unchanged
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,

    /// Memoization TTL for effective options (seconds)
    #[serde(default = "default_options_cache_ttl_secs")]
    pub options_cache_ttl_secs: u64,

    /// Upper bound on cached transform results
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    /// Oldest GraphQL engine version hooks are attached to
    #[serde(default = "default_min_graphql_version")]
    pub min_graphql_version: String,

    /// Priority component of hook signatures
    #[serde(default = "default_hook_priority")]
    pub hook_priority: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_types_per_pass: default_max_types_per_pass(),
            memory_budget_fraction: default_memory_budget_fraction(),
            memory_limit_bytes: None,
            transform_ceiling: default_transform_ceiling(),
            max_input_bytes: default_max_input_bytes(),
            options_cache_ttl_secs: default_options_cache_ttl_secs(),
            cache_max_entries: default_cache_max_entries(),
            min_graphql_version: default_min_graphql_version(),
            hook_priority: default_hook_priority(),
        }
    }
}

impl Config {
    /// Load from a YAML file, with `CONTENT_FILTER_*` environment overrides
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::extract(Figment::new().merge(Yaml::file(path.as_ref())))
    }

    /// Load from YAML text, with `CONTENT_FILTER_*` environment overrides
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        Self::extract(Figment::new().merge(Yaml::string(yaml)))
    }

    fn extract(figment: Figment) -> anyhow::Result<Self> {
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).only(ENV_KEYS))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(self.memory_budget_fraction > 0.0 && self.memory_budget_fraction <= 1.0) {
            anyhow::bail!(
                "memory_budget_fraction must be in (0, 1], got {}",
                self.memory_budget_fraction
            );
        }
        if self.max_types_per_pass == 0 {
            anyhow::bail!("max_types_per_pass must be at least 1");
        }
        if self.cache_max_entries == 0 {
            anyhow::bail!("cache_max_entries must be at least 1");
        }
        Ok(())
    }

    pub fn options_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.options_cache_ttl_secs)
    }
}

fn default_max_types_per_pass() -> usize {
    15
}

fn default_memory_budget_fraction() -> f64 {
    0.8
}

fn default_transform_ceiling() -> usize {
    100
}

fn default_max_input_bytes() -> usize {
    2 * 1024 * 1024 // 2 MiB
}

fn default_options_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_max_entries() -> usize {
    10_000
}

fn default_min_graphql_version() -> String {
    "1.0.0".to_string()
}

fn default_hook_priority() -> i32 {
    10
}
