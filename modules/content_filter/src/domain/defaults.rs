//! Default policy table
//!
//! Compiled-in defaults for every site-level key. Resolution always ends here,
//! so a key missing from every tier still resolves to a defined value.

use crate::contract::{FilterMode, FilterOptions, NetworkSettings, OptionMap};
use serde_json::{json, Value};

pub const FILTER_MODE: &str = "filter_mode";
pub const PRESERVE_LINE_BREAKS: &str = "preserve_line_breaks";
pub const CONVERT_HEADINGS: &str = "convert_headings";
pub const CONVERT_LINKS: &str = "convert_links";
pub const CONVERT_LISTS: &str = "convert_lists";
pub const CONVERT_EMPHASIS: &str = "convert_emphasis";
pub const CONVERT_CODE: &str = "convert_code";
pub const CUSTOM_ALLOWED_TAGS: &str = "custom_allowed_tags";
pub const APPLY_TO_CONTENT: &str = "apply_to_content";
pub const APPLY_TO_EXCERPT: &str = "apply_to_excerpt";
pub const APPLY_TO_REST_API: &str = "apply_to_rest_api";
pub const APPLY_TO_GRAPHQL: &str = "apply_to_graphql";
pub const ENABLED_POST_TYPES: &str = "enabled_post_types";
pub const ENABLE_CACHE: &str = "enable_cache";
pub const CACHE_TTL: &str = "cache_ttl";
pub const BATCH_SIZE: &str = "batch_size";
pub const DEBUG_MODE: &str = "debug_mode";

pub const CACHE_TTL_RANGE: (u32, u32) = (60, 86_400);
pub const BATCH_SIZE_RANGE: (u32, u32) = (10, 1_000);

/// Every site-level key, in resolution order
pub const KEYS: [&str; 17] = [
    FILTER_MODE,
    PRESERVE_LINE_BREAKS,
    CONVERT_HEADINGS,
    CONVERT_LINKS,
    CONVERT_LISTS,
    CONVERT_EMPHASIS,
    CONVERT_CODE,
    CUSTOM_ALLOWED_TAGS,
    APPLY_TO_CONTENT,
    APPLY_TO_EXCERPT,
    APPLY_TO_REST_API,
    APPLY_TO_GRAPHQL,
    ENABLED_POST_TYPES,
    ENABLE_CACHE,
    CACHE_TTL,
    BATCH_SIZE,
    DEBUG_MODE,
];

/// Keys that only exist on the network record
pub const NETWORK_ONLY_KEYS: [&str; 2] = [
    NetworkSettings::ENFORCE_KEY,
    NetworkSettings::ALLOW_OVERRIDES_KEY,
];

pub fn is_known_key(key: &str) -> bool {
    KEYS.contains(&key)
}

/// Default value of a site-level key
pub fn default_value(key: &str) -> Option<Value> {
    let value = match key {
        FILTER_MODE => json!(FilterMode::default().as_str()),
        PRESERVE_LINE_BREAKS => json!(true),
        CONVERT_HEADINGS => json!(true),
        CONVERT_LINKS => json!(true),
        CONVERT_LISTS => json!(true),
        CONVERT_EMPHASIS => json!(true),
        CONVERT_CODE => json!(true),
        CUSTOM_ALLOWED_TAGS => json!(""),
        APPLY_TO_CONTENT => json!(true),
        APPLY_TO_EXCERPT => json!(true),
        APPLY_TO_REST_API => json!(true),
        APPLY_TO_GRAPHQL => json!(true),
        ENABLED_POST_TYPES => json!(["post", "page"]),
        ENABLE_CACHE => json!(true),
        CACHE_TTL => json!(3600),
        BATCH_SIZE => json!(100),
        DEBUG_MODE => json!(false),
        _ => return None,
    };
    Some(value)
}

/// The whole default table as an option map
pub fn option_map() -> OptionMap {
    KEYS.iter()
        .filter_map(|key| default_value(key).map(|value| (key.to_string(), value)))
        .collect()
}

/// Default network record
pub fn network_option_map() -> OptionMap {
    let mut options = option_map();
    options.insert(NetworkSettings::ENFORCE_KEY.to_string(), json!(false));
    options.insert(NetworkSettings::ALLOW_OVERRIDES_KEY.to_string(), json!(true));
    options
}

impl Default for FilterOptions {
    fn default() -> Self {
        FilterOptions::from_map(&OptionMap::new())
    }
}

impl FilterOptions {
    /// Typed interpretation of an option map
    ///
    /// Missing keys and values of the wrong JSON type take the default;
    /// integers are clamped into their allowed range.
    pub fn from_map(values: &OptionMap) -> Self {
        let flag = |key: &str| -> bool {
            values
                .get(key)
                .and_then(Value::as_bool)
                .or_else(|| default_value(key).and_then(|v| v.as_bool()))
                .unwrap_or(false)
        };
        let bounded = |key: &str, (min, max): (u32, u32)| -> u32 {
            let raw = values
                .get(key)
                .and_then(Value::as_u64)
                .or_else(|| default_value(key).and_then(|v| v.as_u64()))
                .unwrap_or(u64::from(min));
            raw.clamp(u64::from(min), u64::from(max)) as u32
        };

        let filter_mode = values
            .get(FILTER_MODE)
            .and_then(Value::as_str)
            .and_then(FilterMode::parse)
            .unwrap_or_default();

        let custom_allowed_tags = values
            .get(CUSTOM_ALLOWED_TAGS)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let enabled_post_types = match values.get(ENABLED_POST_TYPES) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => vec!["post".to_string(), "page".to_string()],
        };

        Self {
            filter_mode,
            preserve_line_breaks: flag(PRESERVE_LINE_BREAKS),
            convert_headings: flag(CONVERT_HEADINGS),
            convert_links: flag(CONVERT_LINKS),
            convert_lists: flag(CONVERT_LISTS),
            convert_emphasis: flag(CONVERT_EMPHASIS),
            convert_code: flag(CONVERT_CODE),
            custom_allowed_tags,
            apply_to_content: flag(APPLY_TO_CONTENT),
            apply_to_excerpt: flag(APPLY_TO_EXCERPT),
            apply_to_rest_api: flag(APPLY_TO_REST_API),
            apply_to_graphql: flag(APPLY_TO_GRAPHQL),
            enabled_post_types,
            enable_cache: flag(ENABLE_CACHE),
            cache_ttl: bounded(CACHE_TTL, CACHE_TTL_RANGE),
            batch_size: bounded(BATCH_SIZE, BATCH_SIZE_RANGE),
            debug_mode: flag(DEBUG_MODE),
        }
    }

    /// Back to the persisted shape
    pub fn to_map(&self) -> OptionMap {
        let mut map = OptionMap::new();
        map.insert(FILTER_MODE.into(), json!(self.filter_mode.as_str()));
        map.insert(PRESERVE_LINE_BREAKS.into(), json!(self.preserve_line_breaks));
        map.insert(CONVERT_HEADINGS.into(), json!(self.convert_headings));
        map.insert(CONVERT_LINKS.into(), json!(self.convert_links));
        map.insert(CONVERT_LISTS.into(), json!(self.convert_lists));
        map.insert(CONVERT_EMPHASIS.into(), json!(self.convert_emphasis));
        map.insert(CONVERT_CODE.into(), json!(self.convert_code));
        map.insert(CUSTOM_ALLOWED_TAGS.into(), json!(self.custom_allowed_tags));
        map.insert(APPLY_TO_CONTENT.into(), json!(self.apply_to_content));
        map.insert(APPLY_TO_EXCERPT.into(), json!(self.apply_to_excerpt));
        map.insert(APPLY_TO_REST_API.into(), json!(self.apply_to_rest_api));
        map.insert(APPLY_TO_GRAPHQL.into(), json!(self.apply_to_graphql));
        map.insert(ENABLED_POST_TYPES.into(), json!(self.enabled_post_types));
        map.insert(ENABLE_CACHE.into(), json!(self.enable_cache));
        map.insert(CACHE_TTL.into(), json!(self.cache_ttl));
        map.insert(BATCH_SIZE.into(), json!(self.batch_size));
        map.insert(DEBUG_MODE.into(), json!(self.debug_mode));
        map
    }
}
