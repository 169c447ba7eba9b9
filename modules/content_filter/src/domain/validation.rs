//! JSON Schema validation for option writes

use super::defaults::{self, BATCH_SIZE_RANGE, CACHE_TTL_RANGE};
use crate::contract::{FilterMode, OptionMap, OverrideMap, SettingsError};
use jsonschema::Validator;
use serde_json::{json, Map, Value};

/// Schema accepted for site option writes
pub fn site_options_schema() -> Value {
    json!({
        "type": "object",
        "properties": key_properties(),
        "additionalProperties": false
    })
}

/// Schema accepted for network option writes
pub fn network_options_schema() -> Value {
    let mut properties = key_properties();
    for key in defaults::NETWORK_ONLY_KEYS {
        properties.insert(key.to_string(), json!({ "type": "boolean" }));
    }
    json!({
        "type": "object",
        "properties": properties,
        "additionalProperties": false
    })
}

fn key_properties() -> Map<String, Value> {
    let modes: Vec<&str> = FilterMode::ALL.iter().map(|m| m.as_str()).collect();
    let mut properties = Map::new();
    for key in defaults::KEYS {
        let schema = match key {
            defaults::FILTER_MODE => json!({ "type": "string", "enum": modes }),
            defaults::CUSTOM_ALLOWED_TAGS => {
                json!({ "type": "string", "pattern": "^[A-Za-z0-9,\\s]*$" })
            }
            defaults::ENABLED_POST_TYPES => json!({
                "type": "array",
                "items": { "type": "string", "minLength": 1 }
            }),
            defaults::CACHE_TTL => json!({
                "type": "integer",
                "minimum": CACHE_TTL_RANGE.0,
                "maximum": CACHE_TTL_RANGE.1
            }),
            defaults::BATCH_SIZE => json!({
                "type": "integer",
                "minimum": BATCH_SIZE_RANGE.0,
                "maximum": BATCH_SIZE_RANGE.1
            }),
            _ => json!({ "type": "boolean" }),
        };
        properties.insert(key.to_string(), schema);
    }
    properties
}

/// Validate site values against the site schema
pub fn validate_site_options(options: &OptionMap) -> Result<(), SettingsError> {
    validate_against_schema(&to_object(options), &site_options_schema())
}

/// Validate network values against the network schema
pub fn validate_network_options(options: &OptionMap) -> Result<(), SettingsError> {
    validate_against_schema(&to_object(options), &network_options_schema())
}

/// Override flags may only name site-level keys
pub fn validate_overrides(overrides: &OverrideMap) -> Result<(), SettingsError> {
    let unknown: Vec<&str> = overrides
        .keys()
        .map(String::as_str)
        .filter(|key| !defaults::is_known_key(key))
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(SettingsError::validation(format!(
            "unknown override keys: {}",
            unknown.join(", ")
        )))
    }
}

fn to_object(options: &OptionMap) -> Value {
    Value::Object(
        options
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}

/// Validate a value against a JSON Schema
pub fn validate_against_schema(data: &Value, schema: &Value) -> Result<(), SettingsError> {
    let validator = Validator::new(schema).map_err(|e| SettingsError::Validation {
        message: format!("Invalid JSON Schema: {}", e),
    })?;

    if let Err(error) = validator.validate(data) {
        return Err(SettingsError::SchemaValidation {
            errors: vec![error.to_string()],
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, Value)]) -> OptionMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_defaults_pass_site_schema() {
        assert!(validate_site_options(&defaults::option_map()).is_ok());
        assert!(validate_network_options(&defaults::network_option_map()).is_ok());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = validate_site_options(&options(&[("filter_mode", json!("html"))]));
        assert!(matches!(result, Err(SettingsError::SchemaValidation { .. })));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = validate_site_options(&options(&[("colour", json!("red"))]));
        assert!(matches!(result, Err(SettingsError::SchemaValidation { .. })));
    }

    #[test]
    fn test_network_flags_only_valid_on_network() {
        let flags = options(&[("enforce_network_settings", json!(true))]);
        assert!(validate_network_options(&flags).is_ok());
        assert!(validate_site_options(&flags).is_err());
    }

    #[test]
    fn test_ranges_enforced() {
        assert!(validate_site_options(&options(&[("cache_ttl", json!(30))])).is_err());
        assert!(validate_site_options(&options(&[("cache_ttl", json!(600))])).is_ok());
        assert!(validate_site_options(&options(&[("batch_size", json!(5000))])).is_err());
    }

    #[test]
    fn test_tag_list_rejects_markup() {
        let ok = options(&[("custom_allowed_tags", json!("p, strong,em"))]);
        let bad = options(&[("custom_allowed_tags", json!("<script>"))]);
        assert!(validate_site_options(&ok).is_ok());
        assert!(validate_site_options(&bad).is_err());
    }

    #[test]
    fn test_override_keys_must_be_known() {
        let mut overrides = OverrideMap::new();
        overrides.insert("filter_mode".into(), true);
        assert!(validate_overrides(&overrides).is_ok());
        overrides.insert("enforce_network_settings".into(), true);
        assert!(matches!(
            validate_overrides(&overrides),
            Err(SettingsError::Validation { .. })
        ));
    }
}
