//! JSON shapes of stored records
//!
//! Conversions between the `data` column and contract models.

use crate::contract::{NetworkSettings, OptionMap, OverrideMap, SiteSettings, StoredSiteRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SITE_SCOPE: &str = "site";
pub const NETWORK_SCOPE: &str = "network";

/// `site_id` column value of the network row
pub const NETWORK_ROW_ID: i64 = 0;

/// Structured site record as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SiteRecordJson {
    options: OptionMap,
    #[serde(default)]
    overrides: OverrideMap,
    #[serde(default)]
    last_sync: Option<i64>,
}

impl From<SiteRecordJson> for SiteSettings {
    fn from(json: SiteRecordJson) -> Self {
        Self {
            options: json.options,
            overrides: json.overrides.into_iter().filter(|(_, flag)| *flag).collect(),
            last_sync: json.last_sync,
        }
    }
}

impl From<&SiteSettings> for SiteRecordJson {
    fn from(settings: &SiteSettings) -> Self {
        Self {
            options: settings.options.clone(),
            overrides: settings
                .overrides
                .iter()
                .filter(|(_, flag)| **flag)
                .map(|(key, flag)| (key.clone(), *flag))
                .collect(),
            last_sync: settings.last_sync,
        }
    }
}

/// Parse a site row; an object without an `options` object is a legacy flat map
pub fn site_record_from_json(data: Value) -> anyhow::Result<StoredSiteRecord> {
    let structured = data.get("options").is_some_and(Value::is_object);
    match data {
        Value::Object(_) if structured => {
            let json: SiteRecordJson = serde_json::from_value(data)?;
            Ok(StoredSiteRecord::Structured(json.into()))
        }
        Value::Object(object) => Ok(StoredSiteRecord::Legacy(object.into_iter().collect())),
        other => anyhow::bail!("site options record is not a JSON object: {other}"),
    }
}

pub fn site_record_to_json(settings: &SiteSettings) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(SiteRecordJson::from(settings))?)
}

pub fn network_from_json(data: Value) -> anyhow::Result<NetworkSettings> {
    match data {
        Value::Object(object) => Ok(NetworkSettings::new(object.into_iter().collect())),
        other => anyhow::bail!("network options record is not a JSON object: {other}"),
    }
}

pub fn network_to_json(settings: &NetworkSettings) -> Value {
    Value::Object(
        settings
            .options
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    )
}
