//! Storage formats for snapshot documents.

use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

use super::document::SnapshotDocument;
use crate::error::MigrateResult;

/// How a snapshot is written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Pretty-printed JSON.
    #[default]
    Json,
    /// YAML.
    Yaml,
    /// TOML. Absent optional fields are omitted; NULL cells in row data are
    /// written as `{"$null": true}` since TOML has no null.
    Toml,
}

impl SnapshotFormat {
    /// Every format, in lookup order.
    pub const ALL: [SnapshotFormat; 3] = [Self::Json, Self::Yaml, Self::Toml];

    /// File extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Toml => "toml",
        }
    }

    /// Format for a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }

    /// Serialize a document.
    pub fn serialize(&self, document: &SnapshotDocument) -> MigrateResult<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(document)?,
            Self::Yaml => serde_yaml::to_string(document)?,
            Self::Toml => {
                let mut value = serde_json::to_value(document)?;
                if let Some(data) = value.get_mut("data") {
                    mark_nulls(data);
                }
                strip_nulls(&mut value);
                toml::to_string_pretty(&value)?
            }
        })
    }

    /// Deserialize a document.
    pub fn deserialize(&self, content: &str) -> MigrateResult<SnapshotDocument> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Yaml => serde_yaml::from_str(content)?,
            Self::Toml => {
                let mut value: JsonValue = toml::from_str(content)?;
                if let Some(data) = value.get_mut("data") {
                    unmark_nulls(data);
                }
                serde_json::from_value(value)?
            }
        })
    }
}

impl std::fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Key marking a NULL cell in TOML row data.
const NULL_KEY: &str = "$null";

fn mark_nulls(value: &mut JsonValue) {
    match value {
        JsonValue::Null => *value = json!({ NULL_KEY: true }),
        JsonValue::Object(map) => map.values_mut().for_each(mark_nulls),
        JsonValue::Array(items) => items.iter_mut().for_each(mark_nulls),
        _ => {}
    }
}

fn unmark_nulls(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) if map.len() == 1 && map.get(NULL_KEY) == Some(&JsonValue::Bool(true)) => {
            *value = JsonValue::Null;
        }
        JsonValue::Object(map) => map.values_mut().for_each(unmark_nulls),
        JsonValue::Array(items) => items.iter_mut().for_each(unmark_nulls),
        _ => {}
    }
}

fn strip_nulls(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        JsonValue::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}
