//! Drift between two snapshots.

use serde::Serialize;

use super::document::SchemaCapture;
use crate::error::MigrateResult;

/// Table-level difference between two schema captures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotDiff {
    /// Tables only in the newer capture.
    pub added_tables: Vec<String>,
    /// Tables only in the older capture.
    pub removed_tables: Vec<String>,
    /// Tables in both whose captured content differs.
    pub modified_tables: Vec<String>,
}

impl SnapshotDiff {
    /// Compare `from` (older) with `to` (newer).
    ///
    /// A table counts as modified when its serialized capture differs, row
    /// count included.
    pub fn between(from: &SchemaCapture, to: &SchemaCapture) -> MigrateResult<Self> {
        let mut diff = Self::default();

        for (name, table) in &to.tables {
            match from.tables.get(name) {
                None => diff.added_tables.push(name.clone()),
                Some(old) => {
                    if serde_json::to_string(old)? != serde_json::to_string(table)? {
                        diff.modified_tables.push(name.clone());
                    }
                }
            }
        }
        diff.removed_tables = from
            .tables
            .keys()
            .filter(|name| !to.tables.contains_key(*name))
            .cloned()
            .collect();

        Ok(diff)
    }

    /// Check if there are any differences.
    pub fn is_empty(&self) -> bool {
        self.added_tables.is_empty() && self.removed_tables.is_empty() && self.modified_tables.is_empty()
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if !self.added_tables.is_empty() {
            parts.push(format!("Added {} tables", self.added_tables.len()));
        }
        if !self.removed_tables.is_empty() {
            parts.push(format!("Removed {} tables", self.removed_tables.len()));
        }
        if !self.modified_tables.is_empty() {
            parts.push(format!("Modified {} tables", self.modified_tables.len()));
        }

        if parts.is_empty() {
            "No drift".to_string()
        } else {
            parts.join(", ")
        }
    }
}
