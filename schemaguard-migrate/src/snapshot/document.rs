//! The persisted snapshot document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemaguard_adapter::{Column, ForeignKey, Index, Row};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::MigrateResult;

/// Capability level of the capture logic.
///
/// Bumped whenever introspection changes in a way that alters captured output
/// for an unchanged schema.
pub const SNAPSHOT_FORMAT_VERSION: &str = "2";

/// Hex characters kept from the schema digest.
pub const VERSION_LEN: usize = 12;

/// Which database a snapshot was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseIdentity {
    /// Driver identifier.
    pub driver: String,
    /// Database name.
    pub name: String,
}

/// Captured structure of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCapture {
    /// Columns in ordinal order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Indexes.
    #[serde(default)]
    pub indexes: Vec<Index>,
    /// Foreign keys.
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    /// Row count at capture time.
    #[serde(default)]
    pub row_count: u64,
}

/// Captured schema, keyed by table name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCapture {
    /// Tables by name.
    #[serde(default)]
    pub tables: BTreeMap<String, TableCapture>,
}

impl SchemaCapture {
    /// Content version: the first 12 hex characters of the schema's SHA-256.
    pub fn content_version(&self) -> MigrateResult<String> {
        let serialized = serde_json::to_vec(self)?;
        let digest = hex::encode(Sha256::digest(&serialized));
        Ok(digest[..VERSION_LEN].to_string())
    }
}

/// An immutable point-in-time schema capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    /// Snapshot name, also its file stem.
    pub name: String,
    /// Content version of `schema`.
    pub version: String,
    /// Capture logic version; absent on snapshots from before it was tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Environment label.
    pub environment: String,
    /// Source database.
    pub database: DatabaseIdentity,
    /// Captured schema.
    pub schema: SchemaCapture,
    /// Row data for small tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<BTreeMap<String, Vec<Row>>>,
}

impl SnapshotDocument {
    /// Whether the document was captured by a different capture logic version.
    pub fn has_format_version_mismatch(&self) -> bool {
        self.format_version.as_deref() != Some(SNAPSHOT_FORMAT_VERSION)
    }

    /// Advisory for a mismatched format version, if any.
    pub fn format_version_warning(&self) -> Option<FormatVersionMismatchWarning> {
        self.has_format_version_mismatch()
            .then(|| FormatVersionMismatchWarning {
                snapshot: self.name.clone(),
                found: self.format_version.clone(),
                current: SNAPSHOT_FORMAT_VERSION.to_string(),
            })
    }
}

/// Non-fatal advisory that a snapshot may show drift caused by capture
/// changes rather than schema changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatVersionMismatchWarning {
    /// Snapshot name.
    pub snapshot: String,
    /// Format version on the snapshot.
    pub found: Option<String>,
    /// Current format version.
    pub current: String,
}

impl std::fmt::Display for FormatVersionMismatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.found {
            Some(found) => write!(
                f,
                "snapshot '{}' was captured with format version {} (current is {}); regenerate it to avoid false drift",
                self.snapshot, found, self.current
            ),
            None => write!(
                f,
                "snapshot '{}' has no format version (current is {}); regenerate it to avoid false drift",
                self.snapshot, self.current
            ),
        }
    }
}
