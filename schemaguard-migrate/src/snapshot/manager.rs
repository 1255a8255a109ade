//! Snapshot capture, storage, retention and comparison.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use schemaguard_adapter::DatabaseAdapter;
use tracing::{debug, info, warn};
use wildmatch::WildMatch;

use super::diff::SnapshotDiff;
use super::document::{
    DatabaseIdentity, FormatVersionMismatchWarning, SNAPSHOT_FORMAT_VERSION, SchemaCapture,
    SnapshotDocument, TableCapture,
};
use super::format::SnapshotFormat;
use super::store::{ArtifactStore, FileStore};
use crate::config::{SafeMigrateConfig, SnapshotConfig};
use crate::error::{MigrateResult, MigrationError};

/// Tables with fewer rows than this have their rows embedded when data capture is on.
pub const DATA_ROW_LIMIT: u64 = 1000;

/// Tables never captured regardless of configuration.
const SYSTEM_TABLES: &[&str] = &["sqlite_sequence"];

/// Captures and manages schema snapshots.
pub struct SnapshotManager {
    adapter: Arc<dyn DatabaseAdapter>,
    store: Arc<dyn ArtifactStore>,
    config: SnapshotConfig,
    ignore: Vec<WildMatch>,
    system_tables: Vec<String>,
}

impl SnapshotManager {
    /// Create a manager over an explicit store.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>, store: Arc<dyn ArtifactStore>, config: SnapshotConfig) -> Self {
        let ignore = config.ignore_tables.iter().map(|p| WildMatch::new(p)).collect();
        Self {
            adapter,
            store,
            config,
            ignore,
            system_tables: SYSTEM_TABLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Create a manager writing to the configured snapshot directory.
    ///
    /// The ledger table is treated as a system table and never captured.
    pub fn from_config(adapter: Arc<dyn DatabaseAdapter>, config: &SafeMigrateConfig) -> Self {
        let store = Arc::new(FileStore::new(&config.snapshots.path));
        Self::new(adapter, store, config.snapshots.clone()).with_system_table(&config.ledger_table)
    }

    /// Exclude another table from capture.
    pub fn with_system_table(mut self, table: impl Into<String>) -> Self {
        self.system_tables.push(table.into());
        self
    }

    /// Snapshot configuration in use.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    fn is_ignored(&self, table: &str) -> bool {
        self.system_tables.iter().any(|t| t == table) || self.ignore.iter().any(|m| m.matches(table))
    }

    fn file_name(&self, name: &str) -> String {
        format!("{}.{}", name, self.config.format.extension())
    }

    /// Capture the live schema, honouring the ignore list.
    pub async fn capture_schema(&self) -> MigrateResult<SchemaCapture> {
        let mut capture = SchemaCapture::default();
        for table in self.adapter.get_all_tables().await? {
            if self.is_ignored(&table) {
                debug!(table = %table, "Table ignored by snapshot");
                continue;
            }
            let entry = TableCapture {
                columns: self.adapter.get_table_columns(&table).await?,
                indexes: self.adapter.get_table_indexes(&table).await?,
                foreign_keys: self.adapter.get_table_foreign_keys(&table).await?,
                row_count: self.adapter.get_table_row_count(&table).await?,
            };
            capture.tables.insert(table, entry);
        }
        Ok(capture)
    }

    /// Take a snapshot and persist it, then enforce retention.
    ///
    /// Without a name the snapshot is named after the current time.
    pub async fn create(&self, name: Option<&str>) -> MigrateResult<SnapshotDocument> {
        let timestamp = Utc::now();
        let name = match name {
            Some(name) => name.to_string(),
            None => format!("snapshot_{}", timestamp.format("%Y%m%d_%H%M%S_%3f")),
        };
        validate_name(&name)?;
        if self.exists(&name).await? {
            return Err(MigrationError::SnapshotExists(name));
        }

        let schema = self.capture_schema().await?;
        let data = if self.config.include_data {
            let mut data = BTreeMap::new();
            for (table, capture) in &schema.tables {
                if capture.row_count < DATA_ROW_LIMIT {
                    data.insert(table.clone(), self.adapter.fetch_rows(table).await?);
                }
            }
            Some(data)
        } else {
            None
        };

        let document = SnapshotDocument {
            version: schema.content_version()?,
            name,
            format_version: Some(SNAPSHOT_FORMAT_VERSION.to_string()),
            timestamp,
            environment: self.config.environment.clone(),
            database: DatabaseIdentity {
                driver: self.adapter.driver().to_string(),
                name: self.adapter.database_name(),
            },
            schema,
            data,
        };

        let content = self.config.format.serialize(&document)?;
        self.store.write(&self.file_name(&document.name), &content).await?;
        info!(
            snapshot = %document.name,
            version = %document.version,
            tables = document.schema.tables.len(),
            "Snapshot created"
        );

        self.enforce_retention().await?;
        Ok(document)
    }

    async fn enforce_retention(&self) -> MigrateResult<()> {
        let max = self.config.max_snapshots;
        if max == 0 {
            return Ok(());
        }
        for stale in self.list().await?.into_iter().skip(max) {
            self.delete(&stale.name).await?;
            info!(snapshot = %stale.name, "Snapshot removed by retention");
        }
        Ok(())
    }

    /// Snapshot files in the store, paired with their format.
    async fn files(&self) -> MigrateResult<Vec<(String, String, SnapshotFormat)>> {
        let mut files = Vec::new();
        for file in self.store.list().await? {
            let Some((stem, ext)) = file.rsplit_once('.') else {
                continue;
            };
            if let Some(format) = SnapshotFormat::from_extension(ext) {
                files.push((stem.to_string(), file.clone(), format));
            }
        }
        Ok(files)
    }

    /// Whether a snapshot with this name is stored in any format.
    pub async fn exists(&self, name: &str) -> MigrateResult<bool> {
        for format in SnapshotFormat::ALL {
            if self.store.exists(&format!("{}.{}", name, format.extension())).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Load a snapshot by name, in whichever format it was stored.
    pub async fn get(&self, name: &str) -> MigrateResult<SnapshotDocument> {
        for format in SnapshotFormat::ALL {
            let file = format!("{}.{}", name, format.extension());
            if self.store.exists(&file).await? {
                return format.deserialize(&self.store.read(&file).await?);
            }
        }
        Err(MigrationError::SnapshotNotFound(name.to_string()))
    }

    /// Most recently written snapshot.
    pub async fn get_latest(&self) -> MigrateResult<Option<SnapshotDocument>> {
        let mut latest = None;
        for (_, file, format) in self.files().await? {
            let modified = self.store.modified(&file).await?;
            let newer = match &latest {
                Some((at, current, _)) => (modified, &file) > (*at, current),
                None => true,
            };
            if newer {
                latest = Some((modified, file, format));
            }
        }

        match latest {
            Some((_, file, format)) => Ok(Some(format.deserialize(&self.store.read(&file).await?)?)),
            None => Ok(None),
        }
    }

    /// Every readable snapshot, newest first by timestamp.
    ///
    /// Files that fail to parse are skipped.
    pub async fn list(&self) -> MigrateResult<Vec<SnapshotDocument>> {
        let mut documents = Vec::new();
        for (_, file, format) in self.files().await? {
            let content = self.store.read(&file).await?;
            match format.deserialize(&content) {
                Ok(document) => documents.push(document),
                Err(e) => warn!(file = %file, error = %e, "Unreadable snapshot skipped"),
            }
        }
        documents.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.name.cmp(&a.name)));
        Ok(documents)
    }

    /// Delete a snapshot in every format it exists in.
    pub async fn delete(&self, name: &str) -> MigrateResult<()> {
        let mut found = false;
        for format in SnapshotFormat::ALL {
            let file = format!("{}.{}", name, format.extension());
            if self.store.exists(&file).await? {
                self.store.delete(&file).await?;
                found = true;
            }
        }
        if !found {
            return Err(MigrationError::SnapshotNotFound(name.to_string()));
        }
        debug!(snapshot = %name, "Snapshot deleted");
        Ok(())
    }

    /// Drift from snapshot `from` to snapshot `to`.
    pub async fn compare(&self, from: &str, to: &str) -> MigrateResult<SnapshotDiff> {
        let older = self.get(from).await?;
        let newer = self.get(to).await?;
        self.format_version_warning(&older);
        self.format_version_warning(&newer);
        SnapshotDiff::between(&older.schema, &newer.schema)
    }

    /// Drift from snapshot `name` to the live database.
    pub async fn compare_with_live(&self, name: &str) -> MigrateResult<SnapshotDiff> {
        let snapshot = self.get(name).await?;
        self.format_version_warning(&snapshot);
        let live = self.capture_schema().await?;
        SnapshotDiff::between(&snapshot.schema, &live)
    }

    /// Restoring a database from a snapshot is not supported; this always fails.
    pub async fn restore(&self, name: &str) -> MigrateResult<()> {
        warn!(snapshot = %name, "Snapshot restore requested but not supported");
        Err(MigrationError::RestoreUnsupported(name.to_string()))
    }

    /// Whether a snapshot was captured by a different capture logic version.
    pub fn has_format_version_mismatch(&self, snapshot: &SnapshotDocument) -> bool {
        snapshot.has_format_version_mismatch()
    }

    /// Advisory for a mismatched snapshot, logged at `warn`.
    pub fn format_version_warning(&self, snapshot: &SnapshotDocument) -> Option<FormatVersionMismatchWarning> {
        let warning = snapshot.format_version_warning()?;
        warn!(snapshot = %snapshot.name, "{}", warning);
        Some(warning)
    }
}

/// Snapshot names become file names: one plain path component, no separators.
fn validate_name(name: &str) -> MigrateResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(MigrationError::InvalidSnapshotName(name.to_string()))
    }
}
