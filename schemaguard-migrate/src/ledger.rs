//! Migration ledger.
//!
//! The ledger records which migrations ran and in which batch. Safe execution
//! appends to it on success and rollback removes from it; nothing here lists
//! or reorders it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use schemaguard_adapter::connection::{row_str, row_u64};
use schemaguard_adapter::{ColumnDefinition, ColumnType, DatabaseAdapter, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::DEFAULT_LEDGER_TABLE;
use crate::error::{MigrateResult, MigrationError};

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Migration name.
    pub migration: String,
    /// Batch the migration ran in.
    pub batch: u32,
}

/// Narrow interface to the migration ledger.
#[async_trait::async_trait]
pub trait MigrationLedger: Send + Sync {
    /// Record that `migration` ran in `batch`.
    async fn log(&self, migration: &str, batch: u32) -> MigrateResult<()>;

    /// Remove the entry for `migration`.
    async fn delete(&self, migration: &str) -> MigrateResult<()>;
}

/// In-process ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current entries in insertion order.
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().clone()
    }

    /// Whether `migration` is recorded.
    pub fn contains(&self, migration: &str) -> bool {
        self.entries.lock().iter().any(|e| e.migration == migration)
    }
}

#[async_trait::async_trait]
impl MigrationLedger for MemoryLedger {
    async fn log(&self, migration: &str, batch: u32) -> MigrateResult<()> {
        self.entries.lock().push(LedgerEntry {
            migration: migration.to_string(),
            batch,
        });
        Ok(())
    }

    async fn delete(&self, migration: &str) -> MigrateResult<()> {
        self.entries.lock().retain(|e| e.migration != migration);
        Ok(())
    }
}

/// Ledger stored in a table of the migrated database.
pub struct AdapterLedger {
    adapter: Arc<dyn DatabaseAdapter>,
    table: String,
}

impl AdapterLedger {
    /// Ledger in the default `_schemaguard_migrations` table.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>) -> Self {
        Self::with_table(adapter, DEFAULT_LEDGER_TABLE)
    }

    /// Ledger in a custom table.
    pub fn with_table(adapter: Arc<dyn DatabaseAdapter>, table: impl Into<String>) -> Self {
        Self {
            adapter,
            table: table.into(),
        }
    }

    /// Ledger table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist.
    pub async fn initialize(&self) -> MigrateResult<()> {
        if self.adapter.has_table(&self.table).await? {
            return Ok(());
        }
        let columns = [
            ColumnDefinition::id("id"),
            ColumnDefinition::new("migration", ColumnType::String(Some(255))).not_null(),
            ColumnDefinition::new("batch", ColumnType::Integer).not_null(),
            ColumnDefinition::new("applied_at", ColumnType::Timestamp).not_null(),
        ];
        let sql = self.adapter.get_create_table_sql(&self.table, &columns);
        self.adapter.execute(&sql).await?;
        debug!(table = %self.table, "Created ledger table");
        Ok(())
    }

    /// Entries ordered by insertion.
    pub async fn entries(&self) -> MigrateResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT migration, batch FROM {} ORDER BY id",
            self.adapter.quote_identifier(&self.table)
        );
        let rows = self.adapter.introspect(&self.table, &sql).await?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    fn entry_from_row(row: &Row) -> MigrateResult<LedgerEntry> {
        let migration =
            row_str(row, "migration").ok_or_else(|| MigrationError::ledger("ledger row has no migration name"))?;
        let batch = row_u64(row, "batch")
            .ok_or_else(|| MigrationError::ledger(format!("ledger row '{}' has no batch", migration)))?;
        let batch = u32::try_from(batch)
            .map_err(|_| MigrationError::ledger(format!("batch {} of '{}' is out of range", batch, migration)))?;
        Ok(LedgerEntry { migration, batch })
    }

    fn applied_at(now: DateTime<Utc>) -> JsonValue {
        JsonValue::String(now.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

#[async_trait::async_trait]
impl MigrationLedger for AdapterLedger {
    async fn log(&self, migration: &str, batch: u32) -> MigrateResult<()> {
        let mut row = Row::new();
        row.insert("migration".into(), JsonValue::String(migration.to_string()));
        row.insert("batch".into(), JsonValue::from(batch));
        row.insert("applied_at".into(), Self::applied_at(Utc::now()));

        let written = self.adapter.insert_rows(&self.table, &[row]).await?;
        if written != 1 {
            return Err(MigrationError::ledger(format!(
                "expected to record '{}' once, wrote {} rows",
                migration, written
            )));
        }
        debug!(migration = %migration, batch = batch, "Ledger entry recorded");
        Ok(())
    }

    async fn delete(&self, migration: &str) -> MigrateResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.adapter.quote_identifier(&self.table),
            self.adapter.quote_identifier("migration"),
            self.adapter.render_value(&JsonValue::String(migration.to_string()))
        );
        self.adapter.execute(&sql).await?;
        debug!(migration = %migration, "Ledger entry removed");
        Ok(())
    }
}
