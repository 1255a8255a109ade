//! In-memory table backups for a single migration run.
//!
//! A [`BackupSet`] lives only as long as one execution: it is dropped on
//! success and replayed on failure. It is never written to disk.

use schemaguard_adapter::{DatabaseAdapter, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{MigrateResult, MigrationError};

/// Captured structure and rows of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    /// Table name.
    pub table: String,
    /// Statements that recreate the table (table first, then indexes).
    pub structure: Vec<String>,
    /// Every row at capture time.
    pub rows: Vec<Row>,
    /// Row count at capture time.
    pub row_count: u64,
}

/// Backups of every affected table, in capture order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupSet {
    records: Vec<BackupRecord>,
}

impl BackupSet {
    /// Capture every table in `tables` that currently exists.
    ///
    /// Any introspection failure aborts with [`MigrationError::BackupCapture`];
    /// nothing has been mutated at that point.
    pub async fn capture(adapter: &dyn DatabaseAdapter, tables: &[String]) -> MigrateResult<Self> {
        let existing = adapter
            .get_all_tables()
            .await
            .map_err(|e| MigrationError::backup_capture("*", e))?;

        let mut records = Vec::new();
        for table in tables.iter().filter(|t| existing.contains(t)) {
            let structure = adapter
                .capture_table_ddl(table)
                .await
                .map_err(|e| MigrationError::backup_capture(table, e))?;
            let rows = adapter
                .fetch_rows(table)
                .await
                .map_err(|e| MigrationError::backup_capture(table, e))?;
            let row_count = rows.len() as u64;

            debug!(table = %table, rows = row_count, "Captured backup");
            records.push(BackupRecord {
                table: table.clone(),
                structure,
                rows,
                row_count,
            });
        }
        Ok(Self { records })
    }

    /// Captured records.
    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    /// Names of captured tables.
    pub fn tables(&self) -> Vec<String> {
        self.records.iter().map(|r| r.table.clone()).collect()
    }

    /// Total captured rows.
    pub fn total_rows(&self) -> u64 {
        self.records.iter().map(|r| r.row_count).sum()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Restore every captured table, best effort.
    ///
    /// Each table is dropped, recreated from its captured structure and refilled.
    /// A failure on one table is recorded and the rest are still attempted.
    pub async fn restore(&self, adapter: &dyn DatabaseAdapter) -> Vec<RestorationResult> {
        let mut results = Vec::with_capacity(self.records.len());
        for record in &self.records {
            let result = match restore_table(adapter, record).await {
                Ok(rows) => {
                    info!(table = %record.table, rows = rows, "Table restored");
                    RestorationResult::restored(&record.table, rows)
                }
                Err(e) => {
                    error!(table = %record.table, error = %e, "Table restoration failed");
                    RestorationResult::failed(&record.table, e)
                }
            };
            results.push(result);
        }
        results
    }
}

async fn restore_table(adapter: &dyn DatabaseAdapter, record: &BackupRecord) -> MigrateResult<u64> {
    adapter.execute(&adapter.get_drop_table_sql(&record.table)).await?;
    for statement in &record.structure {
        adapter.execute(statement).await?;
    }
    Ok(adapter.insert_rows(&record.table, &record.rows).await?)
}

/// Outcome of restoring one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestorationResult {
    /// Table name.
    pub table: String,
    /// What happened.
    pub status: RestorationStatus,
}

/// Restoration status of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RestorationStatus {
    /// Structure recreated and rows reinserted.
    Restored {
        /// Rows reinserted.
        rows: u64,
    },
    /// Restoration of this table failed.
    Failed {
        /// Why.
        message: String,
    },
}

impl RestorationResult {
    /// A successful restoration.
    pub fn restored(table: impl Into<String>, rows: u64) -> Self {
        Self {
            table: table.into(),
            status: RestorationStatus::Restored { rows },
        }
    }

    /// A failed restoration.
    pub fn failed(table: impl Into<String>, message: impl ToString) -> Self {
        Self {
            table: table.into(),
            status: RestorationStatus::Failed {
                message: message.to_string(),
            },
        }
    }

    /// Whether the table was restored.
    pub fn is_restored(&self) -> bool {
        matches!(self.status, RestorationStatus::Restored { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use schemaguard_adapter::{SqliteAdapter, SqliteConnection};

    async fn adapter() -> SqliteAdapter {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        SqliteAdapter::new(Arc::new(conn))
    }

    #[tokio::test]
    async fn test_capture_skips_missing_tables() {
        let adapter = adapter().await;
        adapter
            .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, code TEXT)")
            .await
            .unwrap();
        adapter
            .execute("INSERT INTO orders (code) VALUES ('a'), ('b')")
            .await
            .unwrap();

        let backup = BackupSet::capture(&adapter, &["orders".into(), "ghost".into()])
            .await
            .unwrap();
        assert_eq!(backup.tables(), vec!["orders".to_string()]);
        assert_eq!(backup.total_rows(), 2);
        assert!(backup.records()[0].structure[0].starts_with("CREATE TABLE orders"));
    }

    #[tokio::test]
    async fn test_restore_replays_structure_and_rows() {
        let adapter = adapter().await;
        adapter
            .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, code TEXT NOT NULL)")
            .await
            .unwrap();
        adapter
            .execute("CREATE INDEX idx_orders_code ON orders (code)")
            .await
            .unwrap();
        adapter
            .execute("INSERT INTO orders (code) VALUES ('a'), ('b'), ('c')")
            .await
            .unwrap();

        let backup = BackupSet::capture(&adapter, &["orders".into()]).await.unwrap();
        adapter.execute("ALTER TABLE orders DROP COLUMN code").await.ok();
        adapter.execute("DELETE FROM orders").await.unwrap();

        let results = backup.restore(&adapter).await;
        assert_eq!(results, vec![RestorationResult::restored("orders", 3)]);
        assert_eq!(adapter.get_table_row_count("orders").await.unwrap(), 3);
        assert!(adapter.has_column("orders", "code").await.unwrap());
        let indexes = adapter.get_table_indexes("orders").await.unwrap();
        assert!(indexes.iter().any(|i| i.name == "idx_orders_code"));
    }

    #[tokio::test]
    async fn test_restore_is_best_effort() {
        let adapter = adapter().await;
        adapter.execute("CREATE TABLE a (id INTEGER)").await.unwrap();
        adapter.execute("CREATE TABLE b (id INTEGER)").await.unwrap();
        adapter.execute("INSERT INTO b VALUES (1)").await.unwrap();

        let mut backup = BackupSet::capture(&adapter, &["a".into(), "b".into()]).await.unwrap();
        backup.records[0].structure = vec!["CREATE TABLE broken (".into()];

        let results = backup.restore(&adapter).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].is_restored());
        assert_eq!(results[1], RestorationResult::restored("b", 1));
    }
}
