//! Non-destructive rollback.
//!
//! Column and table drops found in a migration's reverse direction are turned
//! into archival renames that share one timestamp per rollback. The reverse
//! SQL itself is never executed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use schemaguard_adapter::DatabaseAdapter;
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzer::MigrationScriptAnalyzer;
use crate::archive::ArchiveNaming;
use crate::error::{MigrateResult, MigrationError};
use crate::ledger::MigrationLedger;
use crate::migration::{Direction, Migration};

/// A table or column moved aside by a rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedArtifact {
    /// Table the artifact belongs to (the original name for tables).
    pub table: String,
    /// Original column name, or `None` for a table.
    pub column: Option<String>,
    /// Name after archival.
    pub archived_as: String,
}

/// Result of one rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackReport {
    /// Migration that was rolled back.
    pub migration: String,
    /// Timestamp shared by every artifact of this rollback.
    pub stamp: String,
    /// Archived tables.
    pub archived_tables: Vec<ArchivedArtifact>,
    /// Archived columns.
    pub archived_columns: Vec<ArchivedArtifact>,
    /// Targets that no longer existed.
    pub skipped: Vec<String>,
}

impl RollbackReport {
    /// Whether anything was archived.
    pub fn archived_anything(&self) -> bool {
        !self.archived_tables.is_empty() || !self.archived_columns.is_empty()
    }
}

/// Undoes migrations by archiving instead of dropping.
pub struct SafeRollbackEngine {
    adapter: Arc<dyn DatabaseAdapter>,
    ledger: Arc<dyn MigrationLedger>,
    analyzer: MigrationScriptAnalyzer,
    naming: ArchiveNaming,
}

impl SafeRollbackEngine {
    /// Create an engine with the default archive naming.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>, ledger: Arc<dyn MigrationLedger>) -> Self {
        Self {
            adapter,
            ledger,
            analyzer: MigrationScriptAnalyzer::new(),
            naming: ArchiveNaming::default(),
        }
    }

    /// Use custom archive naming.
    pub fn with_naming(mut self, naming: ArchiveNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Archive naming in use.
    pub fn naming(&self) -> &ArchiveNaming {
        &self.naming
    }

    /// Roll back `migration` now.
    pub async fn rollback(&self, migration: &dyn Migration) -> MigrateResult<RollbackReport> {
        self.rollback_at(migration, Utc::now()).await
    }

    /// Roll back `migration`, stamping archives with `at`.
    ///
    /// Columns are archived before tables so a column drop on a table that is
    /// also dropped still lands on the table before it is renamed. Missing
    /// targets are skipped. A failed rename stops the rollback with
    /// [`MigrationError::Rollback`] and leaves the ledger untouched.
    pub async fn rollback_at(
        &self,
        migration: &dyn Migration,
        at: DateTime<Utc>,
    ) -> MigrateResult<RollbackReport> {
        let name = migration.name();
        let analysis = migration.source(Direction::Down).analyze(&self.analyzer);
        let stamp = ArchiveNaming::stamp(at);

        let mut report = RollbackReport {
            migration: name.to_string(),
            stamp: stamp.clone(),
            archived_tables: Vec::new(),
            archived_columns: Vec::new(),
            skipped: Vec::new(),
        };

        let mut existing = self.adapter.get_all_tables().await?;

        for drop in &analysis.dropped_columns {
            let present = existing.contains(&drop.table)
                && self.adapter.has_column(&drop.table, &drop.column).await?;
            if !present {
                debug!(table = %drop.table, column = %drop.column, "Column missing, skipped");
                report.skipped.push(format!("{}.{}", drop.table, drop.column));
                continue;
            }

            let archived_as = self.naming.column_name(&drop.column, &stamp);
            self.adapter
                .archive_column(&drop.table, &drop.column, &archived_as)
                .await
                .map_err(|e| MigrationError::rollback(name, e))?;
            info!(table = %drop.table, column = %drop.column, archived_as = %archived_as, "Column archived");
            report.archived_columns.push(ArchivedArtifact {
                table: drop.table.clone(),
                column: Some(drop.column.clone()),
                archived_as,
            });
        }

        for table in &analysis.dropped_tables {
            if !existing.contains(table) {
                debug!(table = %table, "Table missing, skipped");
                report.skipped.push(table.clone());
                continue;
            }

            let archived_as = self.naming.table_name(table, &stamp);
            self.adapter
                .archive_table(table, &archived_as)
                .await
                .map_err(|e| MigrationError::rollback(name, e))?;
            info!(table = %table, archived_as = %archived_as, "Table archived");
            existing.retain(|t| t != table);
            report.archived_tables.push(ArchivedArtifact {
                table: table.clone(),
                column: None,
                archived_as,
            });
        }

        self.ledger.delete(name).await?;
        info!(
            migration = %name,
            tables = report.archived_tables.len(),
            columns = report.archived_columns.len(),
            "Rollback complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use schemaguard_adapter::{SqliteAdapter, SqliteConnection};

    use crate::ledger::MemoryLedger;
    use crate::migration::{OperationMigration, SqlMigration};
    use crate::operation::SchemaOperation;

    async fn setup() -> (Arc<dyn DatabaseAdapter>, Arc<MemoryLedger>) {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        let adapter: Arc<dyn DatabaseAdapter> = Arc::new(SqliteAdapter::new(Arc::new(conn)));
        for sql in [
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, legacy_code TEXT)",
            "INSERT INTO orders (legacy_code) VALUES ('x1'), ('x2')",
            "CREATE TABLE sessions (id INTEGER PRIMARY KEY)",
        ] {
            adapter.execute(sql).await.unwrap();
        }
        let ledger = Arc::new(MemoryLedger::new());
        ledger.log("0007_orders", 1).await.unwrap();
        (adapter, ledger)
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[tokio::test]
    async fn test_archives_instead_of_dropping() {
        let (adapter, ledger) = setup().await;
        let engine = SafeRollbackEngine::new(Arc::clone(&adapter), ledger.clone());
        let migration = SqlMigration::new(
            "0007_orders",
            "",
            "ALTER TABLE orders DROP COLUMN legacy_code;\nDROP TABLE sessions;",
        );

        let report = engine.rollback_at(&migration, at()).await.unwrap();
        assert_eq!(report.stamp, "20240309_140500");
        assert_eq!(
            report.archived_columns,
            vec![ArchivedArtifact {
                table: "orders".into(),
                column: Some("legacy_code".into()),
                archived_as: "_archived_legacy_code_20240309_140500".into(),
            }]
        );
        assert_eq!(report.archived_tables[0].archived_as, "_archived_sessions_20240309_140500");

        assert!(!adapter.has_column("orders", "legacy_code").await.unwrap());
        assert_eq!(
            adapter
                .count_non_null("orders", "_archived_legacy_code_20240309_140500")
                .await
                .unwrap(),
            2
        );
        assert!(adapter.has_table("_archived_sessions_20240309_140500").await.unwrap());
        assert!(!adapter.has_table("sessions").await.unwrap());
        assert!(!ledger.contains("0007_orders"));
    }

    #[tokio::test]
    async fn test_missing_targets_are_skipped() {
        let (adapter, ledger) = setup().await;
        let engine = SafeRollbackEngine::new(Arc::clone(&adapter), ledger.clone());
        let migration = OperationMigration::new("0007_orders")
            .down(SchemaOperation::drop_column("orders", "gone"))
            .down(SchemaOperation::drop_table("ghost"));

        let report = engine.rollback_at(&migration, at()).await.unwrap();
        assert!(!report.archived_anything());
        assert_eq!(report.skipped, vec!["orders.gone".to_string(), "ghost".to_string()]);
        assert!(!ledger.contains("0007_orders"));
    }

    #[tokio::test]
    async fn test_rename_failure_keeps_ledger() {
        let (adapter, ledger) = setup().await;
        // The archive name is already taken, so the rename fails.
        adapter
            .execute("CREATE TABLE _archived_sessions_20240309_140500 (id INTEGER)")
            .await
            .unwrap();
        let engine = SafeRollbackEngine::new(Arc::clone(&adapter), ledger.clone());
        let migration = SqlMigration::new("0007_orders", "", "DROP TABLE sessions;");

        let err = engine.rollback_at(&migration, at()).await.unwrap_err();
        assert!(matches!(err, MigrationError::Rollback { .. }));
        assert!(ledger.contains("0007_orders"));
        assert!(adapter.has_table("sessions").await.unwrap());
    }

    #[tokio::test]
    async fn test_custom_prefixes() {
        let (adapter, ledger) = setup().await;
        let engine = SafeRollbackEngine::new(Arc::clone(&adapter), ledger)
            .with_naming(ArchiveNaming::new("zz_", "old_"));
        let migration = SqlMigration::new("0007_orders", "", "ALTER TABLE orders DROP COLUMN legacy_code;");

        let report = engine.rollback_at(&migration, at()).await.unwrap();
        assert_eq!(report.archived_columns[0].archived_as, "old_legacy_code_20240309_140500");
    }
}
