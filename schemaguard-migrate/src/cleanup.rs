//! Retention-based deletion of archived tables and columns.
//!
//! Archive age comes only from the timestamp embedded in the name. Archived
//! columns are only looked for on live tables; an archived table is dropped as
//! a whole.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use schemaguard_adapter::DatabaseAdapter;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::ArchiveNaming;
use crate::config::CleanupConfig;
use crate::error::MigrateResult;

/// Whether a cleanup pass ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    /// Auto-cleanup is off.
    Disabled,
    /// Retention keeps archives forever.
    Skipped,
    /// The pass ran.
    Success,
}

/// One archived table past retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedTable {
    /// Archived table name.
    pub table: String,
    /// Name before archival.
    pub original: String,
    /// When it was archived.
    pub archived_at: DateTime<Utc>,
    /// Rows it held before deletion.
    pub rows: u64,
}

/// One archived column past retention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedColumn {
    /// Table holding the column.
    pub table: String,
    /// Archived column name.
    pub column: String,
    /// Name before archival.
    pub original: String,
    /// When it was archived.
    pub archived_at: DateTime<Utc>,
    /// Non-null values it held before deletion.
    pub values: u64,
}

/// An artifact that could not be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    /// Table, or `table.column`.
    pub target: String,
    /// Why.
    pub message: String,
}

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Whether the pass ran.
    pub status: CleanupStatus,
    /// Whether drops were only reported.
    pub dry_run: bool,
    /// Archived tables past retention.
    pub tables_cleaned: Vec<CleanedTable>,
    /// Archived columns past retention.
    pub columns_cleaned: Vec<CleanedColumn>,
    /// Rows held by the cleaned tables.
    pub total_rows_deleted: u64,
    /// Retention window in days.
    pub retention_days: i64,
    /// Archives older than this were eligible.
    pub cutoff_date: Option<DateTime<Utc>>,
    /// Drops that failed.
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    fn idle(status: CleanupStatus, dry_run: bool, retention_days: i64) -> Self {
        Self {
            status,
            dry_run,
            tables_cleaned: Vec::new(),
            columns_cleaned: Vec::new(),
            total_rows_deleted: 0,
            retention_days,
            cutoff_date: None,
            failures: Vec::new(),
        }
    }

    /// Whether nothing was eligible.
    pub fn is_empty(&self) -> bool {
        self.tables_cleaned.is_empty() && self.columns_cleaned.is_empty()
    }

    /// Whether the pass ran but some drops failed.
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// An archived column found during inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedColumnInfo {
    /// Table holding the column.
    pub table: String,
    /// Archived column name.
    pub column: String,
    /// When it was archived, if the name parses.
    pub archived_at: Option<DateTime<Utc>>,
}

/// An archived table found during inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedTableInfo {
    /// Archived table name.
    pub table: String,
    /// When it was archived, if the name parses.
    pub archived_at: Option<DateTime<Utc>>,
    /// Current row count.
    pub rows: u64,
}

/// Read-only inventory of archived artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStatistics {
    /// Archived tables.
    pub tables: Vec<ArchivedTableInfo>,
    /// Archived columns on live tables.
    pub columns: Vec<ArchivedColumnInfo>,
    /// Rows across archived tables.
    pub total_rows: u64,
}

/// Deletes archived artifacts past the retention window.
pub struct ArchiveCleanupService {
    adapter: Arc<dyn DatabaseAdapter>,
    naming: ArchiveNaming,
    config: CleanupConfig,
}

impl ArchiveCleanupService {
    /// Create a service.
    pub fn new(adapter: Arc<dyn DatabaseAdapter>, naming: ArchiveNaming, config: CleanupConfig) -> Self {
        Self {
            adapter,
            naming,
            config,
        }
    }

    /// Run a pass against the current time.
    pub async fn cleanup(&self, dry_run: bool) -> MigrateResult<CleanupReport> {
        self.cleanup_at(Utc::now(), dry_run).await
    }

    /// Run a pass as if the current time were `now`.
    ///
    /// Individual drop failures are collected in [`CleanupReport::failures`];
    /// introspection failures abort the pass.
    pub async fn cleanup_at(&self, now: DateTime<Utc>, dry_run: bool) -> MigrateResult<CleanupReport> {
        let retention = self.config.retention_days;
        if !self.config.auto_cleanup {
            debug!("Archive cleanup disabled");
            return Ok(CleanupReport::idle(CleanupStatus::Disabled, dry_run, retention));
        }
        if retention <= 0 {
            debug!("Archive retention keeps everything");
            return Ok(CleanupReport::idle(CleanupStatus::Skipped, dry_run, retention));
        }

        let Some(cutoff) = TimeDelta::try_days(retention).and_then(|d| now.checked_sub_signed(d)) else {
            debug!(retention_days = retention, "Archive retention reaches past the calendar");
            return Ok(CleanupReport::idle(CleanupStatus::Skipped, dry_run, retention));
        };
        let mut report = CleanupReport::idle(CleanupStatus::Success, dry_run, retention);
        report.cutoff_date = Some(cutoff);

        let tables = self.adapter.get_all_tables().await?;

        for table in tables.iter().filter(|t| self.naming.is_archived_table(t)) {
            let Some(parsed) = self.naming.parse_table(table) else {
                warn!(table = %table, "Archived table name has no timestamp, left in place");
                continue;
            };
            if parsed.archived_at >= cutoff {
                continue;
            }

            let rows = self.adapter.get_table_row_count(table).await?;
            if !dry_run {
                let sql = self.adapter.get_drop_table_sql(table);
                if let Err(e) = self.adapter.execute(&sql).await {
                    warn!(table = %table, error = %e, "Failed to drop archived table");
                    report.failures.push(CleanupFailure {
                        target: table.clone(),
                        message: e.to_string(),
                    });
                    continue;
                }
                info!(table = %table, rows = rows, "Dropped archived table");
            }
            report.total_rows_deleted += rows;
            report.tables_cleaned.push(CleanedTable {
                table: table.clone(),
                original: parsed.original,
                archived_at: parsed.archived_at,
                rows,
            });
        }

        for table in tables.iter().filter(|t| !self.naming.is_archived_table(t)) {
            for column in self.adapter.get_table_columns(table).await? {
                if !self.naming.is_archived_column(&column.name) {
                    continue;
                }
                let Some(parsed) = self.naming.parse_column(&column.name) else {
                    continue;
                };
                if parsed.archived_at >= cutoff {
                    continue;
                }

                let values = self.adapter.count_non_null(table, &column.name).await?;
                if !dry_run {
                    let sql = self.adapter.get_drop_column_sql(table, &column.name);
                    if let Err(e) = self.adapter.execute(&sql).await {
                        warn!(table = %table, column = %column.name, error = %e, "Failed to drop archived column");
                        report.failures.push(CleanupFailure {
                            target: format!("{}.{}", table, column.name),
                            message: e.to_string(),
                        });
                        continue;
                    }
                    info!(table = %table, column = %column.name, "Dropped archived column");
                }
                report.columns_cleaned.push(CleanedColumn {
                    table: table.clone(),
                    column: column.name.clone(),
                    original: parsed.original,
                    archived_at: parsed.archived_at,
                    values,
                });
            }
        }

        info!(
            tables = report.tables_cleaned.len(),
            columns = report.columns_cleaned.len(),
            rows = report.total_rows_deleted,
            dry_run = dry_run,
            "Archive cleanup finished"
        );
        Ok(report)
    }

    /// Inventory current archived artifacts without changing anything.
    pub async fn get_statistics(&self) -> MigrateResult<ArchiveStatistics> {
        let mut stats = ArchiveStatistics::default();
        for table in self.adapter.get_all_tables().await? {
            if self.naming.is_archived_table(&table) {
                let rows = self.adapter.get_table_row_count(&table).await?;
                stats.total_rows += rows;
                stats.tables.push(ArchivedTableInfo {
                    archived_at: self.naming.parse_table(&table).map(|p| p.archived_at),
                    table,
                    rows,
                });
                continue;
            }
            for column in self.adapter.get_table_columns(&table).await? {
                if self.naming.is_archived_column(&column.name) {
                    stats.columns.push(ArchivedColumnInfo {
                        table: table.clone(),
                        archived_at: self.naming.parse_column(&column.name).map(|p| p.archived_at),
                        column: column.name,
                    });
                }
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use schemaguard_adapter::{SqliteAdapter, SqliteConnection};

    async fn setup() -> Arc<dyn DatabaseAdapter> {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        let adapter: Arc<dyn DatabaseAdapter> = Arc::new(SqliteAdapter::new(Arc::new(conn)));
        for sql in [
            "CREATE TABLE _archived_customers_20200101_000000 (id INTEGER)",
            "INSERT INTO _archived_customers_20200101_000000 VALUES (1), (2), (3)",
            "CREATE TABLE _archived_carts_20240301_000000 (id INTEGER)",
            "CREATE TABLE _archived_junk (id INTEGER)",
            "CREATE TABLE orders (id INTEGER, _archived_code_20200101_000000 TEXT, _archived_note_20240301_000000 TEXT)",
            "INSERT INTO orders VALUES (1, 'a', NULL)",
        ] {
            adapter.execute(sql).await.unwrap();
        }
        adapter
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap()
    }

    fn service(adapter: &Arc<dyn DatabaseAdapter>, config: CleanupConfig) -> ArchiveCleanupService {
        ArchiveCleanupService::new(Arc::clone(adapter), ArchiveNaming::default(), config)
    }

    fn config(auto_cleanup: bool, retention_days: i64) -> CleanupConfig {
        CleanupConfig {
            auto_cleanup,
            retention_days,
        }
    }

    #[tokio::test]
    async fn test_disabled_and_skipped() {
        let adapter = setup().await;
        let report = service(&adapter, config(false, 7)).cleanup_at(now(), false).await.unwrap();
        assert_eq!(report.status, CleanupStatus::Disabled);
        assert!(report.is_empty());

        let report = service(&adapter, config(true, 0)).cleanup_at(now(), false).await.unwrap();
        assert_eq!(report.status, CleanupStatus::Skipped);
        assert_eq!(report.cutoff_date, None);
        assert!(adapter.has_table("_archived_customers_20200101_000000").await.unwrap());
    }

    #[tokio::test]
    async fn test_unrepresentable_retention_keeps_everything() {
        let adapter = setup().await;
        for retention in [i64::MAX / 2, i64::MAX] {
            let report = service(&adapter, config(true, retention)).cleanup_at(now(), false).await.unwrap();
            assert_eq!(report.status, CleanupStatus::Skipped);
            assert_eq!(report.cutoff_date, None);
        }
        assert!(adapter.has_table("_archived_customers_20200101_000000").await.unwrap());
    }

    #[tokio::test]
    async fn test_drops_stale_artifacts_only() {
        let adapter = setup().await;
        let service = service(&adapter, config(true, 7));

        let report = service.cleanup_at(now(), false).await.unwrap();
        assert_eq!(report.status, CleanupStatus::Success);
        assert_eq!(report.tables_cleaned.len(), 1);
        assert_eq!(report.tables_cleaned[0].original, "customers");
        assert_eq!(report.total_rows_deleted, 3);
        assert_eq!(report.columns_cleaned.len(), 1);
        assert_eq!(report.columns_cleaned[0].original, "code");
        assert_eq!(report.columns_cleaned[0].values, 1);
        assert_eq!(report.cutoff_date, Some(Utc.with_ymd_and_hms(2024, 2, 27, 0, 0, 0).unwrap()));

        assert!(!adapter.has_table("_archived_customers_20200101_000000").await.unwrap());
        assert!(adapter.has_table("_archived_carts_20240301_000000").await.unwrap());
        assert!(adapter.has_table("_archived_junk").await.unwrap());
        assert!(!adapter.has_column("orders", "_archived_code_20200101_000000").await.unwrap());
        assert!(adapter.has_column("orders", "_archived_note_20240301_000000").await.unwrap());

        let again = service.cleanup_at(now(), false).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(again.total_rows_deleted, 0);
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_dropping() {
        let adapter = setup().await;
        let report = service(&adapter, config(true, 7)).cleanup_at(now(), true).await.unwrap();
        assert!(report.dry_run);
        assert_eq!(report.tables_cleaned.len(), 1);
        assert_eq!(report.total_rows_deleted, 3);
        assert!(adapter.has_table("_archived_customers_20200101_000000").await.unwrap());
        assert!(adapter.has_column("orders", "_archived_code_20200101_000000").await.unwrap());
    }

    #[tokio::test]
    async fn test_statistics() {
        let adapter = setup().await;
        let stats = service(&adapter, config(true, 7)).get_statistics().await.unwrap();
        assert_eq!(stats.tables.len(), 3);
        assert_eq!(stats.total_rows, 3);
        assert_eq!(stats.columns.len(), 2);
        let junk = stats.tables.iter().find(|t| t.table == "_archived_junk").unwrap();
        assert_eq!(junk.archived_at, None);
    }
}
