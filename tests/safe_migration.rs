//! Integration tests for safe execution and archival rollback.
//!
//! These run against an in-memory SQLite database through the default adapter.

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use schemaguard::adapter::connection::row_str;
use schemaguard::migrate::{
    AdapterLedger, ArchiveNaming, MigrationError, MigrationLedger, OperationMigration, RunOutcome,
    SafeMigrationExecutor, SafeRollbackEngine, SchemaOperation, SqlMigration,
};

fn legacy_code_migration() -> SqlMigration {
    SqlMigration::new(
        "0001_legacy_code",
        "ALTER TABLE orders ADD COLUMN legacy_code TEXT;\n\
         UPDATE orders SET legacy_code = 'LC-' || id;",
        "ALTER TABLE orders DROP COLUMN legacy_code;",
    )
}

/// Run a migration, roll it back, and find the dropped column archived with its data.
#[tokio::test]
async fn test_rollback_archives_dropped_column_with_data() {
    let adapter = common::sqlite_adapter().await;
    common::seed_orders(adapter.as_ref(), 500).await;

    let ledger = Arc::new(AdapterLedger::new(Arc::clone(&adapter)));
    ledger.initialize().await.unwrap();

    let migration = legacy_code_migration();
    let executor = SafeMigrationExecutor::new(Arc::clone(&adapter), ledger.clone());
    let report = executor.run(&migration, 1).await.unwrap();
    assert_eq!(report.backed_up_rows, 500);
    assert_eq!(ledger.entries().await.unwrap().len(), 1);

    let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 15).unwrap();
    let rollback = SafeRollbackEngine::new(Arc::clone(&adapter), ledger.clone())
        .rollback_at(&migration, at)
        .await
        .unwrap();

    let archived = "_archived_legacy_code_20240601_083015";
    assert_eq!(rollback.archived_columns.len(), 1);
    assert_eq!(rollback.archived_columns[0].archived_as, archived);

    assert!(!adapter.has_column("orders", "legacy_code").await.unwrap());
    assert!(adapter.has_column("orders", archived).await.unwrap());
    assert_eq!(adapter.get_table_row_count("orders").await.unwrap(), 500);

    let rows = adapter.fetch_rows("orders").await.unwrap();
    assert_eq!(rows.len(), 500);
    for row in &rows {
        let id = row["id"].as_i64().unwrap();
        assert_eq!(row_str(row, archived), Some(format!("LC-{}", id)));
    }

    let parsed = ArchiveNaming::default().parse_column(archived).unwrap();
    assert_eq!(parsed.original, "legacy_code");
    assert_eq!(parsed.archived_at, at);

    assert!(ledger.entries().await.unwrap().is_empty());
}

/// A failing forward operation leaves every captured table as it was.
#[tokio::test]
async fn test_failed_migration_restores_structure_and_rows() {
    let adapter = common::sqlite_adapter().await;
    common::seed_orders(adapter.as_ref(), 120).await;
    adapter
        .execute("CREATE INDEX idx_orders_total ON orders (total)")
        .await
        .unwrap();

    let columns_before = adapter.get_table_columns("orders").await.unwrap();
    let indexes_before = adapter.get_table_indexes("orders").await.unwrap();

    let ledger = Arc::new(AdapterLedger::new(Arc::clone(&adapter)));
    ledger.initialize().await.unwrap();
    let executor = SafeMigrationExecutor::new(Arc::clone(&adapter), ledger.clone());

    let migration = SqlMigration::new(
        "0002_broken",
        "DROP INDEX idx_orders_total;\n\
         ALTER TABLE orders ADD COLUMN note TEXT;\n\
         DELETE FROM orders WHERE id > 10;\n\
         INSERT INTO missing_table VALUES (1);",
        "",
    );

    let err = executor.run(&migration, 1).await.unwrap_err();
    match &err {
        MigrationError::Execution { migration, restoration, .. } => {
            assert_eq!(migration, "0002_broken");
            assert_eq!(restoration.len(), 1);
            assert!(restoration[0].is_restored());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_partially_restored());

    assert_eq!(adapter.get_table_columns("orders").await.unwrap(), columns_before);
    assert_eq!(adapter.get_table_indexes("orders").await.unwrap(), indexes_before);
    assert_eq!(adapter.get_table_row_count("orders").await.unwrap(), 120);
    assert!(ledger.entries().await.unwrap().is_empty());
}

/// Pretend mode plans from typed operations and changes nothing.
#[tokio::test]
async fn test_pretend_plans_typed_operations() {
    let adapter = common::sqlite_adapter().await;
    common::seed_orders(adapter.as_ref(), 40).await;

    let ledger = Arc::new(schemaguard::migrate::MemoryLedger::new());
    let executor = SafeMigrationExecutor::new(Arc::clone(&adapter), ledger.clone());
    let migration = OperationMigration::new("0003_drop_orders").up(SchemaOperation::drop_table("orders"));

    let RunOutcome::Planned(plan) = executor.run_safe(&migration, 2, true).await.unwrap() else {
        panic!("pretend must not apply");
    };
    assert_eq!(plan.statements, vec!["DROP TABLE IF EXISTS \"orders\"".to_string()]);
    assert_eq!(plan.data_loss.total_rows(), 40);
    assert!(plan.estimated_duration() > std::time::Duration::ZERO);

    assert!(adapter.has_table("orders").await.unwrap());
    assert!(ledger.entries().is_empty());

    let RunOutcome::Applied(report) = executor.run_safe(&migration, 2, false).await.unwrap() else {
        panic!("expected the migration to apply");
    };
    assert_eq!(report.batch, 2);
    assert!(!adapter.has_table("orders").await.unwrap());
    assert!(ledger.contains("0003_drop_orders"));

    ledger.delete("0003_drop_orders").await.unwrap();
    assert!(ledger.entries().is_empty());
}
