//! Integration tests for schema snapshots and drift detection.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use schemaguard::migrate::{
    MigrationError, SNAPSHOT_FORMAT_VERSION, SafeMigrateConfig, SnapshotFormat, SnapshotManager,
};

fn config(dir: &std::path::Path, format: SnapshotFormat) -> SafeMigrateConfig {
    SafeMigrateConfig::default()
        .snapshot_path(dir.join("snapshots"))
        .snapshot_format(format)
        .environment("staging")
}

/// Two snapshots that differ only by an added table.
#[tokio::test]
async fn test_added_table_is_the_only_drift() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = common::sqlite_adapter().await;
    common::seed_orders(adapter.as_ref(), 10).await;

    let manager = SnapshotManager::from_config(Arc::clone(&adapter), &config(dir.path(), SnapshotFormat::Json));
    let before = manager.create(Some("before_audit")).await.unwrap();

    adapter
        .execute("CREATE TABLE audit_log (id INTEGER PRIMARY KEY, event TEXT NOT NULL)")
        .await
        .unwrap();
    let after = manager.create(Some("after_audit")).await.unwrap();
    assert_ne!(before.version, after.version);

    let diff = manager.compare("before_audit", "after_audit").await.unwrap();
    assert_eq!(diff.added_tables, vec!["audit_log".to_string()]);
    assert!(diff.removed_tables.is_empty());
    assert!(diff.modified_tables.is_empty());

    let reverse = manager.compare("after_audit", "before_audit").await.unwrap();
    assert_eq!(reverse.removed_tables, vec!["audit_log".to_string()]);

    assert!(dir.path().join("snapshots/before_audit.json").exists());
}

/// A snapshot compared with itself shows no drift.
#[tokio::test]
async fn test_self_comparison_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = common::sqlite_adapter().await;
    common::seed_orders(adapter.as_ref(), 3).await;

    let manager = SnapshotManager::from_config(Arc::clone(&adapter), &config(dir.path(), SnapshotFormat::Yaml));
    let snapshot = manager.create(None).await.unwrap();
    assert!(snapshot.name.starts_with("snapshot_"));

    let diff = manager.compare(&snapshot.name, &snapshot.name).await.unwrap();
    assert!(diff.is_empty());
    assert!(manager.compare_with_live(&snapshot.name).await.unwrap().is_empty());
}

/// What is read back equals what was written, in every storage format.
#[tokio::test]
async fn test_snapshot_round_trip_on_disk() {
    for format in SnapshotFormat::ALL {
        let dir = tempfile::tempdir().unwrap();
        let adapter = common::sqlite_adapter().await;
        common::seed_orders(adapter.as_ref(), 5).await;
        adapter
            .execute("CREATE TABLE people (id INTEGER PRIMARY KEY, nickname TEXT)")
            .await
            .unwrap();
        adapter
            .execute("INSERT INTO people (id, nickname) VALUES (1, NULL), (2, 'ace')")
            .await
            .unwrap();

        let config = config(dir.path(), format).include_data(true);
        let manager = SnapshotManager::from_config(Arc::clone(&adapter), &config);
        let created = manager.create(Some("nightly")).await.unwrap();

        assert_eq!(created.environment, "staging");
        assert_eq!(created.format_version.as_deref(), Some(SNAPSHOT_FORMAT_VERSION));
        assert_eq!(created.data.as_ref().map(|d| d["orders"].len()), Some(5));
        assert_eq!(
            created.data.as_ref().map(|d| d["people"][0]["nickname"].clone()),
            Some(serde_json::Value::Null)
        );

        let loaded = manager.get(&created.name).await.unwrap();
        assert_eq!(loaded, created, "format {}", format);
        assert_eq!(manager.get_latest().await.unwrap(), Some(created));
    }
}

/// The ledger table and archived tables stay out of snapshots; restore always fails.
#[tokio::test]
async fn test_system_and_archived_tables_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = common::sqlite_adapter().await;
    let config = config(dir.path(), SnapshotFormat::Toml);

    let ledger = schemaguard::migrate::AdapterLedger::with_table(Arc::clone(&adapter), &config.ledger_table);
    ledger.initialize().await.unwrap();
    adapter
        .execute("CREATE TABLE _archived_carts_20240101_000000 (id INTEGER)")
        .await
        .unwrap();
    adapter.execute("CREATE TABLE carts (id INTEGER)").await.unwrap();

    let manager = SnapshotManager::from_config(Arc::clone(&adapter), &config);
    let snapshot = manager.create(Some("scoped")).await.unwrap();
    let tables: Vec<&str> = snapshot.schema.tables.keys().map(String::as_str).collect();
    assert_eq!(tables, vec!["carts"]);

    assert!(matches!(
        manager.restore("scoped").await,
        Err(MigrationError::RestoreUnsupported(_))
    ));
    assert!(matches!(
        manager.get("missing").await,
        Err(MigrationError::SnapshotNotFound(_))
    ));
}

/// Snapshots are immutable and stay inside the snapshot directory.
#[tokio::test]
async fn test_snapshot_names_are_guarded() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = common::sqlite_adapter().await;
    let manager = SnapshotManager::from_config(Arc::clone(&adapter), &config(dir.path(), SnapshotFormat::Json));

    let baseline = manager.create(Some("baseline")).await.unwrap();
    adapter.execute("CREATE TABLE audit_log (id INTEGER)").await.unwrap();
    assert!(matches!(
        manager.create(Some("baseline")).await,
        Err(MigrationError::SnapshotExists(_))
    ));
    assert_eq!(manager.get("baseline").await.unwrap().version, baseline.version);

    assert!(matches!(
        manager.create(Some("../outside")).await,
        Err(MigrationError::InvalidSnapshotName(_))
    ));
    assert!(!dir.path().join("outside.json").exists());
}
