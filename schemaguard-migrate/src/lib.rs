//! # schemaguard-migrate
//!
//! Schema changes that never lose data.
//!
//! This crate provides:
//! - Static analysis of migrations: which tables and columns they touch and
//!   how many rows a drop would destroy
//! - Safe execution: affected tables are backed up in memory before the
//!   forward operation runs and restored if it fails
//! - Safe rollback: drops in a migration's reverse direction become
//!   timestamped archival renames
//! - Schema snapshots with content versioning, retention and drift reports
//! - Retention-based cleanup of archived tables and columns
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────────┐
//! │  Migration   │────▶│    Analyzer    │────▶│   BackupSet     │
//! │ SQL or ops   │     │ tables/columns │     │ structure+rows  │
//! └──────────────┘     └────────────────┘     └─────────────────┘
//!        │                                             │
//!        ▼                                             ▼
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────────┐
//! │   Rollback   │────▶│ _archived_*_ts │◀────│ Executor: run,  │
//! │ archive only │     │   artifacts    │     │ restore, ledger │
//! └──────────────┘     └────────────────┘     └─────────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐     ┌─────────────────┐
//!                      │    Cleanup     │     │   Snapshots     │
//!                      │  retention     │     │ capture / diff  │
//!                      └────────────────┘     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use schemaguard_adapter::{AdapterFactory, SqliteConnection};
//! use schemaguard_migrate::{
//!     AdapterLedger, SafeMigrateConfig, SafeMigrationExecutor, SafeRollbackEngine, SqlMigration,
//! };
//!
//! let config = SafeMigrateConfig::load("schemaguard.toml".as_ref())?;
//! let factory = AdapterFactory::new(config.drivers.clone());
//! let adapter = factory.default_adapter(Arc::new(SqliteConnection::open("app.db").await?))?;
//!
//! let ledger = Arc::new(AdapterLedger::with_table(adapter.clone(), &config.ledger_table));
//! ledger.initialize().await?;
//!
//! let migration = SqlMigration::load("migrations/20240101_orders".as_ref()).await?;
//! let executor = SafeMigrationExecutor::new(adapter.clone(), ledger.clone())
//!     .with_transaction_policy(config.execution.transaction_policy);
//! executor.run(&migration, 1).await?;
//!
//! // Later: undo without losing the dropped data.
//! let report = SafeRollbackEngine::new(adapter, ledger).rollback(&migration).await?;
//! println!("archived {} columns", report.archived_columns.len());
//! ```
//!
//! ## Migration Files
//!
//! SQL migrations are directories with an `up.sql` and an optional `down.sql`:
//!
//! ```text
//! migrations/
//! ├── 20240101120000_orders/
//! │   ├── up.sql
//! │   └── down.sql
//! └── 20240102090000_audit_log/
//!     └── up.sql
//! ```

pub mod analyzer;
pub mod archive;
pub mod backup;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod migration;
pub mod operation;
pub mod rollback;
pub mod snapshot;

pub use analyzer::{
    ColumnDrop, DataLossEstimate, DataLossItem, MigrationScriptAnalyzer, ScriptAnalysis, TableRename,
};
pub use archive::{ARCHIVE_TIMESTAMP_FORMAT, ArchiveNaming, ArchivedName};
pub use backup::{BackupRecord, BackupSet, RestorationResult, RestorationStatus};
pub use cleanup::{
    ArchiveCleanupService, ArchiveStatistics, ArchivedColumnInfo, ArchivedTableInfo, CleanedColumn,
    CleanedTable, CleanupFailure, CleanupReport, CleanupStatus,
};
pub use config::{
    ArchiveConfig, CleanupConfig, DEFAULT_LEDGER_TABLE, ExecutionConfig, SafeMigrateConfig,
    SnapshotConfig, TransactionPolicy,
};
pub use error::{MigrateResult, MigrationError};
pub use executor::{
    ExecutionPlan, ExecutionReport, ExecutionState, OperationEstimate, RunOutcome,
    SafeMigrationExecutor,
};
pub use ledger::{AdapterLedger, LedgerEntry, MemoryLedger, MigrationLedger};
pub use migration::{
    Direction, Migration, MigrationSource, OperationMigration, SqlMigration, split_dialect_statements,
    split_statements,
};
pub use operation::SchemaOperation;
pub use rollback::{ArchivedArtifact, RollbackReport, SafeRollbackEngine};
pub use snapshot::{
    ArtifactStore, FileStore, FormatVersionMismatchWarning, MemoryStore, SNAPSHOT_FORMAT_VERSION,
    SnapshotDiff, SnapshotDocument, SnapshotFormat, SnapshotManager,
};
