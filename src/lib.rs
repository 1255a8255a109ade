//! # Schemaguard
//!
//! Schema changes without irrecoverable data loss.
//!
//! Schemaguard provides:
//! - Driver-correct DDL and live introspection for MySQL, PostgreSQL and SQLite
//! - Migration analysis that reports affected tables and rows at risk
//! - Execution that backs up affected tables first and restores them on failure
//! - Rollbacks that archive dropped tables and columns instead of deleting them
//! - Versioned schema snapshots with drift reports
//! - Retention-based cleanup of archived artifacts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use schemaguard::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), schemaguard::MigrationError> {
//!     let conn = Arc::new(SqliteConnection::open("app.db").await?);
//!     let adapter = AdapterFactory::default().default_adapter(conn)?;
//!     let ledger = Arc::new(MemoryLedger::new());
//!
//!     let migration = SqlMigration::new(
//!         "0001_drop_legacy",
//!         "ALTER TABLE orders DROP COLUMN legacy_code;",
//!         "",
//!     );
//!
//!     let executor = SafeMigrationExecutor::new(adapter, ledger);
//!     if let RunOutcome::Planned(plan) = executor.run_safe(&migration, 1, true).await? {
//!         println!("{}", plan.summary());
//!     }
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

/// Adapters, connections and the adapter factory.
pub mod adapter {
    pub use schemaguard_adapter::*;
}

/// Analysis, execution, rollback, snapshots and cleanup.
pub mod migrate {
    pub use schemaguard_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::adapter::{AdapterFactory, DatabaseAdapter, DriverConfig};
    #[cfg(feature = "sqlite")]
    pub use crate::adapter::SqliteConnection;
    pub use crate::migrate::{
        ArchiveCleanupService, ArchiveNaming, MemoryLedger, Migration, OperationMigration,
        RunOutcome, SafeMigrateConfig, SafeMigrationExecutor, SafeRollbackEngine, SchemaOperation,
        SnapshotManager, SqlMigration,
    };
}

// Re-export key types at the crate root
pub use schemaguard_adapter::{AdapterError, AdapterResult};
pub use schemaguard_migrate::{MigrateResult, MigrationError};
