//! Error types for safe migration, rollback, snapshots and cleanup.

use schemaguard_adapter::AdapterError;
use thiserror::Error;

use crate::backup::RestorationResult;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during safe migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Adapter, connection or driver error.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Backup capture failed; nothing was executed.
    #[error("Backup of table '{table}' failed: {message}")]
    BackupCapture {
        /// Table being captured.
        table: String,
        /// Underlying message.
        message: String,
    },

    /// The forward operation of a migration failed.
    ///
    /// Restoration of the captured tables has already been attempted; its
    /// per-table outcomes are attached.
    #[error("Migration '{migration}' failed: {source}")]
    Execution {
        /// Migration name.
        migration: String,
        /// The original failure.
        source: Box<MigrationError>,
        /// Outcome of restoring each captured table, in capture order.
        restoration: Vec<RestorationResult>,
    },

    /// An archival rename failed during rollback.
    #[error("Rollback of '{migration}' failed: {message}")]
    Rollback {
        /// Migration name.
        migration: String,
        /// Underlying message.
        message: String,
    },

    /// A snapshot does not exist.
    #[error("Snapshot '{0}' not found")]
    SnapshotNotFound(String),

    /// A snapshot with this name already exists.
    #[error("Snapshot '{0}' already exists")]
    SnapshotExists(String),

    /// A snapshot name cannot be used as a file name in the store.
    #[error("Invalid snapshot name '{0}'")]
    InvalidSnapshotName(String),

    /// Restoring from a snapshot is not supported.
    #[error("Restoring snapshot '{0}' is not supported")]
    RestoreUnsupported(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid migration source.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// The migration ledger could not be updated.
    #[error("Ledger error: {0}")]
    Ledger(String),
}

impl MigrationError {
    /// Create a backup capture error.
    pub fn backup_capture(table: impl Into<String>, message: impl ToString) -> Self {
        Self::BackupCapture {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a rollback error.
    pub fn rollback(migration: impl Into<String>, message: impl ToString) -> Self {
        Self::Rollback {
            migration: migration.into(),
            message: message.to_string(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl ToString) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid migration error.
    pub fn invalid_migration(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create a ledger error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    /// Per-table restoration outcomes, if this is an execution failure.
    pub fn restoration(&self) -> Option<&[RestorationResult]> {
        match self {
            Self::Execution { restoration, .. } => Some(restoration),
            _ => None,
        }
    }

    /// True when an execution failure left at least one table unrestored.
    pub fn is_partially_restored(&self) -> bool {
        self.restoration()
            .is_some_and(|r| r.iter().any(|t| !t.is_restored()))
    }

    /// Check if nothing was mutated before the failure.
    pub fn is_before_mutation(&self) -> bool {
        matches!(
            self,
            Self::BackupCapture { .. } | Self::Adapter(AdapterError::Introspection { .. })
        )
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for MigrationError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for MigrationError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::SnapshotNotFound("nightly".to_string());
        assert_eq!(err.to_string(), "Snapshot 'nightly' not found");

        let err = MigrationError::rollback("0002_drop_code", "rename refused");
        assert_eq!(err.to_string(), "Rollback of '0002_drop_code' failed: rename refused");
    }

    #[test]
    fn test_execution_error_wraps_source() {
        let err = MigrationError::Execution {
            migration: "0003_bad".to_string(),
            source: Box::new(AdapterError::execution("SELEC 1", "syntax error").into()),
            restoration: vec![
                RestorationResult::restored("orders", 3),
                RestorationResult::failed("users", "table locked"),
            ],
        };
        assert!(err.to_string().contains("0003_bad"));
        assert!(err.to_string().contains("syntax error"));
        assert_eq!(err.restoration().map(<[_]>::len), Some(2));
        assert!(err.is_partially_restored());
    }

    #[test]
    fn test_before_mutation() {
        assert!(MigrationError::backup_capture("orders", "gone").is_before_mutation());
        assert!(!MigrationError::ledger("full").is_before_mutation());
    }
}
