//! Configuration for safe migrations, archives, cleanup and snapshots.

use std::path::{Path, PathBuf};

use schemaguard_adapter::DriverConfig;
use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;
use crate::snapshot::SnapshotFormat;

/// Default name of the table-backed migration ledger.
pub const DEFAULT_LEDGER_TABLE: &str = "_schemaguard_migrations";

/// Top-level configuration.
///
/// Every section is optional in TOML; missing keys fall back to defaults.
///
/// ```toml
/// [archive]
/// table_prefix = "_archived_"
///
/// [cleanup]
/// retention_days = 7
///
/// [snapshots]
/// path = "database/snapshots"
/// format = "yaml"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeMigrateConfig {
    /// Table used by [`AdapterLedger`](crate::AdapterLedger).
    pub ledger_table: String,
    /// Enabled drivers.
    pub drivers: DriverConfig,
    /// Archive naming.
    pub archive: ArchiveConfig,
    /// Archive retention.
    pub cleanup: CleanupConfig,
    /// Snapshot storage and capture.
    pub snapshots: SnapshotConfig,
    /// Forward execution.
    pub execution: ExecutionConfig,
}

impl Default for SafeMigrateConfig {
    fn default() -> Self {
        Self {
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            drivers: DriverConfig::default(),
            archive: ArchiveConfig::default(),
            cleanup: CleanupConfig::default(),
            snapshots: SnapshotConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl SafeMigrateConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> MigrateResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Set the driver configuration.
    pub fn drivers(mut self, drivers: DriverConfig) -> Self {
        self.drivers = drivers;
        self
    }

    /// Set the archive table prefix.
    pub fn archive_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.archive.table_prefix = prefix.into();
        self
    }

    /// Set the archive column prefix.
    pub fn archive_column_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.archive.column_prefix = prefix.into();
        self
    }

    /// Enable or disable automatic archive cleanup.
    pub fn auto_cleanup(mut self, enabled: bool) -> Self {
        self.cleanup.auto_cleanup = enabled;
        self
    }

    /// Set the archive retention in days. Zero or negative keeps archives forever.
    pub fn retention_days(mut self, days: i64) -> Self {
        self.cleanup.retention_days = days;
        self
    }

    /// Set the snapshot directory.
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshots.path = path.into();
        self
    }

    /// Set the snapshot storage format.
    pub fn snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshots.format = format;
        self
    }

    /// Set how many snapshots are kept.
    pub fn max_snapshots(mut self, max: usize) -> Self {
        self.snapshots.max_snapshots = max;
        self
    }

    /// Embed row data in snapshots of small tables.
    pub fn include_data(mut self, include: bool) -> Self {
        self.snapshots.include_data = include;
        self
    }

    /// Set the environment label stamped on snapshots.
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.snapshots.environment = environment.into();
        self
    }

    /// Set the transaction policy for forward execution.
    pub fn transaction_policy(mut self, policy: TransactionPolicy) -> Self {
        self.execution.transaction_policy = policy;
        self
    }

    /// Set the ledger table name.
    pub fn ledger_table(mut self, table: impl Into<String>) -> Self {
        self.ledger_table = table.into();
        self
    }
}

/// Prefixes for archived tables and columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Prefix for archived tables.
    pub table_prefix: String,
    /// Prefix for archived columns.
    pub column_prefix: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            table_prefix: "_archived_".to_string(),
            column_prefix: "_archived_".to_string(),
        }
    }
}

/// Retention of archived artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Whether cleanup runs at all.
    pub auto_cleanup: bool,
    /// Age in days after which archives are deleted. Zero or negative keeps them forever.
    pub retention_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_cleanup: true,
            retention_days: 30,
        }
    }
}

/// Snapshot storage and capture options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Directory holding snapshot files.
    pub path: PathBuf,
    /// Storage format of new snapshots.
    pub format: SnapshotFormat,
    /// Number of snapshots kept; older ones are deleted first.
    pub max_snapshots: usize,
    /// Embed row data for small tables.
    pub include_data: bool,
    /// Table-name glob patterns excluded from capture.
    pub ignore_tables: Vec<String>,
    /// Environment label stamped on snapshots.
    pub environment: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("database/snapshots"),
            format: SnapshotFormat::default(),
            max_snapshots: 10,
            include_data: false,
            ignore_tables: vec!["_archived_*".to_string()],
            environment: "production".to_string(),
        }
    }
}

/// Forward execution options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Whether forward operations are wrapped in a transaction.
    pub transaction_policy: TransactionPolicy,
}

/// Whether the executor wraps a migration's forward operation in a transaction.
///
/// Restoration from backups runs regardless of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPolicy {
    /// Never open a transaction; the caller decides.
    #[default]
    Never,
    /// Open one when the driver rolls back DDL transactionally.
    WhenSupported,
}

impl TransactionPolicy {
    /// Whether to open a transaction on a driver with the given DDL capability.
    pub fn applies(&self, transactional_ddl: bool) -> bool {
        matches!(self, Self::WhenSupported) && transactional_ddl
    }
}
