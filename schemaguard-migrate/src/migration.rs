//! Migration sources.
//!
//! A migration is either SQL text ([`SqlMigration`]) or a typed operation list
//! ([`OperationMigration`]). Both expose their forward and reverse source so the
//! analyzer can inspect them without running anything.

use std::path::{Path, PathBuf};

use schemaguard_adapter::DatabaseAdapter;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::analyzer::{MigrationScriptAnalyzer, ScriptAnalysis};
use crate::error::{MigrateResult, MigrationError};
use crate::operation::SchemaOperation;

/// Direction of a migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Forward.
    Up,
    /// Reverse.
    Down,
}

/// What a migration is made of, in one direction.
#[derive(Debug, Clone, Copy)]
pub enum MigrationSource<'a> {
    /// SQL text.
    Script(&'a str),
    /// Typed operations.
    Operations(&'a [SchemaOperation]),
}

impl MigrationSource<'_> {
    /// Analyze this source.
    pub fn analyze(&self, analyzer: &MigrationScriptAnalyzer) -> ScriptAnalysis {
        match self {
            Self::Script(sql) => analyzer.analyze_script(sql),
            Self::Operations(ops) => analyzer.analyze_operations(ops),
        }
    }

    /// Statements in the adapter's dialect, in execution order.
    pub fn statements(&self, adapter: &dyn DatabaseAdapter) -> Vec<String> {
        match self {
            Self::Script(sql) => split_dialect_statements(sql, adapter.backslash_escapes()),
            Self::Operations(ops) => ops.iter().map(|op| op.to_sql(adapter)).collect(),
        }
    }
}

/// A named, reversible schema change.
#[async_trait::async_trait]
pub trait Migration: Send + Sync {
    /// Unique name, recorded in the ledger.
    fn name(&self) -> &str;

    /// Source for one direction.
    fn source(&self, direction: Direction) -> MigrationSource<'_>;

    /// Run the forward operation.
    async fn up(&self, adapter: &dyn DatabaseAdapter) -> MigrateResult<()> {
        for statement in self.source(Direction::Up).statements(adapter) {
            adapter.execute(&statement).await?;
        }
        Ok(())
    }
}

/// A migration written as SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlMigration {
    name: String,
    up_sql: String,
    down_sql: String,
    path: Option<PathBuf>,
}

impl SqlMigration {
    /// Create a migration from SQL text.
    pub fn new(name: impl Into<String>, up_sql: impl Into<String>, down_sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
            path: None,
        }
    }

    /// Forward SQL.
    pub fn up_sql(&self) -> &str {
        &self.up_sql
    }

    /// Reverse SQL.
    pub fn down_sql(&self) -> &str {
        &self.down_sql
    }

    /// Directory the migration was loaded from.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// SHA-256 of the forward SQL, hex encoded.
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(self.up_sql.as_bytes()))
    }

    /// Load a migration from a directory holding `up.sql` and an optional `down.sql`.
    ///
    /// The directory name becomes the migration name.
    pub async fn load(dir: &Path) -> MigrateResult<Self> {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MigrationError::invalid_migration(format!("Invalid path: {}", dir.display()))
            })?
            .to_string();

        let up_sql = tokio::fs::read_to_string(dir.join("up.sql")).await?;
        let down_path = dir.join("down.sql");
        let down_sql = if tokio::fs::try_exists(&down_path).await? {
            tokio::fs::read_to_string(&down_path).await?
        } else {
            String::new()
        };

        Ok(Self {
            name,
            up_sql,
            down_sql,
            path: Some(dir.to_path_buf()),
        })
    }

    /// Load every migration directory under `root`, sorted by name.
    pub async fn load_all(root: &Path) -> MigrateResult<Vec<Self>> {
        let mut migrations = Vec::new();
        if !tokio::fs::try_exists(root).await? {
            return Ok(migrations);
        }

        let mut entries = tokio::fs::read_dir(root).await?;
        let mut dirs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() && tokio::fs::try_exists(path.join("up.sql")).await? {
                dirs.push(path);
            }
        }
        dirs.sort();

        for dir in dirs {
            migrations.push(Self::load(&dir).await?);
        }
        debug!(count = migrations.len(), root = %root.display(), "Loaded migrations");
        Ok(migrations)
    }
}

impl Migration for SqlMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self, direction: Direction) -> MigrationSource<'_> {
        match direction {
            Direction::Up => MigrationSource::Script(&self.up_sql),
            Direction::Down => MigrationSource::Script(&self.down_sql),
        }
    }
}

/// A migration written as typed operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationMigration {
    name: String,
    up: Vec<SchemaOperation>,
    down: Vec<SchemaOperation>,
}

impl OperationMigration {
    /// Create an empty migration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up: Vec::new(),
            down: Vec::new(),
        }
    }

    /// Append a forward operation.
    pub fn up(mut self, operation: SchemaOperation) -> Self {
        self.up.push(operation);
        self
    }

    /// Append a reverse operation.
    pub fn down(mut self, operation: SchemaOperation) -> Self {
        self.down.push(operation);
        self
    }

    /// Forward operations.
    pub fn up_operations(&self) -> &[SchemaOperation] {
        &self.up
    }

    /// Reverse operations.
    pub fn down_operations(&self) -> &[SchemaOperation] {
        &self.down
    }
}

impl Migration for OperationMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self, direction: Direction) -> MigrationSource<'_> {
        match direction {
            Direction::Up => MigrationSource::Operations(&self.up),
            Direction::Down => MigrationSource::Operations(&self.down),
        }
    }
}

/// Split a SQL script into statements on `;`.
///
/// Semicolons inside quoted strings, quoted identifiers and comments do not
/// split. Comments are dropped; empty statements are skipped.
pub fn split_statements(sql: &str) -> Vec<String> {
    split_dialect_statements(sql, false)
}

/// Like [`split_statements`], additionally treating a backslash as an escape
/// inside string literals when `backslash_escapes` is set (MySQL).
pub fn split_dialect_statements(sql: &str, backslash_escapes: bool) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                current.push(c);
                // A doubled quote is an escaped quote and keeps the literal open.
                while let Some(inner) = chars.next() {
                    current.push(inner);
                    if backslash_escapes && c != '`' && inner == '\\' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                        continue;
                    }
                    if inner == c {
                        if chars.peek() == Some(&c) {
                            if let Some(escaped) = chars.next() {
                                current.push(escaped);
                            }
                        } else {
                            break;
                        }
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                for inner in chars.by_ref() {
                    if inner == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for inner in chars.by_ref() {
                    if prev == '*' && inner == '/' {
                        break;
                    }
                    prev = inner;
                }
                current.push(' ');
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_statements() {
        let sql = "CREATE TABLE a (id INT);\n\nINSERT INTO a VALUES (1);\n";
        assert_eq!(
            split_statements(sql),
            vec!["CREATE TABLE a (id INT)", "INSERT INTO a VALUES (1)"]
        );
    }

    #[test]
    fn test_split_respects_quotes() {
        let sql = "INSERT INTO notes VALUES ('a;b', 'it''s; fine');\nSELECT \"odd;name\" FROM t";
        assert_eq!(
            split_statements(sql),
            vec![
                "INSERT INTO notes VALUES ('a;b', 'it''s; fine')",
                "SELECT \"odd;name\" FROM t",
            ]
        );
    }

    #[test]
    fn test_split_backslash_escapes() {
        let sql = r"INSERT INTO notes VALUES ('it\'s; fine', 'c:\\');SELECT 1";
        assert_eq!(
            split_dialect_statements(sql, true),
            vec![r"INSERT INTO notes VALUES ('it\'s; fine', 'c:\\')", "SELECT 1"]
        );
        assert_eq!(split_statements(r"SELECT 'c:\';SELECT 2"), vec![r"SELECT 'c:\'", "SELECT 2"]);
    }

    #[test]
    fn test_split_drops_comments() {
        let sql = "-- header; not a statement\nDROP TABLE a; /* trailing; block */\n-- only a comment;";
        assert_eq!(split_statements(sql), vec!["DROP TABLE a"]);
    }

    #[test]
    fn test_sources_by_direction() {
        let migration = SqlMigration::new(
            "0001_legacy",
            "ALTER TABLE orders ADD COLUMN legacy_code TEXT;",
            "ALTER TABLE orders DROP COLUMN legacy_code;",
        );
        let analyzer = MigrationScriptAnalyzer::new();
        assert!(!migration.source(Direction::Up).analyze(&analyzer).is_destructive());
        assert!(migration.source(Direction::Down).analyze(&analyzer).is_destructive());
        assert_eq!(migration.checksum().len(), 64);
    }

    #[test]
    fn test_operation_migration_builder() {
        let migration = OperationMigration::new("0002_sessions")
            .up(SchemaOperation::drop_table("sessions"))
            .down(SchemaOperation::rename_table("a", "b"));
        assert_eq!(migration.up_operations().len(), 1);
        assert_eq!(migration.down_operations().len(), 1);
        assert!(matches!(migration.source(Direction::Up), MigrationSource::Operations(ops) if ops.len() == 1));
    }

    #[tokio::test]
    async fn test_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for (name, down) in [("0002_second", false), ("0001_first", true)] {
            let path = dir.path().join(name);
            tokio::fs::create_dir_all(&path).await.unwrap();
            tokio::fs::write(path.join("up.sql"), "SELECT 1;").await.unwrap();
            if down {
                tokio::fs::write(path.join("down.sql"), "SELECT 2;").await.unwrap();
            }
        }
        tokio::fs::create_dir_all(dir.path().join("not_a_migration")).await.unwrap();

        let migrations = SqlMigration::load_all(dir.path()).await.unwrap();
        let names: Vec<&str> = migrations.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["0001_first", "0002_second"]);
        assert_eq!(migrations[0].down_sql(), "SELECT 2;");
        assert_eq!(migrations[1].down_sql(), "");
    }

    #[tokio::test]
    async fn test_load_all_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = SqlMigration::load_all(&dir.path().join("missing")).await.unwrap();
        assert!(migrations.is_empty());
    }
}
