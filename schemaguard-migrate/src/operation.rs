//! Typed schema operations.
//!
//! A migration built from [`SchemaOperation`]s is analyzed exactly: the
//! operation list names every table and column it touches, so nothing is
//! inferred from SQL text.

use schemaguard_adapter::{ColumnDefinition, DatabaseAdapter, IndexDefinition, OperationKind};
use serde::{Deserialize, Serialize};

/// One structural change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOperation {
    /// Create a table.
    CreateTable {
        /// Table name.
        table: String,
        /// Column definitions.
        columns: Vec<ColumnDefinition>,
    },
    /// Drop a table.
    DropTable {
        /// Table name.
        table: String,
    },
    /// Rename a table.
    RenameTable {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Add a column.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnDefinition,
    },
    /// Drop a column.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },
    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: IndexDefinition,
    },
    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
    },
    /// A statement outside the structural vocabulary, with the tables it touches declared.
    RawSql {
        /// The statement.
        sql: String,
        /// Tables the statement reads or writes.
        tables: Vec<String>,
    },
}

impl SchemaOperation {
    /// Create a table.
    pub fn create_table(table: impl Into<String>, columns: Vec<ColumnDefinition>) -> Self {
        Self::CreateTable {
            table: table.into(),
            columns,
        }
    }

    /// Drop a table.
    pub fn drop_table(table: impl Into<String>) -> Self {
        Self::DropTable {
            table: table.into(),
        }
    }

    /// Rename a table.
    pub fn rename_table(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::RenameTable {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Add a column.
    pub fn add_column(table: impl Into<String>, column: ColumnDefinition) -> Self {
        Self::AddColumn {
            table: table.into(),
            column,
        }
    }

    /// Drop a column.
    pub fn drop_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::DropColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Rename a column.
    pub fn rename_column(
        table: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::RenameColumn {
            table: table.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an index.
    pub fn create_index(table: impl Into<String>, index: IndexDefinition) -> Self {
        Self::CreateIndex {
            table: table.into(),
            index,
        }
    }

    /// Drop an index.
    pub fn drop_index(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self::DropIndex {
            table: table.into(),
            index: index.into(),
        }
    }

    /// A raw statement touching the given tables.
    pub fn raw_sql<I, S>(sql: impl Into<String>, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RawSql {
            sql: sql.into(),
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// Operation kind used for duration estimates. Raw SQL has none.
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            Self::CreateTable { .. } => Some(OperationKind::CreateTable),
            Self::DropTable { .. } => Some(OperationKind::DropTable),
            Self::RenameTable { .. } => Some(OperationKind::RenameTable),
            Self::AddColumn { .. } => Some(OperationKind::AddColumn),
            Self::DropColumn { .. } => Some(OperationKind::DropColumn),
            Self::RenameColumn { .. } => Some(OperationKind::RenameColumn),
            Self::CreateIndex { .. } => Some(OperationKind::AddIndex),
            Self::DropIndex { .. } => Some(OperationKind::DropIndex),
            Self::RawSql { .. } => None,
        }
    }

    /// Tables this operation touches.
    pub fn tables(&self) -> Vec<&str> {
        match self {
            Self::CreateTable { table, .. }
            | Self::DropTable { table }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. } => vec![table.as_str()],
            Self::RenameTable { from, to } => vec![from.as_str(), to.as_str()],
            Self::RawSql { tables, .. } => tables.iter().map(String::as_str).collect(),
        }
    }

    /// The table whose row count drives this operation's cost.
    pub fn primary_table(&self) -> Option<&str> {
        self.tables().into_iter().next()
    }

    /// Whether the operation destroys stored data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropTable { .. } | Self::DropColumn { .. })
    }

    /// Render the operation as a statement in the adapter's dialect.
    pub fn to_sql(&self, adapter: &dyn DatabaseAdapter) -> String {
        match self {
            Self::CreateTable { table, columns } => adapter.get_create_table_sql(table, columns),
            Self::DropTable { table } => adapter.get_drop_table_sql(table),
            Self::RenameTable { from, to } => adapter.get_rename_table_sql(from, to),
            Self::AddColumn { table, column } => adapter.get_add_column_sql(table, column),
            Self::DropColumn { table, column } => adapter.get_drop_column_sql(table, column),
            Self::RenameColumn { table, from, to } => {
                adapter.get_rename_column_sql(table, from, to)
            }
            Self::CreateIndex { table, index } => adapter.get_create_index_sql(table, index),
            Self::DropIndex { table, index } => adapter.get_drop_index_sql(table, index),
            Self::RawSql { sql, .. } => sql.clone(),
        }
    }

    /// Short human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::CreateTable { table, .. } => format!("create table {}", table),
            Self::DropTable { table } => format!("drop table {}", table),
            Self::RenameTable { from, to } => format!("rename table {} to {}", from, to),
            Self::AddColumn { table, column } => format!("add column {}.{}", table, column.name),
            Self::DropColumn { table, column } => format!("drop column {}.{}", table, column),
            Self::RenameColumn { table, from, to } => {
                format!("rename column {}.{} to {}", table, from, to)
            }
            Self::CreateIndex { table, index } => format!("create index {} on {}", index.name, table),
            Self::DropIndex { table, index } => format!("drop index {} on {}", index, table),
            Self::RawSql { tables, .. } => format!("raw sql on [{}]", tables.join(", ")),
        }
    }
}
