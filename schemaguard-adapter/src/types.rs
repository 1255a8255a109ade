//! Schema facts read from a live database and the DDL vocabulary used to change it.

use serde::{Deserialize, Serialize};

/// An introspected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Declared type, as the driver reports it.
    #[serde(rename = "type")]
    pub data_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// An introspected index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Participating columns, in key order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
    /// Whether this index backs the primary key.
    pub primary: bool,
}

/// An introspected foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// ON DELETE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    /// ON UPDATE action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
}

/// Portable column type, rendered per dialect by the adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInteger,
    SmallInteger,
    Boolean,
    Float,
    Double,
    Decimal { precision: u32, scale: u32 },
    String(Option<u32>),
    Text,
    Date,
    Timestamp,
    Json,
    Binary,
    Uuid,
    /// Driver-specific type passed through verbatim.
    Raw(String),
}

/// A column to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value expression, emitted verbatim.
    pub default: Option<String>,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
    /// Whether the column auto-increments.
    pub auto_increment: bool,
}

impl ColumnDefinition {
    /// Create a nullable column of the given type.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
            primary_key: false,
            auto_increment: false,
        }
    }

    /// An auto-incrementing integer primary key.
    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
            .not_null()
            .primary_key()
            .auto_increment()
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Set a default expression.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Mark the column as primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark the column as auto-incrementing.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

/// An index to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name.
    pub name: String,
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Whether the index is unique.
    pub unique: bool,
}

impl IndexDefinition {
    /// Create a non-unique index.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// Kinds of structural operation, used for duration estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    CreateTable,
    DropTable,
    RenameTable,
    AddColumn,
    DropColumn,
    RenameColumn,
    AddIndex,
    DropIndex,
}

impl OperationKind {
    /// Fixed cost and per-row cost, both in milliseconds.
    pub fn cost_model(&self) -> (f64, f64) {
        match self {
            Self::CreateTable => (5.0, 0.0),
            Self::DropTable => (5.0, 0.0001),
            Self::RenameTable => (5.0, 0.0),
            Self::AddColumn | Self::DropColumn => (10.0, 0.001),
            Self::RenameColumn => (10.0, 0.0005),
            Self::AddIndex => (50.0, 0.01),
            Self::DropIndex => (5.0, 0.0),
        }
    }

    /// Estimated duration in milliseconds for a table of `rows` rows.
    pub fn estimate_ms(&self, rows: u64) -> f64 {
        let (base, per_row) = self.cost_model();
        base + per_row * rows as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimates_are_linear_in_rows() {
        assert_eq!(OperationKind::AddColumn.estimate_ms(0), 10.0);
        assert_eq!(OperationKind::AddColumn.estimate_ms(10_000), 20.0);
        assert_eq!(OperationKind::AddIndex.estimate_ms(1_000), 60.0);
    }

    #[test]
    fn test_column_definition_builder() {
        let id = ColumnDefinition::id("id");
        assert!(id.primary_key);
        assert!(id.auto_increment);
        assert!(!id.nullable);

        let email = ColumnDefinition::new("email", ColumnType::String(Some(255)))
            .not_null()
            .default_value("''");
        assert_eq!(email.default.as_deref(), Some("''"));
    }

    #[test]
    fn test_column_serializes_type_key() {
        let column = Column {
            name: "id".into(),
            data_type: "INTEGER".into(),
            nullable: false,
            default: None,
        };
        let json = serde_json::to_value(&column).unwrap();
        assert_eq!(json["type"], "INTEGER");
        assert!(json.get("default").is_none());
    }
}
