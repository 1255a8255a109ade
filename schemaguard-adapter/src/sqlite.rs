//! SQLite adapter (embedded single-file store).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::DatabaseAdapter;
use crate::connection::{Connection, row_bool, row_str, row_u64};
use crate::error::AdapterResult;
use crate::sql::{LiteralStyle, quote_with, string_literal};
use crate::types::{Column, ColumnType, ForeignKey, Index};

/// Driver identifier.
pub const SQLITE_DRIVER: &str = "sqlite";

/// Adapter for SQLite databases.
pub struct SqliteAdapter {
    connection: Arc<dyn Connection>,
}

impl SqliteAdapter {
    /// Create an adapter over a SQLite connection.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for SqliteAdapter {
    fn driver(&self) -> &str {
        SQLITE_DRIVER
    }

    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn column_type_sql(&self, column_type: &ColumnType, _auto_increment: bool) -> String {
        match column_type {
            ColumnType::Integer | ColumnType::BigInteger | ColumnType::SmallInteger => {
                "INTEGER".to_string()
            }
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Float | ColumnType::Double => "REAL".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            ColumnType::String(Some(len)) => format!("VARCHAR({})", len),
            ColumnType::String(None) | ColumnType::Text | ColumnType::Uuid => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "TEXT".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Raw(raw) => raw.clone(),
        }
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        Some("AUTOINCREMENT")
    }

    fn literal_style(&self) -> LiteralStyle {
        LiteralStyle {
            true_literal: "1",
            false_literal: "0",
            escape_backslashes: false,
            binary: ("X'", "'"),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    async fn get_all_tables(&self) -> AdapterResult<Vec<String>> {
        let rows = self
            .introspect(
                "database",
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY name",
            )
            .await?;
        Ok(rows.iter().filter_map(|r| row_str(r, "name")).collect())
    }

    async fn get_table_columns(&self, table: &str) -> AdapterResult<Vec<Column>> {
        let sql = format!("PRAGMA table_info({})", self.quote_identifier(table));
        let rows = self.introspect(table, &sql).await?;
        Ok(rows
            .iter()
            .map(|r| Column {
                name: row_str(r, "name").unwrap_or_default(),
                data_type: row_str(r, "type").unwrap_or_default(),
                // PRAGMA reports notnull = 0 for INTEGER PRIMARY KEY even though it never holds NULL.
                nullable: !row_bool(r, "notnull") && !row_bool(r, "pk"),
                default: row_str(r, "dflt_value"),
            })
            .collect())
    }

    async fn get_table_indexes(&self, table: &str) -> AdapterResult<Vec<Index>> {
        let sql = format!("PRAGMA index_list({})", self.quote_identifier(table));
        let rows = self.introspect(table, &sql).await?;

        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let Some(name) = row_str(row, "name") else {
                continue;
            };
            let info_sql = format!("PRAGMA index_info({})", self.quote_identifier(&name));
            let columns = self
                .introspect(table, &info_sql)
                .await?
                .iter()
                .filter_map(|r| row_str(r, "name"))
                .collect();
            indexes.push(Index {
                name,
                columns,
                unique: row_bool(row, "unique"),
                primary: row_str(row, "origin").as_deref() == Some("pk"),
            });
        }
        indexes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(indexes)
    }

    async fn get_table_foreign_keys(&self, table: &str) -> AdapterResult<Vec<ForeignKey>> {
        let sql = format!("PRAGMA foreign_key_list({})", self.quote_identifier(table));
        let rows = self.introspect(table, &sql).await?;

        // One row per column; rows sharing an id belong to the same constraint.
        let mut grouped: BTreeMap<u64, ForeignKey> = BTreeMap::new();
        for row in &rows {
            let id = row_u64(row, "id").unwrap_or(0);
            let fk = grouped.entry(id).or_insert_with(|| ForeignKey {
                name: format!("fk_{}_{}", table, id),
                columns: Vec::new(),
                referenced_table: row_str(row, "table").unwrap_or_default(),
                referenced_columns: Vec::new(),
                on_delete: row_str(row, "on_delete"),
                on_update: row_str(row, "on_update"),
            });
            fk.columns.extend(row_str(row, "from"));
            fk.referenced_columns.extend(row_str(row, "to"));
        }
        Ok(grouped.into_values().collect())
    }

    async fn capture_table_ddl(&self, table: &str) -> AdapterResult<Vec<String>> {
        let sql = format!(
            "SELECT type, sql FROM sqlite_master \
             WHERE tbl_name = {} AND sql IS NOT NULL \
             ORDER BY CASE type WHEN 'table' THEN 0 ELSE 1 END, name",
            string_literal(table, false)
        );
        let rows = self.introspect(table, &sql).await?;
        Ok(rows.iter().filter_map(|r| row_str(r, "sql")).collect())
    }
}
