//! MySQL adapter (row store with broad DDL support).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::DatabaseAdapter;
use crate::connection::{Connection, row_bool, row_str};
use crate::error::AdapterResult;
use crate::sql::{LiteralStyle, quote_with, string_literal};
use crate::types::{Column, ColumnType, ForeignKey, Index};

/// Driver identifier.
pub const MYSQL_DRIVER: &str = "mysql";

/// Adapter for MySQL and MariaDB databases.
pub struct MySqlAdapter {
    connection: Arc<dyn Connection>,
}

impl MySqlAdapter {
    /// Create an adapter over a MySQL connection.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for MySqlAdapter {
    fn driver(&self) -> &str {
        MYSQL_DRIVER
    }

    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn supports(&self) -> bool {
        matches!(self.connection.driver(), "mysql" | "mariadb")
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '`')
    }

    fn column_type_sql(&self, column_type: &ColumnType, _auto_increment: bool) -> String {
        match column_type {
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            ColumnType::String(len) => format!("VARCHAR({})", len.unwrap_or(255)),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Raw(raw) => raw.clone(),
        }
    }

    fn auto_increment_keyword(&self) -> Option<&'static str> {
        Some("AUTO_INCREMENT")
    }

    fn literal_style(&self) -> LiteralStyle {
        LiteralStyle {
            true_literal: "1",
            false_literal: "0",
            escape_backslashes: true,
            binary: ("X'", "'"),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        // DDL causes an implicit commit.
        false
    }

    fn begin_transaction_sql(&self) -> &'static str {
        "START TRANSACTION"
    }

    fn get_rename_table_sql(&self, from: &str, to: &str) -> String {
        format!(
            "RENAME TABLE {} TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    fn get_drop_index_sql(&self, table: &str, index: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(index),
            self.quote_identifier(table)
        )
    }

    async fn get_all_tables(&self) -> AdapterResult<Vec<String>> {
        let rows = self
            .introspect(
                "database",
                "SELECT table_name AS table_name FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
            )
            .await?;
        Ok(rows.iter().filter_map(|r| row_str(r, "table_name")).collect())
    }

    async fn get_table_columns(&self, table: &str) -> AdapterResult<Vec<Column>> {
        let sql = format!(
            "SELECT column_name AS column_name, column_type AS data_type, \
                    is_nullable AS is_nullable, column_default AS column_default \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = {} \
             ORDER BY ordinal_position",
            string_literal(table, true)
        );
        let rows = self.introspect(table, &sql).await?;
        Ok(rows
            .iter()
            .map(|r| Column {
                name: row_str(r, "column_name").unwrap_or_default(),
                data_type: row_str(r, "data_type").unwrap_or_default(),
                nullable: row_bool(r, "is_nullable"),
                default: row_str(r, "column_default"),
            })
            .collect())
    }

    async fn get_table_indexes(&self, table: &str) -> AdapterResult<Vec<Index>> {
        let sql = format!(
            "SELECT index_name AS index_name, column_name AS column_name, non_unique AS non_unique \
             FROM information_schema.statistics \
             WHERE table_schema = DATABASE() AND table_name = {} \
             ORDER BY index_name, seq_in_index",
            string_literal(table, true)
        );
        let rows = self.introspect(table, &sql).await?;

        let mut grouped: BTreeMap<String, Index> = BTreeMap::new();
        for row in &rows {
            let Some(name) = row_str(row, "index_name") else {
                continue;
            };
            let index = grouped.entry(name.clone()).or_insert_with(|| Index {
                primary: name == "PRIMARY",
                unique: !row_bool(row, "non_unique"),
                name,
                columns: Vec::new(),
            });
            index.columns.extend(row_str(row, "column_name"));
        }
        Ok(grouped.into_values().collect())
    }

    async fn get_table_foreign_keys(&self, table: &str) -> AdapterResult<Vec<ForeignKey>> {
        let sql = format!(
            "SELECT k.constraint_name AS constraint_name, k.column_name AS column_name, \
                    k.referenced_table_name AS referenced_table, \
                    k.referenced_column_name AS referenced_column, \
                    r.delete_rule AS delete_rule, r.update_rule AS update_rule \
             FROM information_schema.key_column_usage k \
             JOIN information_schema.referential_constraints r \
               ON r.constraint_schema = k.constraint_schema AND r.constraint_name = k.constraint_name \
             WHERE k.table_schema = DATABASE() AND k.table_name = {} \
               AND k.referenced_table_name IS NOT NULL \
             ORDER BY k.constraint_name, k.ordinal_position",
            string_literal(table, true)
        );
        let rows = self.introspect(table, &sql).await?;

        let mut grouped: BTreeMap<String, ForeignKey> = BTreeMap::new();
        for row in &rows {
            let Some(name) = row_str(row, "constraint_name") else {
                continue;
            };
            let fk = grouped.entry(name.clone()).or_insert_with(|| ForeignKey {
                name,
                columns: Vec::new(),
                referenced_table: row_str(row, "referenced_table").unwrap_or_default(),
                referenced_columns: Vec::new(),
                on_delete: row_str(row, "delete_rule"),
                on_update: row_str(row, "update_rule"),
            });
            fk.columns.extend(row_str(row, "column_name"));
            fk.referenced_columns.extend(row_str(row, "referenced_column"));
        }
        Ok(grouped.into_values().collect())
    }

    async fn capture_table_ddl(&self, table: &str) -> AdapterResult<Vec<String>> {
        let sql = format!("SHOW CREATE TABLE {}", self.quote_identifier(table));
        let rows = self.introspect(table, &sql).await?;
        // SHOW CREATE TABLE includes index definitions inline.
        Ok(rows
            .iter()
            .filter_map(|r| row_str(r, "Create Table"))
            .collect())
    }
}
