//! The capability surface every driver adapter implements.
//!
//! Introspection methods are driver-specific; DDL generation is pure string
//! building with driver-correct quoting; mutations go through [`DatabaseAdapter::execute`].
//! Default method bodies hold the parts that only differ in dialect hooks.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use crate::connection::{Connection, Row, first_count};
use crate::error::AdapterResult;
use crate::sql::{LiteralStyle, render_literal};
use crate::types::{Column, ColumnDefinition, ColumnType, ForeignKey, Index, IndexDefinition, OperationKind};

/// Rows per generated INSERT statement when re-inserting captured data.
pub const INSERT_CHUNK_SIZE: usize = 100;

/// Driver-specific schema capabilities over a live [`Connection`].
#[async_trait::async_trait]
pub trait DatabaseAdapter: Send + Sync {
    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Driver identifier this adapter implements.
    fn driver(&self) -> &str;

    /// The connection this adapter talks through.
    fn connection(&self) -> &Arc<dyn Connection>;

    /// Self-check: does this adapter match the live connection?
    fn supports(&self) -> bool {
        self.connection().driver() == self.driver()
    }

    /// Name of the connected database.
    fn database_name(&self) -> String {
        self.connection().database_name().to_string()
    }

    // ------------------------------------------------------------------
    // Dialect hooks
    // ------------------------------------------------------------------

    /// Quote an identifier for this dialect.
    fn quote_identifier(&self, name: &str) -> String;

    /// SQL type for a portable column type.
    fn column_type_sql(&self, column_type: &ColumnType, auto_increment: bool) -> String;

    /// Keyword appended after `PRIMARY KEY` for auto-incrementing keys, if any.
    fn auto_increment_keyword(&self) -> Option<&'static str> {
        None
    }

    /// Whether a backslash escapes the next character inside quoted strings.
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// Literal spellings for this dialect.
    fn literal_style(&self) -> LiteralStyle;

    /// Whether DDL statements participate in transactions on this driver.
    fn supports_transactional_ddl(&self) -> bool;

    /// Statement that opens a transaction.
    fn begin_transaction_sql(&self) -> &'static str {
        "BEGIN"
    }

    /// Render a row value as a SQL literal.
    fn render_value(&self, value: &JsonValue) -> String {
        render_literal(value, self.literal_style())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// All user tables, sorted by name.
    async fn get_all_tables(&self) -> AdapterResult<Vec<String>>;

    /// Columns of a table, in ordinal order.
    async fn get_table_columns(&self, table: &str) -> AdapterResult<Vec<Column>>;

    /// Indexes of a table.
    async fn get_table_indexes(&self, table: &str) -> AdapterResult<Vec<Index>>;

    /// Foreign keys of a table.
    async fn get_table_foreign_keys(&self, table: &str) -> AdapterResult<Vec<ForeignKey>>;

    /// Statements that recreate the table's structure (table first, then indexes).
    async fn capture_table_ddl(&self, table: &str) -> AdapterResult<Vec<String>>;

    /// Run an introspection query, labelling failures with `target`.
    async fn introspect(&self, target: &str, sql: &str) -> AdapterResult<Vec<Row>> {
        trace!(target = %target, sql = %sql, "Introspecting");
        self.connection()
            .query(sql)
            .await
            .map_err(|e| e.into_introspection(target))
    }

    /// Current row count of a table.
    async fn get_table_row_count(&self, table: &str) -> AdapterResult<u64> {
        let sql = format!("SELECT COUNT(*) AS count FROM {}", self.quote_identifier(table));
        let rows = self.introspect(table, &sql).await?;
        Ok(first_count(&rows))
    }

    /// Number of rows whose `column` is not NULL.
    async fn count_non_null(&self, table: &str, column: &str) -> AdapterResult<u64> {
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {} IS NOT NULL",
            self.quote_identifier(table),
            self.quote_identifier(column)
        );
        let rows = self.introspect(table, &sql).await?;
        Ok(first_count(&rows))
    }

    /// Whether a table exists.
    async fn has_table(&self, table: &str) -> AdapterResult<bool> {
        Ok(self.get_all_tables().await?.iter().any(|t| t == table))
    }

    /// Whether a column exists on a table.
    async fn has_column(&self, table: &str, column: &str) -> AdapterResult<bool> {
        Ok(self
            .get_table_columns(table)
            .await?
            .iter()
            .any(|c| c.name == column))
    }

    /// Every row of a table.
    async fn fetch_rows(&self, table: &str) -> AdapterResult<Vec<Row>> {
        let sql = format!("SELECT * FROM {}", self.quote_identifier(table));
        self.introspect(table, &sql).await
    }

    // ------------------------------------------------------------------
    // DDL generation
    // ------------------------------------------------------------------

    /// Column clause used by CREATE TABLE and ADD COLUMN.
    fn column_definition_sql(&self, column: &ColumnDefinition, inline_primary_key: bool) -> String {
        let mut parts = vec![
            self.quote_identifier(&column.name),
            self.column_type_sql(&column.column_type, column.auto_increment),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }
        if inline_primary_key {
            parts.push("PRIMARY KEY".to_string());
            if column.auto_increment {
                if let Some(keyword) = self.auto_increment_keyword() {
                    parts.push(keyword.to_string());
                }
            }
        }
        parts.join(" ")
    }

    /// CREATE TABLE statement.
    fn get_create_table_sql(&self, table: &str, columns: &[ColumnDefinition]) -> String {
        let pk: Vec<&ColumnDefinition> = columns.iter().filter(|c| c.primary_key).collect();
        let inline = pk.len() == 1;

        let mut clauses: Vec<String> = columns
            .iter()
            .map(|c| self.column_definition_sql(c, inline && c.primary_key))
            .collect();

        if pk.len() > 1 {
            let cols: Vec<String> = pk.iter().map(|c| self.quote_identifier(&c.name)).collect();
            clauses.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_identifier(table),
            clauses.join(",\n    ")
        )
    }

    /// DROP TABLE statement.
    fn get_drop_table_sql(&self, table: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(table))
    }

    /// Table rename statement.
    fn get_rename_table_sql(&self, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME TO {}",
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// ADD COLUMN statement.
    fn get_add_column_sql(&self, table: &str, column: &ColumnDefinition) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition_sql(column, false)
        )
    }

    /// DROP COLUMN statement.
    fn get_drop_column_sql(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Column rename statement.
    fn get_rename_column_sql(&self, table: &str, from: &str, to: &str) -> String {
        format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.quote_identifier(table),
            self.quote_identifier(from),
            self.quote_identifier(to)
        )
    }

    /// CREATE INDEX statement.
    fn get_create_index_sql(&self, table: &str, index: &IndexDefinition) -> String {
        let cols: Vec<String> = index
            .columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect();
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            cols.join(", ")
        )
    }

    /// DROP INDEX statement.
    fn get_drop_index_sql(&self, _table: &str, index: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(index))
    }

    /// Multi-row INSERT statements for `rows`, chunked.
    fn get_insert_sql(&self, table: &str, rows: &[Row]) -> Vec<String> {
        let columns: Vec<String> = rows
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if columns.is_empty() {
            return Vec::new();
        }

        let column_list: Vec<String> = columns.iter().map(|c| self.quote_identifier(c)).collect();
        rows.chunks(INSERT_CHUNK_SIZE)
            .map(|chunk| {
                let values: Vec<String> = chunk
                    .iter()
                    .map(|row| {
                        let literals: Vec<String> = columns
                            .iter()
                            .map(|c| self.render_value(row.get(c).unwrap_or(&JsonValue::Null)))
                            .collect();
                        format!("({})", literals.join(", "))
                    })
                    .collect();
                format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    self.quote_identifier(table),
                    column_list.join(", "),
                    values.join(", ")
                )
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Execute a statement against the live connection.
    async fn execute(&self, sql: &str) -> AdapterResult<u64> {
        debug!(driver = %self.driver(), sql = %sql, "Executing statement");
        self.connection().execute(sql).await
    }

    /// Rename a table out of the way. Data is kept.
    async fn archive_table(&self, table: &str, new_name: &str) -> AdapterResult<()> {
        self.execute(&self.get_rename_table_sql(table, new_name)).await?;
        Ok(())
    }

    /// Rename a column out of the way. Data is kept.
    async fn archive_column(&self, table: &str, column: &str, new_name: &str) -> AdapterResult<()> {
        self.execute(&self.get_rename_column_sql(table, column, new_name))
            .await?;
        Ok(())
    }

    /// Bulk-insert rows, returning the number of rows written.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> AdapterResult<u64> {
        let mut written = 0;
        for statement in self.get_insert_sql(table, rows) {
            written += self.execute(&statement).await?;
        }
        Ok(written)
    }

    /// Heuristic duration of an operation against `table`. Reporting only.
    async fn estimate_operation_duration(
        &self,
        operation: OperationKind,
        table: &str,
    ) -> AdapterResult<Duration> {
        let rows = if self.has_table(table).await? {
            self.get_table_row_count(table).await?
        } else {
            0
        };
        Ok(Duration::from_secs_f64(operation.estimate_ms(rows) / 1000.0))
    }

    /// Open a transaction.
    async fn begin_transaction(&self) -> AdapterResult<()> {
        self.execute(self.begin_transaction_sql()).await?;
        Ok(())
    }

    /// Commit the open transaction.
    async fn commit(&self) -> AdapterResult<()> {
        self.execute("COMMIT").await?;
        Ok(())
    }

    /// Roll back the open transaction.
    async fn rollback(&self) -> AdapterResult<()> {
        self.execute("ROLLBACK").await?;
        Ok(())
    }
}
