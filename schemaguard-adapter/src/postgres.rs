//! PostgreSQL adapter (strict transactional store).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::adapter::DatabaseAdapter;
use crate::connection::{Connection, Row, row_bool, row_str};
use crate::error::AdapterResult;
use crate::sql::{LiteralStyle, quote_with, string_literal};
use crate::types::{Column, ColumnType, ForeignKey, Index};

/// Driver identifier.
pub const POSTGRES_DRIVER: &str = "postgres";

/// Adapter for PostgreSQL databases.
pub struct PostgresAdapter {
    connection: Arc<dyn Connection>,
    schema: String,
}

impl PostgresAdapter {
    /// Create an adapter over the `public` schema.
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self::with_schema(connection, "public")
    }

    /// Create an adapter over a specific schema.
    pub fn with_schema(connection: Arc<dyn Connection>, schema: impl Into<String>) -> Self {
        Self {
            connection,
            schema: schema.into(),
        }
    }

    /// The introspected schema.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    fn schema_literal(&self) -> String {
        string_literal(&self.schema, false)
    }
}

#[async_trait::async_trait]
impl DatabaseAdapter for PostgresAdapter {
    fn driver(&self) -> &str {
        POSTGRES_DRIVER
    }

    fn connection(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    fn supports(&self) -> bool {
        matches!(self.connection.driver(), "postgres" | "postgresql" | "pgsql")
    }

    fn quote_identifier(&self, name: &str) -> String {
        quote_with(name, '"')
    }

    fn column_type_sql(&self, column_type: &ColumnType, auto_increment: bool) -> String {
        match column_type {
            ColumnType::Integer if auto_increment => "SERIAL".to_string(),
            ColumnType::BigInteger if auto_increment => "BIGSERIAL".to_string(),
            ColumnType::SmallInteger if auto_increment => "SMALLSERIAL".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
            ColumnType::String(Some(len)) => format!("VARCHAR({})", len),
            ColumnType::String(None) => "VARCHAR".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSONB".to_string(),
            ColumnType::Binary => "BYTEA".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Raw(raw) => raw.clone(),
        }
    }

    fn literal_style(&self) -> LiteralStyle {
        LiteralStyle {
            true_literal: "TRUE",
            false_literal: "FALSE",
            escape_backslashes: false,
            binary: ("'\\x", "'::bytea"),
        }
    }

    fn supports_transactional_ddl(&self) -> bool {
        true
    }

    async fn get_all_tables(&self) -> AdapterResult<Vec<String>> {
        let sql = format!(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = {} AND table_type = 'BASE TABLE' \
             ORDER BY table_name",
            self.schema_literal()
        );
        let rows = self.introspect("database", &sql).await?;
        Ok(rows.iter().filter_map(|r| row_str(r, "table_name")).collect())
    }

    async fn get_table_columns(&self, table: &str) -> AdapterResult<Vec<Column>> {
        let sql = format!(
            "SELECT column_name, data_type, is_nullable, column_default \
             FROM information_schema.columns \
             WHERE table_schema = {} AND table_name = {} \
             ORDER BY ordinal_position",
            self.schema_literal(),
            string_literal(table, false)
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
            "SELECT i.relname AS index_name, a.attname AS column_name, \
                    ix.indisunique AS is_unique, ix.indisprimary AS is_primary \
             FROM pg_index ix \
             JOIN pg_class t ON t.oid = ix.indrelid \
             JOIN pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
             WHERE t.relname = {} AND n.nspname = {} \
             ORDER BY i.relname, array_position(ix.indkey, a.attnum)",
            string_literal(table, false),
            self.schema_literal()
        );
        let rows = self.introspect(table, &sql).await?;

        let mut grouped: BTreeMap<String, Index> = BTreeMap::new();
        for row in &rows {
            let Some(name) = row_str(row, "index_name") else {
                continue;
            };
            let index = grouped.entry(name.clone()).or_insert_with(|| Index {
                name,
                columns: Vec::new(),
                unique: row_bool(row, "is_unique"),
                primary: row_bool(row, "is_primary"),
            });
            index.columns.extend(row_str(row, "column_name"));
        }
        Ok(grouped.into_values().collect())
    }

    async fn get_table_foreign_keys(&self, table: &str) -> AdapterResult<Vec<ForeignKey>> {
        let sql = format!(
            "SELECT tc.constraint_name, kcu.column_name, \
                    ccu.table_name AS referenced_table, ccu.column_name AS referenced_column, \
                    rc.delete_rule, rc.update_rule \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu ON tc.constraint_name = kcu.constraint_name \
             JOIN information_schema.constraint_column_usage ccu ON ccu.constraint_name = tc.constraint_name \
             JOIN information_schema.referential_constraints rc ON rc.constraint_name = tc.constraint_name \
             WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_name = {} AND tc.table_schema = {} \
             ORDER BY tc.constraint_name, kcu.ordinal_position",
            string_literal(table, false),
            self.schema_literal()
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
        let table_literal = string_literal(table, false);

        // Exact types (typmods, enums, arrays) come from pg_attribute, not information_schema.
        let sql = format!(
            "SELECT a.attname AS column_name, format_type(a.atttypid, a.atttypmod) AS column_type, \
                    a.attnotnull AS not_null, a.attidentity::text AS identity, \
                    pg_get_expr(d.adbin, d.adrelid) AS column_default \
             FROM pg_attribute a \
             JOIN pg_class t ON t.oid = a.attrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
             WHERE t.relname = {} AND n.nspname = {} AND a.attnum > 0 AND NOT a.attisdropped \
             ORDER BY a.attnum",
            table_literal,
            self.schema_literal()
        );
        let mut clauses: Vec<String> = self
            .introspect(table, &sql)
            .await?
            .iter()
            .map(|row| self.column_clause(row))
            .collect();

        let sql = format!(
            "SELECT c.conname, pg_get_constraintdef(c.oid) AS definition \
             FROM pg_constraint c \
             JOIN pg_class t ON t.oid = c.conrelid \
             JOIN pg_namespace n ON n.oid = t.relnamespace \
             WHERE t.relname = {} AND n.nspname = {} AND c.contype IN ('p', 'u', 'f', 'c', 'x') \
             ORDER BY CASE c.contype WHEN 'p' THEN 0 ELSE 1 END, c.conname",
            table_literal,
            self.schema_literal()
        );
        let mut constraint_names = Vec::new();
        for row in self.introspect(table, &sql).await? {
            let (Some(name), Some(definition)) = (row_str(&row, "conname"), row_str(&row, "definition")) else {
                continue;
            };
            clauses.push(format!("CONSTRAINT {} {}", self.quote_identifier(&name), definition));
            constraint_names.push(name);
        }

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_identifier(table),
            clauses.join(",\n    ")
        )];

        let sql = format!(
            "SELECT indexname, indexdef FROM pg_indexes \
             WHERE schemaname = {} AND tablename = {} ORDER BY indexname",
            self.schema_literal(),
            table_literal
        );
        for row in self.introspect(table, &sql).await? {
            // Constraint-backed indexes are recreated by their constraint.
            let name = row_str(&row, "indexname").unwrap_or_default();
            if constraint_names.contains(&name) {
                continue;
            }
            statements.extend(row_str(&row, "indexdef"));
        }
        Ok(statements)
    }
}

impl PostgresAdapter {
    fn column_clause(&self, row: &Row) -> String {
        let name = row_str(row, "column_name").unwrap_or_default();
        let column_type = row_str(row, "column_type").unwrap_or_default();
        let default = row_str(row, "column_default");
        let identity = row_str(row, "identity").unwrap_or_default();

        // Serial sequences are owned by the table and vanish with it.
        let serial = default.as_deref().is_some_and(|d| d.starts_with("nextval("));
        let data_type = match (serial, column_type.as_str()) {
            (true, "bigint") => "BIGSERIAL".to_string(),
            (true, "smallint") => "SMALLSERIAL".to_string(),
            (true, "integer") => "SERIAL".to_string(),
            _ => column_type,
        };
        let serial = serial && data_type.ends_with("SERIAL");

        let mut clause = format!("{} {}", self.quote_identifier(&name), data_type);
        if row_bool(row, "not_null") {
            clause.push_str(" NOT NULL");
        }
        // Restored rows carry their own ids, which ALWAYS identity would refuse.
        if matches!(identity.as_str(), "a" | "d") {
            clause.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        }
        if let (false, Some(default)) = (serial, default) {
            clause.push_str(&format!(" DEFAULT {}", default));
        }
        clause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;
    use crate::types::ColumnDefinition;
    use serde_json::json;

    struct NullConnection;

    #[async_trait::async_trait]
    impl Connection for NullConnection {
        fn driver(&self) -> &str {
            "postgresql"
        }
        fn database_name(&self) -> &str {
            "app"
        }
        async fn query(&self, _sql: &str) -> AdapterResult<Vec<Row>> {
            Ok(Vec::new())
        }
        async fn execute(&self, _sql: &str) -> AdapterResult<u64> {
            Ok(0)
        }
    }

    fn adapter() -> PostgresAdapter {
        PostgresAdapter::new(Arc::new(NullConnection))
    }

    #[test]
    fn test_serial_primary_key() {
        let sql = adapter().get_create_table_sql("users", &[ColumnDefinition::id("id")]);
        assert!(sql.contains("\"id\" SERIAL NOT NULL PRIMARY KEY"));
        assert!(!sql.contains("AUTOINCREMENT"));
    }

    #[test]
    fn test_literals() {
        let a = adapter();
        assert_eq!(a.render_value(&json!(true)), "TRUE");
        assert_eq!(a.render_value(&json!("it's")), "'it''s'");
    }

    struct CatalogConnection;

    #[async_trait::async_trait]
    impl Connection for CatalogConnection {
        fn driver(&self) -> &str {
            "postgres"
        }
        fn database_name(&self) -> &str {
            "app"
        }
        async fn query(&self, sql: &str) -> AdapterResult<Vec<Row>> {
            let rows = if sql.contains("FROM pg_attribute") {
                json!([
                    {"column_name": "id", "column_type": "integer", "not_null": true, "identity": "",
                     "column_default": "nextval('orders_id_seq'::regclass)"},
                    {"column_name": "code", "column_type": "character varying(40)", "not_null": true, "identity": "",
                     "column_default": null},
                    {"column_name": "total", "column_type": "numeric(10,2)", "not_null": false, "identity": "",
                     "column_default": "0"},
                    {"column_name": "status", "column_type": "order_status", "not_null": false, "identity": "",
                     "column_default": null},
                    {"column_name": "tags", "column_type": "text[]", "not_null": false, "identity": "",
                     "column_default": null},
                    {"column_name": "ref", "column_type": "bigint", "not_null": true, "identity": "a",
                     "column_default": null},
                ])
            } else if sql.contains("FROM pg_constraint") {
                json!([
                    {"conname": "orders_pkey", "definition": "PRIMARY KEY (id)"},
                    {"conname": "orders_customer_fk",
                     "definition": "FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE"},
                    {"conname": "orders_total_check", "definition": "CHECK ((total >= (0)::numeric))"},
                ])
            } else if sql.contains("FROM pg_indexes") {
                json!([
                    {"indexname": "idx_orders_code", "indexdef": "CREATE INDEX idx_orders_code ON public.orders USING btree (code)"},
                    {"indexname": "orders_pkey", "indexdef": "CREATE UNIQUE INDEX orders_pkey ON public.orders USING btree (id)"},
                ])
            } else {
                json!([])
            };
            Ok(rows
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|r| r.as_object().cloned())
                .collect())
        }
        async fn execute(&self, _sql: &str) -> AdapterResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_captured_ddl_keeps_exact_types_and_constraints() {
        let adapter = PostgresAdapter::new(Arc::new(CatalogConnection));
        let ddl = adapter.capture_table_ddl("orders").await.unwrap();
        assert_eq!(ddl.len(), 2);

        let create = &ddl[0];
        assert!(create.contains("\"id\" SERIAL NOT NULL"));
        assert!(!create.contains("nextval"));
        assert!(create.contains("\"code\" character varying(40) NOT NULL"));
        assert!(create.contains("\"total\" numeric(10,2) DEFAULT 0"));
        assert!(create.contains("\"status\" order_status"));
        assert!(create.contains("\"tags\" text[]"));
        assert!(create.contains("\"ref\" bigint NOT NULL GENERATED BY DEFAULT AS IDENTITY"));
        assert!(create.contains("CONSTRAINT \"orders_pkey\" PRIMARY KEY (id)"));
        assert!(create.contains(
            "CONSTRAINT \"orders_customer_fk\" FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE CASCADE"
        ));
        assert!(create.contains("CONSTRAINT \"orders_total_check\" CHECK"));
        assert!(!create.contains("USER-DEFINED"));

        assert_eq!(ddl[1], "CREATE INDEX idx_orders_code ON public.orders USING btree (code)");
    }

    #[test]
    fn test_supports_aliases() {
        assert!(adapter().supports());
        assert_eq!(adapter().schema(), "public");
    }
}
