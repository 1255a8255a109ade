//! SQLite connection over `tokio-rusqlite`.

use std::path::Path;

use rusqlite::types::ValueRef;
use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use crate::connection::{Connection, Row, binary_value};
use crate::error::{AdapterError, AdapterResult};
use crate::sqlite::SQLITE_DRIVER;

/// A single SQLite database handle.
pub struct SqliteConnection {
    conn: tokio_rusqlite::Connection,
    database: String,
}

impl SqliteConnection {
    /// Open (or create) a database file.
    pub async fn open(path: impl AsRef<Path>) -> AdapterResult<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "Opening SQLite database");
        let database = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| AdapterError::connection(e.to_string()))?;
        Ok(Self { conn, database })
    }

    /// Open a private in-memory database.
    pub async fn open_in_memory() -> AdapterResult<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| AdapterError::connection(e.to_string()))?;
        Ok(Self {
            conn,
            database: "main".to_string(),
        })
    }
}

fn to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => JsonValue::Number(i.into()),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => binary_value(bytes),
    }
}

#[async_trait::async_trait]
impl Connection for SqliteConnection {
    fn driver(&self) -> &str {
        SQLITE_DRIVER
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str) -> AdapterResult<Vec<Row>> {
        trace!(sql = %sql, "SQLite query");
        let owned = sql.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&owned)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();

                let mut rows = stmt.query([])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    let mut map = Row::new();
                    for (i, col) in columns.iter().enumerate() {
                        map.insert(col.clone(), to_json(row.get_ref(i)?));
                    }
                    out.push(map);
                }
                Ok(out)
            })
            .await
            .map_err(|e| AdapterError::execution(sql, e))
    }

    async fn execute(&self, sql: &str) -> AdapterResult<u64> {
        trace!(sql = %sql, "SQLite execute");
        let owned = sql.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&owned)?;
                if stmt.column_count() > 0 {
                    // Statements that yield rows (some PRAGMAs) are drained.
                    let mut rows = stmt.query([])?;
                    while rows.next()?.is_some() {}
                    return Ok(0);
                }
                Ok(stmt.execute([])? as u64)
            })
            .await
            .map_err(|e| AdapterError::execution(sql, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{as_binary_hex, row_str, row_u64};

    #[tokio::test]
    async fn test_execute_and_query() {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, data BLOB)")
            .await
            .unwrap();
        let written = conn
            .execute("INSERT INTO t (name, data) VALUES ('a', X'01ff'), ('b', NULL)")
            .await
            .unwrap();
        assert_eq!(written, 2);

        let rows = conn.query("SELECT * FROM t ORDER BY id").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(row_u64(&rows[0], "id"), Some(1));
        assert_eq!(row_str(&rows[0], "name").as_deref(), Some("a"));
        assert_eq!(as_binary_hex(&rows[0]["data"]), Some("01ff"));
        assert!(rows[1]["data"].is_null());
    }

    #[tokio::test]
    async fn test_error_carries_sql() {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        let err = conn.execute("DROP TABLE missing").await.unwrap_err();
        assert!(matches!(err, AdapterError::Execution { ref sql, .. } if sql == "DROP TABLE missing"));
    }

    #[tokio::test]
    async fn test_database_name() {
        let conn = SqliteConnection::open_in_memory().await.unwrap();
        assert_eq!(conn.database_name(), "main");
        assert_eq!(conn.driver(), "sqlite");
    }
}
