//! MySQL connection over `mysql_async`.

use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Value};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::connection::{Connection, Row, binary_value};
use crate::error::{AdapterError, AdapterResult};
use crate::mysql::MYSQL_DRIVER;

/// A single MySQL session.
///
/// MySQL sessions are stateful (open transactions, session variables), so the
/// adapter keeps one `Conn` rather than a pool.
pub struct MySqlConnection {
    conn: Mutex<Conn>,
    database: String,
}

impl MySqlConnection {
    /// Connect using a `mysql://` URL.
    pub async fn connect(url: &str) -> AdapterResult<Self> {
        let opts = Opts::from_url(url).map_err(|e| AdapterError::config(e.to_string()))?;
        let database = opts.db_name().unwrap_or_default().to_string();

        debug!(database = %database, "Connecting to MySQL");
        let conn = Conn::new(opts)
            .await
            .map_err(|e| AdapterError::connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            database,
        })
    }
}

fn to_json(value: Value) -> JsonValue {
    match value {
        Value::NULL => JsonValue::Null,
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s),
            Err(e) => binary_value(e.as_bytes()),
        },
        Value::Int(i) => JsonValue::Number(i.into()),
        Value::UInt(u) => JsonValue::Number(u.into()),
        Value::Float(f) => serde_json::Number::from_f64(f64::from(f))
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Double(d) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Date(year, month, day, hour, minute, second, micro) => JsonValue::String(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            year, month, day, hour, minute, second, micro
        )),
        Value::Time(negative, days, hours, minutes, seconds, micro) => JsonValue::String(format!(
            "{}{}:{:02}:{:02}.{:06}",
            if negative { "-" } else { "" },
            days * 24 + u32::from(hours),
            minutes,
            seconds,
            micro
        )),
    }
}

#[async_trait::async_trait]
impl Connection for MySqlConnection {
    fn driver(&self) -> &str {
        MYSQL_DRIVER
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str) -> AdapterResult<Vec<Row>> {
        trace!(sql = %sql, "MySQL query");
        let mut conn = self.conn.lock().await;
        let rows: Vec<mysql_async::Row> = conn
            .query(sql)
            .await
            .map_err(|e| AdapterError::execution(sql, e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                row.columns_ref()
                    .iter()
                    .enumerate()
                    .map(|(i, column)| {
                        let value: Option<Value> = row.get(i);
                        (
                            column.name_str().to_string(),
                            to_json(value.unwrap_or(Value::NULL)),
                        )
                    })
                    .collect()
            })
            .collect())
    }

    async fn execute(&self, sql: &str) -> AdapterResult<u64> {
        trace!(sql = %sql, "MySQL execute");
        let mut conn = self.conn.lock().await;
        conn.query_drop(sql)
            .await
            .map_err(|e| AdapterError::execution(sql, e))?;
        Ok(conn.affected_rows())
    }
}
