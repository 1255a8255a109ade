//! PostgreSQL connection over `tokio-postgres`.
//!
//! Statements go through the simple-query protocol, so every value comes back
//! as text. The adapter renders text values as quoted literals, which PostgreSQL
//! coerces back to the column type on re-insertion.

use serde_json::Value as JsonValue;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error, trace};

use crate::connection::{Connection, Row};
use crate::error::{AdapterError, AdapterResult};
use crate::postgres::POSTGRES_DRIVER;

/// A PostgreSQL client plus its background connection task.
pub struct PostgresConnection {
    client: Client,
    database: String,
}

impl PostgresConnection {
    /// Connect using a libpq-style connection string or URL.
    pub async fn connect(url: &str) -> AdapterResult<Self> {
        let config: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| AdapterError::config(e.to_string()))?;
        let database = config.get_dbname().unwrap_or("postgres").to_string();

        debug!(database = %database, "Connecting to PostgreSQL");
        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| AdapterError::connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed");
            }
        });

        Ok(Self { client, database })
    }
}

#[async_trait::async_trait]
impl Connection for PostgresConnection {
    fn driver(&self) -> &str {
        POSTGRES_DRIVER
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&self, sql: &str) -> AdapterResult<Vec<Row>> {
        trace!(sql = %sql, "PostgreSQL query");
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| AdapterError::execution(sql, e))?;

        let mut rows = Vec::new();
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                let mut map = Row::new();
                for (i, column) in row.columns().iter().enumerate() {
                    let value = row
                        .get(i)
                        .map(|v| JsonValue::String(v.to_string()))
                        .unwrap_or(JsonValue::Null);
                    map.insert(column.name().to_string(), value);
                }
                rows.push(map);
            }
        }
        Ok(rows)
    }

    async fn execute(&self, sql: &str) -> AdapterResult<u64> {
        trace!(sql = %sql, "PostgreSQL execute");
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| AdapterError::execution(sql, e))?;

        Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum())
    }
}
