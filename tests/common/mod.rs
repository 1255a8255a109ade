//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use schemaguard::adapter::{AdapterFactory, DatabaseAdapter, DriverConfig, Row, SqliteConnection};
use serde_json::json;

/// Fresh in-memory SQLite database behind the default adapter.
pub async fn sqlite_adapter() -> Arc<dyn DatabaseAdapter> {
    init_tracing();
    let conn = SqliteConnection::open_in_memory()
        .await
        .expect("Failed to open in-memory database");
    AdapterFactory::new(DriverConfig::default())
        .default_adapter(Arc::new(conn))
        .expect("Failed to build adapter")
}

/// Create `orders (id, total)` with `count` rows.
pub async fn seed_orders(adapter: &dyn DatabaseAdapter, count: u64) {
    adapter
        .execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, total INTEGER NOT NULL)")
        .await
        .expect("Failed to create orders");

    let rows: Vec<Row> = (1..=count)
        .map(|id| {
            let mut row = Row::new();
            row.insert("id".into(), json!(id));
            row.insert("total".into(), json!(id * 10));
            row
        })
        .collect();
    let written = adapter
        .insert_rows("orders", &rows)
        .await
        .expect("Failed to seed orders");
    assert_eq!(written, count);
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
