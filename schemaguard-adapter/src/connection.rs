//! The live-connection seam every adapter talks through.

use serde_json::Value as JsonValue;

use crate::error::AdapterResult;

/// A result row, keyed by column name.
pub type Row = serde_json::Map<String, JsonValue>;

/// Key used to carry binary column values through JSON rows.
pub const BINARY_KEY: &str = "$binary";

/// A live database connection.
///
/// Implementations execute raw SQL and hand rows back as JSON maps. They hold no
/// schema knowledge; that lives in the [`DatabaseAdapter`](crate::DatabaseAdapter).
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Driver identifier (`"mysql"`, `"postgres"`, `"sqlite"`, or a custom name).
    fn driver(&self) -> &str;

    /// Name of the connected database.
    fn database_name(&self) -> &str;

    /// Run a query and return every row.
    async fn query(&self, sql: &str) -> AdapterResult<Vec<Row>>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str) -> AdapterResult<u64>;
}

/// Wrap binary data so it survives a round-trip through JSON rows.
pub fn binary_value(bytes: &[u8]) -> JsonValue {
    let mut map = serde_json::Map::new();
    map.insert(BINARY_KEY.to_string(), JsonValue::String(hex::encode(bytes)));
    JsonValue::Object(map)
}

/// Extract the hex payload of a value produced by [`binary_value`].
pub fn as_binary_hex(value: &JsonValue) -> Option<&str> {
    match value {
        JsonValue::Object(map) if map.len() == 1 => map.get(BINARY_KEY).and_then(JsonValue::as_str),
        _ => None,
    }
}

/// Read a column as a string.
pub fn row_str(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Read a column as an unsigned integer. Text-encoded numbers are accepted.
pub fn row_u64(row: &Row, key: &str) -> Option<u64> {
    row.get(key).and_then(value_as_u64)
}

/// Read a column as a boolean flag. Accepts numbers, booleans and the usual text spellings.
pub fn row_bool(row: &Row, key: &str) -> bool {
    match row.get(key) {
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_i64().is_some_and(|v| v != 0),
        Some(JsonValue::String(s)) => matches!(
            s.to_ascii_lowercase().as_str(),
            "t" | "true" | "1" | "yes" | "y"
        ),
        _ => false,
    }
}

/// Interpret a JSON value as an unsigned integer.
pub fn value_as_u64(value: &JsonValue) -> Option<u64> {
    match value {
        JsonValue::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| v.max(0) as u64))
            .or_else(|| n.as_f64().map(|v| v.max(0.0) as u64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read the first column of the first row as a count.
pub fn first_count(rows: &[Row]) -> u64 {
    rows.first()
        .and_then(|row| row.values().next())
        .and_then(value_as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_row_accessors() {
        let r = row(json!({"name": "orders", "notnull": 1, "count": "500", "flag": "YES"}));
        assert_eq!(row_str(&r, "name").as_deref(), Some("orders"));
        assert!(row_bool(&r, "notnull"));
        assert!(row_bool(&r, "flag"));
        assert!(!row_bool(&r, "missing"));
        assert_eq!(row_u64(&r, "count"), Some(500));
    }

    #[test]
    fn test_first_count() {
        let rows = vec![row(json!({"count": 42}))];
        assert_eq!(first_count(&rows), 42);
        assert_eq!(first_count(&[]), 0);
    }

    #[test]
    fn test_binary_value() {
        let value = binary_value(&[0xde, 0xad, 0x01]);
        assert_eq!(as_binary_hex(&value), Some("dead01"));
        assert_eq!(as_binary_hex(&json!({"other": "x"})), None);
    }
}
