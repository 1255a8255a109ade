//! SQL text helpers shared by the dialects.

use serde_json::Value as JsonValue;

use crate::connection::as_binary_hex;

/// Quote an identifier with the given delimiter, doubling embedded delimiters.
pub fn quote_with(name: &str, delimiter: char) -> String {
    let doubled = format!("{delimiter}{delimiter}");
    let escaped = name.replace(delimiter, &doubled);
    format!("{delimiter}{escaped}{delimiter}")
}

/// Escape a string literal. Backslashes are escaped too when `backslashes` is set (MySQL).
pub fn string_literal(value: &str, backslashes: bool) -> String {
    let mut escaped = if backslashes {
        value.replace('\\', "\\\\")
    } else {
        value.to_string()
    };
    escaped = escaped.replace('\'', "''");
    format!("'{}'", escaped)
}

/// How a dialect spells literals that differ between drivers.
#[derive(Debug, Clone, Copy)]
pub struct LiteralStyle {
    /// Literal for `true`.
    pub true_literal: &'static str,
    /// Literal for `false`.
    pub false_literal: &'static str,
    /// Whether string literals escape backslashes.
    pub escape_backslashes: bool,
    /// Prefix and suffix wrapped around a hex payload for binary values.
    pub binary: (&'static str, &'static str),
}

/// Render a JSON row value as a SQL literal.
pub fn render_literal(value: &JsonValue, style: LiteralStyle) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(true) => style.true_literal.to_string(),
        JsonValue::Bool(false) => style.false_literal.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => string_literal(s, style.escape_backslashes),
        other => match as_binary_hex(other) {
            Some(hex) => format!("{}{}{}", style.binary.0, hex, style.binary.1),
            None => string_literal(&other.to_string(), style.escape_backslashes),
        },
    }
}
