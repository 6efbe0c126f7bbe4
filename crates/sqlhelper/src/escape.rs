//! Literal escaping for rendered SQL.
//!
//! The rule is deliberately minimal: backslashes are doubled and single quotes are
//! backslash-escaped, MySQL style. This is **not** a substitute for bound parameters;
//! do not feed untrusted input through it without validating that input first.

use serde_json::Value;

/// Render a value as escaped SQL text, without surrounding quotes.
///
/// - objects and arrays are JSON-serialized first
/// - null becomes the bare text `NULL`
/// - everything else uses its string form
pub fn escape(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => escape_str(s),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Serializing a `Value` cannot fail.
        Value::Array(_) | Value::Object(_) => escape_str(&value.to_string()),
    }
}

/// Escape a string: `\` → `\\`, `'` → `\'`.
pub fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value and wrap it in single quotes.
pub fn quote(value: &Value) -> String {
    format!("'{}'", escape(value))
}

/// Loose falsiness used by batch inserts: null, `false`, zero and `""`.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
