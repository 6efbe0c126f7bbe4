//! Client-side placeholder replacement for raw SQL.
//!
//! Named placeholders (`:name`) take values from [`Replacements::Named`], positional
//! placeholders (`?`) from [`Replacements::Positional`]. Placeholders inside quoted
//! literals or backtick identifiers are left alone.

use crate::error::{SqlError, SqlResult};
use crate::escape::escape;
use crate::fragment::Values;
use serde_json::Value;
use std::borrow::Cow;

/// Replacement values for raw SQL.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Replacements {
    #[default]
    None,
    /// Values for `:name` placeholders.
    Named(Values),
    /// Values for `?` placeholders, in order.
    Positional(Vec<Value>),
}

impl Replacements {
    pub fn is_empty(&self) -> bool {
        match self {
            Replacements::None => true,
            Replacements::Named(values) => values.is_empty(),
            Replacements::Positional(values) => values.is_empty(),
        }
    }
}

impl From<Values> for Replacements {
    fn from(values: Values) -> Self {
        Replacements::Named(values)
    }
}

impl From<Vec<Value>> for Replacements {
    fn from(values: Vec<Value>) -> Self {
        Replacements::Positional(values)
    }
}

/// Format a value as a SQL literal: null → `NULL`, numbers and booleans verbatim,
/// strings and objects quoted, arrays as comma-separated lists.
pub fn format_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(format_literal)
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(_) | Value::Object(_) => format!("'{}'", escape(value)),
    }
}

/// Substitute placeholders. Returns the input unchanged when there is nothing to bind.
pub fn bind<'a>(sql: &'a str, replacements: &Replacements) -> SqlResult<Cow<'a, str>> {
    if matches!(replacements, Replacements::None) {
        return Ok(Cow::Borrowed(sql));
    }

    let mut out = String::with_capacity(sql.len() + 16);
    let mut positional = match replacements {
        Replacements::Positional(values) => Some(values.iter()),
        _ => None,
    };
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == '\\' && q != '`' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == q {
                quote = None;
            }
            prev = Some(c);
            continue;
        }

        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            '?' if positional.is_some() => {
                let value = positional
                    .as_mut()
                    .and_then(Iterator::next)
                    .ok_or_else(|| SqlError::param("not enough positional replacements"))?;
                out.push_str(&format_literal(value));
            }
            ':' if is_named_start(replacements, prev, chars.peek().map(|(_, c)| *c)) => {
                let start = idx + 1;
                let mut end = start;
                while let Some(&(i, ch)) = chars.peek() {
                    if !is_ident_char(ch) {
                        break;
                    }
                    end = i + ch.len_utf8();
                    chars.next();
                }
                let name = &sql[start..end];
                let value = match replacements {
                    Replacements::Named(values) => values.get(name),
                    _ => None,
                }
                .ok_or_else(|| {
                    SqlError::param(format!("named parameter \":{name}\" has no value"))
                })?;
                out.push_str(&format_literal(value));
                prev = name.chars().last();
                continue;
            }
            _ => out.push(c),
        }
        prev = Some(c);
    }

    Ok(Cow::Owned(out))
}

fn is_named_start(replacements: &Replacements, prev: Option<char>, next: Option<char>) -> bool {
    matches!(replacements, Replacements::Named(_))
        && prev.is_none_or(|p| !(is_ident_char(p) || p == ':'))
        && next.is_some_and(|n| n.is_ascii_alphabetic() || n == '_')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn named(v: Value) -> Replacements {
        match v {
            Value::Object(map) => Replacements::Named(map),
            _ => unreachable!("named replacements need an object"),
        }
    }

    #[test]
    fn test_no_replacements_borrows() {
        let sql = "select * from t where a = :a";
        let out = bind(sql, &Replacements::None).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out, sql);
    }

    #[test]
    fn test_named() {
        let r = named(json!({"id": 5, "name": "o'neil", "gone": null}));
        let out = bind("select * from t where id = :id and name = :name or x = :gone", &r).unwrap();
        assert_eq!(
            out,
            "select * from t where id = 5 and name = 'o\\'neil' or x = NULL"
        );
    }

    #[test]
    fn test_named_array_expands_to_list() {
        let r = named(json!({"ids": [1, 2, "x"]}));
        let out = bind("select * from t where id in (:ids)", &r).unwrap();
        assert_eq!(out, "select * from t where id in (1, 2, 'x')");
    }

    #[test]
    fn test_named_skips_quoted_and_casts() {
        let r = named(json!({"a": 1}));
        let out = bind("select ':a', `:a`, '12:30', x::int, :a", &r).unwrap();
        assert_eq!(out, "select ':a', `:a`, '12:30', x::int, 1");
    }

    #[test]
    fn test_named_skips_escaped_quote_in_literal() {
        let r = named(json!({"a": 1}));
        let out = bind("select 'it\\'s :a', :a", &r).unwrap();
        assert_eq!(out, "select 'it\\'s :a', 1");
    }

    #[test]
    fn test_missing_named_value() {
        let r = named(json!({"a": 1}));
        let err = bind("select :b", &r).unwrap_err();
        assert!(err.is_param());
    }

    #[test]
    fn test_positional() {
        let r = Replacements::from(vec![json!(1), json!("a?b")]);
        let out = bind("update t set name = ? where id = ? and note = '?'", &r);
        // values are consumed in order: 1 then 'a?b'
        assert_eq!(
            out.unwrap(),
            "update t set name = 1 where id = 'a?b' and note = '?'"
        );
        let short = Replacements::from(vec![json!(1)]);
        assert!(bind("select ?, ?", &short).unwrap_err().is_param());
    }
}
