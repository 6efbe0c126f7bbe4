//! WHERE clause composition.
//!
//! A [`WhereSpec`] carries two optional groups, `and` and `or`. Each group is either a
//! raw predicate or an ordered list of `field → ConditionValue` terms. Rendering rules:
//!
//! - and-terms are joined with `and`, or-terms with `or`
//! - with both groups present: `where <and> and (<or>)`
//! - with one group present: `where <group>`
//! - with no terms at all: no clause (empty string, never `where 1 = 1`)
//!
//! # Example
//! ```ignore
//! use sqlhelper::condition::{WhereSpec, assemble_where};
//!
//! let spec = WhereSpec::new().and("a", 1).or("b", 2).or("c", 3);
//! assert_eq!(
//!     assemble_where(Some(&spec.into())),
//!     "where a = '1' and (b = '2' or c = '3')"
//! );
//! ```

use crate::error::{SqlError, SqlResult};
use crate::escape::quote;
use crate::fragment::{Fragment, starts_with_keyword};
use serde_json::Value;

/// Marker prefix for literal-operator values: `"s:in (5,7)"` renders `field in (5,7)`.
///
/// The remainder is spliced into the SQL verbatim. Only use it with trusted input.
pub const LITERAL_MARKER: &str = "s:";

/// The value side of one condition term.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValue {
    /// Spliced verbatim after the field name (escape hatch for custom operators).
    Literal(String),
    /// Equality against an escaped, quoted value.
    Scalar(Value),
    /// `field in (...)` over escaped, quoted values.
    List(Vec<Value>),
}

impl ConditionValue {
    /// Literal-operator value, e.g. `ConditionValue::literal("> 5")`.
    pub fn literal(sql: impl Into<String>) -> Self {
        ConditionValue::Literal(sql.into())
    }

    /// Classify a loosely-typed value. Null yields `None` (the term is dropped).
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::from(s)),
            Value::Array(items) => Some(ConditionValue::List(items)),
            other => Some(ConditionValue::Scalar(other)),
        }
    }

    fn render(&self, field: &str) -> String {
        match self {
            ConditionValue::Literal(sql) => {
                let sql = sql.trim();
                if starts_with_keyword(sql, field) {
                    sql.to_string()
                } else {
                    format!("{field} {sql}")
                }
            }
            ConditionValue::Scalar(value) => format!("{field} = {}", quote(value)),
            ConditionValue::List(items) if items.is_empty() => "1 = 0".to_string(),
            ConditionValue::List(items) => {
                let items: Vec<String> = items.iter().map(quote).collect();
                format!("{field} in ({})", items.join(","))
            }
        }
    }
}

impl From<String> for ConditionValue {
    fn from(s: String) -> Self {
        match s.strip_prefix(LITERAL_MARKER) {
            Some(rest) => ConditionValue::Literal(rest.to_string()),
            None => ConditionValue::Scalar(Value::String(s)),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

macro_rules! scalar_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ConditionValue {
                fn from(v: $ty) -> Self {
                    ConditionValue::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_from!(i32, i64, u32, u64, f64, bool);

impl<T: Into<Value>> From<Vec<T>> for ConditionValue {
    fn from(items: Vec<T>) -> Self {
        ConditionValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// One side (`and` or `or`) of a [`WhereSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum Group {
    /// A raw predicate used verbatim.
    Raw(String),
    /// Ordered field terms.
    Fields(Vec<(String, ConditionValue)>),
}

impl Group {
    /// Build a field group from a JSON object, dropping null-valued entries.
    pub fn from_map(map: &serde_json::Map<String, Value>) -> Self {
        Group::Fields(
            map.iter()
                .filter_map(|(k, v)| ConditionValue::from_value(v.clone()).map(|c| (k.clone(), c)))
                .collect(),
        )
    }

    fn terms(&self) -> Vec<String> {
        match self {
            Group::Raw(sql) if sql.trim().is_empty() => Vec::new(),
            Group::Raw(sql) => vec![sql.trim().to_string()],
            Group::Fields(fields) => fields.iter().map(|(f, v)| v.render(f)).collect(),
        }
    }

    fn push(group: &mut Option<Group>, field: String, value: ConditionValue) {
        match group {
            Some(Group::Fields(fields)) => fields.push((field, value)),
            _ => *group = Some(Group::Fields(vec![(field, value)])),
        }
    }
}

/// Structured WHERE input: an `and` group and an `or` group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereSpec {
    pub and: Option<Group>,
    pub or: Option<Group>,
}

/// WHERE input: raw predicate text or a [`WhereSpec`].
pub type Filter = Fragment<WhereSpec>;

impl WhereSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an and-term. Replaces a raw `and` group.
    pub fn and(mut self, field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Group::push(&mut self.and, field.into(), value.into());
        self
    }

    /// Add an or-term. Replaces a raw `or` group.
    pub fn or(mut self, field: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        Group::push(&mut self.or, field.into(), value.into());
        self
    }

    /// Use a raw predicate as the `and` group.
    pub fn and_raw(mut self, sql: impl Into<String>) -> Self {
        self.and = Some(Group::Raw(sql.into()));
        self
    }

    /// Use a raw predicate as the `or` group.
    pub fn or_raw(mut self, sql: impl Into<String>) -> Self {
        self.or = Some(Group::Raw(sql.into()));
        self
    }

    /// Scalar and-terms, usable as column values (e.g. when an upsert falls back to
    /// inserting the filter's columns).
    pub fn and_scalars(&self) -> impl Iterator<Item = (&str, &Value)> {
        let fields: &[(String, ConditionValue)] = match &self.and {
            Some(Group::Fields(fields)) => fields.as_slice(),
            _ => &[],
        };
        fields.iter().filter_map(|(f, v)| match v {
            ConditionValue::Scalar(value) => Some((f.as_str(), value)),
            _ => None,
        })
    }

    /// Render the predicate without the `where` keyword. Empty when there are no terms.
    pub fn predicate(&self) -> String {
        let and_terms = self.and.as_ref().map(Group::terms).unwrap_or_default();
        let or_terms = self.or.as_ref().map(Group::terms).unwrap_or_default();

        match (and_terms.is_empty(), or_terms.is_empty()) {
            (true, true) => String::new(),
            (false, true) => and_terms.join(" and "),
            (true, false) => or_terms.join(" or "),
            (false, false) => format!("{} and ({})", and_terms.join(" and "), or_terms.join(" or ")),
        }
    }
}

impl From<WhereSpec> for Filter {
    fn from(spec: WhereSpec) -> Self {
        Fragment::Structured(spec)
    }
}

/// Render a WHERE clause, keyword included. Absent or empty input renders as `""`.
pub fn assemble_where(filter: Option<&Filter>) -> String {
    match filter {
        None => String::new(),
        Some(Fragment::Raw(sql)) => crate::fragment::with_keyword(sql, "where"),
        Some(Fragment::Structured(spec)) => {
            let predicate = spec.predicate();
            if predicate.is_empty() {
                predicate
            } else {
                format!("where {predicate}")
            }
        }
    }
}

impl TryFrom<&Value> for Filter {
    type Error = SqlError;

    /// Accepts a raw predicate string or an object with optional `and` / `or` keys,
    /// each a string or an object of field conditions.
    fn try_from(value: &Value) -> SqlResult<Self> {
        fn group(key: &str, value: Option<&Value>) -> SqlResult<Option<Group>> {
            match value {
                None | Some(Value::Null) => Ok(None),
                Some(Value::String(s)) => Ok(Some(Group::Raw(s.clone()))),
                Some(Value::Object(map)) => Ok(Some(Group::from_map(map))),
                Some(other) => Err(SqlError::param(format!(
                    "where.{key} must be a string or an object, got {other}"
                ))),
            }
        }

        match value {
            Value::String(s) => Ok(Fragment::Raw(s.clone())),
            Value::Object(map) => {
                if let Some(key) = map.keys().find(|k| *k != "and" && *k != "or") {
                    return Err(SqlError::param(format!("unknown where group: {key}")));
                }
                Ok(Fragment::Structured(WhereSpec {
                    and: group("and", map.get("and"))?,
                    or: group("or", map.get("or"))?,
                }))
            }
            other => Err(SqlError::param(format!(
                "where must be a string or an object, got {other}"
            ))),
        }
    }
}
