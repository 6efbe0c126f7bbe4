//! Clause fragments: typed clause inputs and the assembler that renders them.
//!
//! Every clause accepts either raw SQL text or structured data, modelled as
//! [`Fragment::Raw`] / [`Fragment::Structured`]. Rendering is pure; nothing here
//! touches a database.
//!
//! # Example
//! ```ignore
//! use sqlhelper::fragment::{assemble, Clause, Limit};
//!
//! let limit = Limit::new(10, 20).into();
//! assert_eq!(assemble(Clause::Limit(Some(&limit))), "limit 10, 20");
//! ```

use crate::condition::{Filter, assemble_where};
use crate::escape::{is_falsy, quote};
use serde_json::Value;
use std::fmt;

/// Column → value mapping used by inserts and updates. Keeps insertion order.
pub type Values = serde_json::Map<String, Value>;

/// A clause input: raw SQL text, or structured data rendered by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<T> {
    /// Raw SQL, passed through (keyword-prefixed where the clause has one).
    Raw(String),
    /// Structured input.
    Structured(T),
}

impl<T> Fragment<T> {
    pub fn raw(sql: impl Into<String>) -> Self {
        Fragment::Raw(sql.into())
    }

    pub fn structured(value: T) -> Self {
        Fragment::Structured(value)
    }
}

impl<T> From<&str> for Fragment<T> {
    fn from(sql: &str) -> Self {
        Fragment::Raw(sql.to_string())
    }
}

impl<T> From<String> for Fragment<T> {
    fn from(sql: String) -> Self {
        Fragment::Raw(sql)
    }
}

/// Projection list for `select`.
pub type Columns = Fragment<Vec<String>>;
/// `order by` input.
pub type Ordering = Fragment<Vec<OrderBy>>;
/// `limit` input.
pub type LimitClause = Fragment<Limit>;
/// `for update` input.
pub type Lock = Fragment<bool>;
/// `set` list for updates.
pub type Assignments = Fragment<Values>;
/// Column/value list for inserts.
pub type InsertValues = Fragment<Values>;

impl From<Vec<String>> for Columns {
    fn from(cols: Vec<String>) -> Self {
        Fragment::Structured(cols)
    }
}

impl From<&[&str]> for Columns {
    fn from(cols: &[&str]) -> Self {
        Fragment::Structured(cols.iter().map(|c| c.to_string()).collect())
    }
}

impl From<Vec<OrderBy>> for Ordering {
    fn from(terms: Vec<OrderBy>) -> Self {
        Fragment::Structured(terms)
    }
}

impl From<Limit> for LimitClause {
    fn from(limit: Limit) -> Self {
        Fragment::Structured(limit)
    }
}

impl From<(u64, u64)> for LimitClause {
    fn from((offset, count): (u64, u64)) -> Self {
        Fragment::Structured(Limit::new(offset, count))
    }
}

impl From<bool> for Lock {
    fn from(flag: bool) -> Self {
        Fragment::Structured(flag)
    }
}

impl From<Values> for Fragment<Values> {
    fn from(values: Values) -> Self {
        Fragment::Structured(values)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("asc"),
            Direction::Desc => f.write_str("desc"),
        }
    }
}

/// One `field direction` term of an `order by`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// `[offset, count]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub offset: u64,
    pub count: u64,
}

impl Limit {
    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }
}

/// Column list plus rows for a multi-row insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl BatchRows {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row of values, in column order.
    pub fn row(mut self, values: Vec<Value>) -> Self {
        self.rows.push(values);
        self
    }
}

/// A clause name together with its (optional) input.
#[derive(Debug, Clone, Copy)]
pub enum Clause<'a> {
    Select(Option<&'a Columns>),
    Where(Option<&'a Filter>),
    Order(Option<&'a Ordering>),
    Limit(Option<&'a LimitClause>),
    ForUpdate(Option<&'a Lock>),
    GroupBy(Option<&'a str>),
    Update(Option<&'a Assignments>),
    Insert(Option<&'a InsertValues>),
    BatchInsert(Option<&'a BatchRows>),
}

/// Render a single clause fragment.
///
/// Keyword-bearing clauses prefix raw input with their keyword unless it is already
/// present, so `limit 5` and `5` both render as `limit 5`.
pub fn assemble(clause: Clause<'_>) -> String {
    match clause {
        Clause::Select(input) => render_select(input),
        Clause::Where(input) => assemble_where(input),
        Clause::Order(input) => render_order(input),
        Clause::Limit(input) => render_limit(input),
        Clause::ForUpdate(input) => render_lock(input),
        Clause::GroupBy(input) => input.map(|s| with_keyword(s, "group by")).unwrap_or_default(),
        Clause::Update(input) => render_assignments(input),
        Clause::Insert(input) => render_insert(input),
        Clause::BatchInsert(input) => input.map(render_batch).unwrap_or_default(),
    }
}

fn render_select(input: Option<&Columns>) -> String {
    match input {
        Some(Fragment::Raw(sql)) if !sql.trim().is_empty() => with_keyword(sql, "select"),
        Some(Fragment::Structured(cols)) if !cols.is_empty() => {
            format!("select {}", cols.join(","))
        }
        _ => "select *".to_string(),
    }
}

fn render_order(input: Option<&Ordering>) -> String {
    match input {
        Some(Fragment::Raw(sql)) => with_keyword(sql, "order by"),
        Some(Fragment::Structured(terms)) if !terms.is_empty() => {
            let terms: Vec<String> = terms
                .iter()
                .map(|t| format!("{} {}", t.field, t.direction))
                .collect();
            format!("order by {}", terms.join(","))
        }
        _ => String::new(),
    }
}

fn render_limit(input: Option<&LimitClause>) -> String {
    match input {
        Some(Fragment::Raw(sql)) => with_keyword(sql, "limit"),
        Some(Fragment::Structured(limit)) => format!("limit {}, {}", limit.offset, limit.count),
        None => String::new(),
    }
}

fn render_lock(input: Option<&Lock>) -> String {
    match input {
        Some(Fragment::Raw(sql)) => with_keyword(sql, "for update"),
        Some(Fragment::Structured(true)) => "for update".to_string(),
        _ => String::new(),
    }
}

fn render_assignments(input: Option<&Assignments>) -> String {
    match input {
        Some(Fragment::Raw(sql)) => with_keyword(sql, "set"),
        Some(Fragment::Structured(values)) => {
            let pairs: Vec<String> = non_null(values)
                .map(|(k, v)| format!("{k} = {}", quote(v)))
                .collect();
            if pairs.is_empty() {
                String::new()
            } else {
                format!("set {}", pairs.join(", "))
            }
        }
        None => String::new(),
    }
}

fn render_insert(input: Option<&InsertValues>) -> String {
    match input {
        Some(Fragment::Raw(sql)) => sql.trim().to_string(),
        Some(Fragment::Structured(values)) => {
            let (fields, literals): (Vec<&str>, Vec<String>) = non_null(values)
                .map(|(k, v)| (k.as_str(), quote(v)))
                .unzip();
            if fields.is_empty() {
                String::new()
            } else {
                format!("({}) values ({})", fields.join(","), literals.join(","))
            }
        }
        None => String::new(),
    }
}

fn render_batch(batch: &BatchRows) -> String {
    if batch.columns.is_empty() || batch.rows.is_empty() {
        return String::new();
    }
    let rows: Vec<String> = batch
        .rows
        .iter()
        .map(|row| {
            let values: Vec<String> = row
                .iter()
                .map(|v| if is_falsy(v) { "NULL".to_string() } else { quote(v) })
                .collect();
            format!("({})", values.join(","))
        })
        .collect();
    format!("({}) values {}", batch.columns.join(","), rows.join(","))
}

/// Entries whose value is not null, in insertion order. Never mutates the input.
pub(crate) fn non_null(values: &Values) -> impl Iterator<Item = (&String, &Value)> {
    values.iter().filter(|(_, v)| !v.is_null())
}

/// Prefix `keyword` unless `sql` already starts with it (case-insensitive).
/// Blank input renders as an empty fragment.
pub(crate) fn with_keyword(sql: &str, keyword: &str) -> String {
    let sql = sql.trim();
    if sql.is_empty() {
        return String::new();
    }
    if starts_with_keyword(sql, keyword) {
        sql.to_string()
    } else {
        format!("{keyword} {sql}")
    }
}

/// Case-insensitive keyword test; multi-word keywords tolerate any whitespace run
/// between words, and the keyword must end at a word boundary.
pub(crate) fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    let mut rest = sql;
    for (i, word) in keyword.split_whitespace().enumerate() {
        if i > 0 {
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() {
                return false;
            }
            rest = trimmed;
        }
        match rest.get(..word.len()) {
            Some(head) if head.eq_ignore_ascii_case(word) => rest = &rest[word.len()..],
            _ => return false,
        }
    }
    rest.chars()
        .next()
        .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
}
