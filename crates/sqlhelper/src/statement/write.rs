use super::{Guard, impl_statement_common, join_parts, require_table};
use crate::condition::{Filter, WhereSpec};
use crate::error::{SqlError, SqlResult};
use crate::escape::quote;
use crate::fragment::{
    Assignments, BatchRows, Clause, Fragment, InsertValues, Limit, Values, assemble, non_null,
    with_keyword,
};
use crate::transaction::Transaction;

/// `update <table> set ... [where]`.
#[derive(Debug, Clone, Default)]
pub struct Update {
    pub table: String,
    pub set: Option<Assignments>,
    pub filter: Option<Filter>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Update {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn set(mut self, set: impl Into<Assignments>) -> Self {
        self.set = Some(set.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let table = require_table(&self.table)?;
        let set = assemble(Clause::Update(self.set.as_ref()));
        if set.is_empty() {
            return Err(SqlError::param("params error: update needs at least one column"));
        }
        Ok(join_parts(&[
            "update",
            table,
            &set,
            &assemble(Clause::Where(self.filter.as_ref())),
        ]))
    }
}

/// `delete from <table> [where]`.
#[derive(Debug, Clone, Default)]
pub struct Delete {
    pub table: String,
    pub filter: Option<Filter>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Delete {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let table = require_table(&self.table)?;
        Ok(join_parts(&[
            "delete from",
            table,
            &assemble(Clause::Where(self.filter.as_ref())),
        ]))
    }
}

/// Insert flavour.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum InsertMode {
    #[default]
    Plain,
    /// `insert ignore into ...`
    Ignore,
    /// `... on duplicate key update ...`. Without explicit assignments every inserted
    /// column is refreshed with `col = values(col)`.
    OnDuplicateKeyUpdate(Option<Assignments>),
}

/// `insert into <table> (cols) values (...)`.
#[derive(Debug, Clone, Default)]
pub struct Insert {
    pub table: String,
    pub values: Option<InsertValues>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Insert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn values(mut self, values: impl Into<InsertValues>) -> Self {
        self.values = Some(values.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        self.to_sql_with(&InsertMode::Plain)
    }

    pub fn to_sql_with(&self, mode: &InsertMode) -> SqlResult<String> {
        let table = require_table(&self.table)?;
        let body = assemble(Clause::Insert(self.values.as_ref()));
        if body.is_empty() {
            return Err(SqlError::param("params error: insert needs at least one column"));
        }

        let head = match mode {
            InsertMode::Ignore => "insert ignore into",
            _ => "insert into",
        };
        let tail = match mode {
            InsertMode::OnDuplicateKeyUpdate(set) => self.on_duplicate_key(set.as_ref())?,
            _ => String::new(),
        };
        Ok(join_parts(&[head, table, &body, &tail]))
    }

    fn on_duplicate_key(&self, set: Option<&Assignments>) -> SqlResult<String> {
        let pairs: Vec<String> = match (set, &self.values) {
            (Some(Fragment::Raw(sql)), _) => {
                return Ok(with_keyword(sql, "on duplicate key update"));
            }
            (Some(Fragment::Structured(values)), _) => non_null(values)
                .map(|(k, v)| format!("{k} = {}", quote(v)))
                .collect(),
            (None, Some(Fragment::Structured(values))) => non_null(values)
                .map(|(k, _)| format!("{k} = values({k})"))
                .collect(),
            (None, _) => {
                return Err(SqlError::param(
                    "params error: raw insert values need explicit duplicate-key assignments",
                ));
            }
        };
        if pairs.is_empty() {
            return Err(SqlError::param(
                "params error: duplicate-key update needs at least one column",
            ));
        }
        Ok(format!("on duplicate key update {}", pairs.join(", ")))
    }
}

/// `insert into <table> (cols) values (...),(...)`.
#[derive(Debug, Clone, Default)]
pub struct BatchInsert {
    pub table: String,
    pub rows: BatchRows,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl BatchInsert {
    pub fn into(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn rows(mut self, rows: BatchRows) -> Self {
        self.rows = rows;
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let table = require_table(&self.table)?;
        if let Some(row) = self.rows.rows.iter().find(|r| r.len() != self.rows.columns.len()) {
            return Err(SqlError::param(format!(
                "params error: batch row has {} values for {} columns",
                row.len(),
                self.rows.columns.len()
            )));
        }
        let body = assemble(Clause::BatchInsert(Some(&self.rows)));
        if body.is_empty() {
            return Err(SqlError::param("params error: batch insert needs columns and rows"));
        }
        Ok(join_parts(&["insert into", table, &body]))
    }
}

/// Update the row matching `filter`, or insert one when none matches.
///
/// The lookup, the write and (when no transaction is supplied) the surrounding
/// transaction are driven by [`SqlHelper::update_or_insert`](crate::SqlHelper::update_or_insert).
#[derive(Debug, Clone, Default)]
pub struct UpdateOrInsert {
    pub table: String,
    pub values: Values,
    pub filter: WhereSpec,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl UpdateOrInsert {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn values(mut self, values: Values) -> Self {
        self.values = values;
        self
    }

    pub fn filter(mut self, filter: WhereSpec) -> Self {
        self.filter = filter;
        self
    }

    /// Check the parts every step needs, before anything runs.
    pub(crate) fn validate(&self) -> SqlResult<()> {
        require_table(&self.table)?;
        if non_null(&self.values).next().is_none() {
            return Err(SqlError::param(
                "params error: update or insert needs at least one column",
            ));
        }
        Ok(())
    }

    pub(crate) fn lookup(&self) -> super::Select {
        super::Select::table(self.table.clone())
            .columns("id")
            .filter(self.filter.clone())
            .limit(Limit::new(0, 1))
    }

    pub(crate) fn update(&self) -> Update {
        Update::table(self.table.clone())
            .set(self.values.clone())
            .filter(self.filter.clone())
    }

    /// The insert used when nothing matched: the values plus the filter's scalar
    /// and-terms, the latter winning on conflict.
    pub(crate) fn insert(&self) -> Insert {
        let mut merged = self.values.clone();
        for (field, value) in self.filter.and_scalars() {
            merged.insert(field.to_string(), value.clone());
        }
        Insert::into(self.table.clone()).values(merged)
    }
}

impl_statement_common!(Update, Delete, Insert, BatchInsert, UpdateOrInsert);
