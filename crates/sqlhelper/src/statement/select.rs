use super::{Guard, impl_statement_common, join_parts, require_table};
use crate::condition::Filter;
use crate::error::{SqlError, SqlResult};
use crate::fragment::{Clause, Columns, LimitClause, Lock, Ordering, assemble};
use crate::transaction::Transaction;

/// `select ... from <table> [where] [group by] [order by] [limit] [for update]`.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub from: String,
    pub columns: Option<Columns>,
    pub filter: Option<Filter>,
    pub group_by: Option<String>,
    pub order: Option<Ordering>,
    pub limit: Option<LimitClause>,
    pub lock: Option<Lock>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Select {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            from: table.into(),
            ..Self::default()
        }
    }

    pub fn columns(mut self, columns: impl Into<Columns>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    pub fn order(mut self, order: impl Into<Ordering>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<LimitClause>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn for_update(mut self, lock: impl Into<Lock>) -> Self {
        self.lock = Some(lock.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let from = require_table(&self.from)?;
        Ok(join_parts(&[
            &assemble(Clause::Select(self.columns.as_ref())),
            "from",
            from,
            &assemble(Clause::Where(self.filter.as_ref())),
            &assemble(Clause::GroupBy(self.group_by.as_deref())),
            &assemble(Clause::Order(self.order.as_ref())),
            &assemble(Clause::Limit(self.limit.as_ref())),
            &assemble(Clause::ForUpdate(self.lock.as_ref())),
        ]))
    }
}

/// `select sum(<expr>) as sum from <table> [where]`.
#[derive(Debug, Clone, Default)]
pub struct Sum {
    pub expr: String,
    pub from: String,
    pub filter: Option<Filter>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Sum {
    pub fn new(expr: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            expr: expr.into(),
            from: table.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let from = require_table(&self.from)?;
        let expr = self.expr.trim();
        if expr.is_empty() {
            return Err(SqlError::param("params error: sum expression is required"));
        }
        Ok(join_parts(&[
            &format!("select sum({expr}) as sum from"),
            from,
            &assemble(Clause::Where(self.filter.as_ref())),
        ]))
    }
}

/// `select count(*) as count from <table> [where]`.
#[derive(Debug, Clone, Default)]
pub struct Count {
    pub from: String,
    pub filter: Option<Filter>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl Count {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            from: table.into(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let from = require_table(&self.from)?;
        Ok(join_parts(&[
            "select count(*) as count from",
            from,
            &assemble(Clause::Where(self.filter.as_ref())),
        ]))
    }
}

/// Two-table select joined on one field pair:
/// `select ... from A <union_type> B on A.x = B.y [where] [order by] [limit] [for update]`.
#[derive(Debug, Clone, Default)]
pub struct UnionSelect {
    pub from: String,
    pub to: Option<String>,
    /// `(field of from, field of to)`.
    pub on: Option<(String, String)>,
    /// Join keyword, e.g. `left join`.
    pub union_type: Option<String>,
    pub columns: Option<Columns>,
    pub filter: Option<Filter>,
    pub order: Option<Ordering>,
    pub limit: Option<LimitClause>,
    pub lock: Option<Lock>,
    pub(crate) guard: Option<Guard>,
    pub(crate) transaction: Option<Transaction>,
}

impl UnionSelect {
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            ..Self::default()
        }
    }

    pub fn to(mut self, table: impl Into<String>) -> Self {
        self.to = Some(table.into());
        self
    }

    pub fn on(mut self, from_field: impl Into<String>, to_field: impl Into<String>) -> Self {
        self.on = Some((from_field.into(), to_field.into()));
        self
    }

    pub fn union_type(mut self, union_type: impl Into<String>) -> Self {
        self.union_type = Some(union_type.into());
        self
    }

    pub fn columns(mut self, columns: impl Into<Columns>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order(mut self, order: impl Into<Ordering>) -> Self {
        self.order = Some(order.into());
        self
    }

    pub fn limit(mut self, limit: impl Into<LimitClause>) -> Self {
        self.limit = Some(limit.into());
        self
    }

    pub fn for_update(mut self, lock: impl Into<Lock>) -> Self {
        self.lock = Some(lock.into());
        self
    }

    pub fn to_sql(&self) -> SqlResult<String> {
        let params_error =
            || SqlError::param("params error: union select needs from, to, on and union_type");

        let from = self.from.trim();
        let to = self.to.as_deref().map(str::trim).unwrap_or_default();
        let union_type = self.union_type.as_deref().map(str::trim).unwrap_or_default();
        if from.is_empty() || to.is_empty() || union_type.is_empty() {
            return Err(params_error());
        }
        let (from_field, to_field) = match &self.on {
            Some((a, b)) if !a.trim().is_empty() && !b.trim().is_empty() => (a.trim(), b.trim()),
            _ => return Err(params_error()),
        };

        let on = format!("on {from}.{from_field} = {to}.{to_field}");
        Ok(join_parts(&[
            &assemble(Clause::Select(self.columns.as_ref())),
            "from",
            from,
            union_type,
            to,
            &on,
            &assemble(Clause::Where(self.filter.as_ref())),
            &assemble(Clause::Order(self.order.as_ref())),
            &assemble(Clause::Limit(self.limit.as_ref())),
            &assemble(Clause::ForUpdate(self.lock.as_ref())),
        ]))
    }
}

impl_statement_common!(Select, Sum, Count, UnionSelect);
