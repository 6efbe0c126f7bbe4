//! Statement options: full SELECT / INSERT / UPDATE / DELETE descriptions.
//!
//! Each option struct names its table, carries its clause inputs and renders itself
//! with `to_sql()`. Rendering never touches the database; missing required parts are
//! reported as [`SqlError::Param`](crate::SqlError::Param) before any SQL exists.
//!
//! Every statement also takes an optional [`Guard`] (`when`) and an optional
//! transaction (`transaction`), which the executor honours.

mod select;
mod write;


pub use select::{Count, Select, Sum, UnionSelect};
pub use write::{BatchInsert, Delete, Insert, InsertMode, Update, UpdateOrInsert};

use crate::error::{SqlError, SqlResult};
use std::fmt;
use std::sync::Arc;

/// Conditional execution: a statement runs only when its guard allows it.
#[derive(Clone)]
pub enum Guard {
    Flag(bool),
    Check(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl Guard {
    /// Guard evaluated lazily, at execution time.
    pub fn check<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Guard::Check(Arc::new(f))
    }

    pub fn allows(&self) -> bool {
        match self {
            Guard::Flag(flag) => *flag,
            Guard::Check(f) => f(),
        }
    }
}

impl From<bool> for Guard {
    fn from(flag: bool) -> Self {
        Guard::Flag(flag)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Flag(flag) => f.debug_tuple("Flag").field(flag).finish(),
            Guard::Check(_) => f.write_str("Check(..)"),
        }
    }
}

/// Builder methods shared by every statement.
macro_rules! impl_statement_common {
    ($($ty:ident),* $(,)?) => {
        $(
            impl $ty {
                /// Only run when `guard` allows it; otherwise the executor returns the
                /// statement's empty default.
                pub fn when(mut self, guard: impl Into<$crate::statement::Guard>) -> Self {
                    self.guard = Some(guard.into());
                    self
                }

                /// Run inside `tx`.
                pub fn transaction(mut self, tx: &$crate::transaction::Transaction) -> Self {
                    self.transaction = Some(tx.clone());
                    self
                }

                pub(crate) fn allowed(&self) -> bool {
                    self.guard.as_ref().is_none_or($crate::statement::Guard::allows)
                }

                pub(crate) fn transaction_id(&self) -> Option<&$crate::driver::TransactionId> {
                    self.transaction.as_ref().map($crate::transaction::Transaction::id)
                }
            }
        )*
    };
}

pub(crate) use impl_statement_common;

/// The table name, or a parameter error when it is blank.
fn require_table(table: &str) -> SqlResult<&str> {
    let table = table.trim();
    if table.is_empty() {
        Err(SqlError::param("params error: from is required"))
    } else {
        Ok(table)
    }
}

/// Join non-empty parts with single spaces.
fn join_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
