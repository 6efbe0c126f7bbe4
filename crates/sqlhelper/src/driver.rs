//! The driver seam: an opaque backend that executes SQL text.
//!
//! [`SqlHelper`](crate::SqlHelper) never talks to a database directly. It renders SQL
//! and hands it to a [`Driver`] together with [`ExecOptions`] naming the statement
//! type, raw-SQL replacements and the transaction to run in.

use crate::error::SqlResult;
use crate::replacements::Replacements;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A result row: column name → value, in select-list order.
pub type Row = serde_json::Map<String, Value>;

/// Statement category, which decides the shape of the driver's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    /// Anything else (DDL, multi-statement scripts).
    Raw,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Select => "SELECT",
            StatementType::Insert => "INSERT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::Raw => "RAW",
        }
    }

    /// Whether the statement only reads.
    pub fn is_read(&self) -> bool {
        matches!(self, StatementType::Select)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of a driver-side transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Per-statement execution options.
#[derive(Debug, Clone, Copy)]
pub struct ExecOptions<'a> {
    pub statement_type: StatementType,
    pub replacements: &'a Replacements,
    pub transaction: Option<&'a TransactionId>,
}

impl<'a> ExecOptions<'a> {
    pub fn new(statement_type: StatementType) -> Self {
        Self {
            statement_type,
            replacements: &NO_REPLACEMENTS,
            transaction: None,
        }
    }

    pub fn replacements(mut self, replacements: &'a Replacements) -> Self {
        self.replacements = replacements;
        self
    }

    pub fn transaction(mut self, transaction: Option<&'a TransactionId>) -> Self {
        self.transaction = transaction;
        self
    }
}

static NO_REPLACEMENTS: Replacements = Replacements::None;

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertResult {
    /// Generated key of the (first) inserted row, when the backend reports one.
    pub insert_id: Option<u64>,
    pub affected_rows: u64,
}

/// What a driver returns for one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// Rows of a select.
    Rows(Vec<Row>),
    /// Result of an insert.
    Inserted(InsertResult),
    /// Affected-row count of an update, delete or raw statement.
    Affected(u64),
}

impl QueryOutput {
    /// Rows, or an empty list for non-select output.
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Rows(rows) => rows,
            _ => Vec::new(),
        }
    }

    pub fn affected_rows(&self) -> u64 {
        match self {
            QueryOutput::Rows(rows) => rows.len() as u64,
            QueryOutput::Inserted(result) => result.affected_rows,
            QueryOutput::Affected(n) => *n,
        }
    }

    pub fn insert_result(&self) -> Option<InsertResult> {
        match self {
            QueryOutput::Inserted(result) => Some(*result),
            _ => None,
        }
    }
}

/// A database backend.
///
/// Implementations own connection management and transaction bookkeeping; the helper
/// only ever refers to a transaction through its [`TransactionId`].
pub trait Driver: Send + Sync {
    /// Execute one statement.
    fn execute(
        &self,
        sql: &str,
        options: ExecOptions<'_>,
    ) -> impl std::future::Future<Output = SqlResult<QueryOutput>> + Send;

    /// Verify that the backend is reachable.
    fn authenticate(&self) -> impl std::future::Future<Output = SqlResult<()>> + Send;

    /// Start a transaction and return its id.
    fn begin_transaction(
        &self,
    ) -> impl std::future::Future<Output = SqlResult<TransactionId>> + Send;

    fn commit(&self, id: &TransactionId) -> impl std::future::Future<Output = SqlResult<()>> + Send;

    fn rollback(
        &self,
        id: &TransactionId,
    ) -> impl std::future::Future<Output = SqlResult<()>> + Send;

    /// Release all connections.
    fn close(&self) -> impl std::future::Future<Output = SqlResult<()>> + Send;

    /// Synchronous cleanup for a transaction whose handle was dropped while still
    /// open. Drivers that keep per-transaction state return a hook that discards it;
    /// the default keeps no state.
    fn release_hook(&self) -> Option<ReleaseHook> {
        None
    }
}

/// Called with the id of an open transaction whose last handle was dropped.
pub type ReleaseHook = Arc<dyn Fn(&TransactionId) + Send + Sync>;
