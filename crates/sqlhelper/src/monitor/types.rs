use crate::driver::{StatementType, TransactionId};
use crate::error::SqlError;
use std::fmt;
use tracing::Level;

/// A statement about to be executed.
#[derive(Debug, Clone)]
pub struct StatementContext<'a> {
    /// Fully rendered SQL (replacements are bound later by the driver).
    pub sql: &'a str,
    pub statement_type: StatementType,
    /// Transaction the statement runs in, if any.
    pub transaction_id: Option<&'a TransactionId>,
    /// Suggested level: DEBUG for reads, INFO for everything else.
    pub level: Level,
}

impl<'a> StatementContext<'a> {
    pub fn new(sql: &'a str, statement_type: StatementType) -> Self {
        let level = if statement_type.is_read() {
            Level::DEBUG
        } else {
            Level::INFO
        };
        Self {
            sql,
            statement_type,
            transaction_id: None,
            level,
        }
    }

    pub fn with_transaction(mut self, id: Option<&'a TransactionId>) -> Self {
        self.transaction_id = id;
        self
    }
}

/// Transaction lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEvent {
    Begin,
    Commit,
    Rollback,
    /// The last handle was dropped while the transaction was still open.
    Abandon,
}

impl fmt::Display for TransactionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionEvent::Begin => f.write_str("begin"),
            TransactionEvent::Commit => f.write_str("commit"),
            TransactionEvent::Rollback => f.write_str("rollback"),
            TransactionEvent::Abandon => f.write_str("abandon"),
        }
    }
}

/// A failure the helper recovered from instead of returning it.
#[derive(Debug, Clone, Copy)]
pub struct SuppressedError<'a> {
    /// What was being attempted, e.g. `"rollback"`.
    pub operation: &'static str,
    pub error: &'a SqlError,
    pub transaction_id: Option<&'a TransactionId>,
    /// Suggested level; WARN unless the caller lowers it.
    pub level: Level,
}

impl<'a> SuppressedError<'a> {
    pub fn new(operation: &'static str, error: &'a SqlError) -> Self {
        Self {
            operation,
            error,
            transaction_id: None,
            level: Level::WARN,
        }
    }

    pub fn with_transaction(mut self, id: Option<&'a TransactionId>) -> Self {
        self.transaction_id = id;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Receives statements, transaction events and suppressed failures.
pub trait SqlLogger: Send + Sync {
    /// Called before a statement is executed.
    fn on_statement(&self, ctx: &StatementContext<'_>);

    /// Called after a transaction event succeeded.
    fn on_transaction(&self, event: TransactionEvent, id: &TransactionId) {
        let _ = (event, id);
    }

    /// Called when a failure is swallowed (a failed rollback, a failed drop before
    /// `create database`).
    fn on_suppressed_error(&self, failure: &SuppressedError<'_>) {
        let _ = failure;
    }
}

/// A logger that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl SqlLogger for NoopLogger {
    fn on_statement(&self, _ctx: &StatementContext<'_>) {}
}
