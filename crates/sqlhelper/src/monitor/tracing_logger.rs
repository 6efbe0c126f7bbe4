use super::truncate_sql_bytes;
use super::types::{SqlLogger, StatementContext, SuppressedError, TransactionEvent};
use crate::driver::TransactionId;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// A `tracing`-based logger, emitting on target `sqlhelper.sql`.
///
/// Statements are emitted at the level carried by their [`StatementContext`] unless a
/// fixed level is configured. Transaction events are emitted at INFO.
#[derive(Debug, Clone)]
pub struct TracingSqlLogger {
    /// Overrides the per-statement level when set.
    pub level: Option<Level>,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingSqlLogger {
    fn default() -> Self {
        Self {
            level: None,
            max_sql_length: Some(1000),
        }
    }
}

impl TracingSqlLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit every statement at `level`.
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl SqlLogger for TracingSqlLogger {
    fn on_statement(&self, ctx: &StatementContext<'_>) {
        let sql = self.truncate_sql(ctx.sql);
        let level = self.level.unwrap_or(ctx.level);
        match ctx.transaction_id {
            Some(id) => emit_at_level!(
                level,
                target: "sqlhelper.sql",
                statement_type = %ctx.statement_type,
                transaction_id = %id,
                sql = %sql,
            ),
            None => emit_at_level!(
                level,
                target: "sqlhelper.sql",
                statement_type = %ctx.statement_type,
                sql = %sql,
            ),
        }
    }

    fn on_transaction(&self, event: TransactionEvent, id: &TransactionId) {
        tracing::info!(target: "sqlhelper.sql", transaction_id = %id, "transaction {event}");
    }

    fn on_suppressed_error(&self, failure: &SuppressedError<'_>) {
        match failure.transaction_id {
            Some(id) => emit_at_level!(
                failure.level,
                target: "sqlhelper.sql",
                operation = failure.operation,
                transaction_id = %id,
                error = %failure.error,
                "{} failed",
                failure.operation
            ),
            None => emit_at_level!(
                failure.level,
                target: "sqlhelper.sql",
                operation = failure.operation,
                error = %failure.error,
                "{} failed",
                failure.operation
            ),
        }
    }
}
