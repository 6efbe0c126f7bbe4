//! Statement logging.
//!
//! Every rendered statement is handed to an injected [`SqlLogger`] right before it is
//! sent to the driver, together with the transaction it runs in. Transaction lifecycle
//! events (begin, commit, rollback, abandon) and failures the helper swallows go
//! through the same logger.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlhelper::monitor::TracingSqlLogger;
//! use sqlhelper::SqlHelper;
//! use tracing::Level;
//!
//! let helper = SqlHelper::new(driver)
//!     .with_logger(TracingSqlLogger::new().max_sql_length(500));
//! ```

mod tracing_logger;
mod types;


pub use tracing_logger::TracingSqlLogger;
pub use types::{NoopLogger, SqlLogger, StatementContext, SuppressedError, TransactionEvent};

/// Cut `sql` to at most `max_bytes`, backing off to a char boundary.
pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
