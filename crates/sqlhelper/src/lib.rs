//! # sqlhelper
//!
//! A small query-fragment assembler over an opaque database driver.
//!
//! ## Features
//!
//! - **Raw or structured clauses**: every clause takes SQL text or structured data
//! - **and/or where composition**: `where <and-terms> and (<or-terms>)`, never `where 1 = 1`
//! - **Guards**: any statement can be skipped by a flag or predicate, returning an empty default
//! - **Idempotent transactions**: `commit` / `rollback` are safe to call repeatedly
//! - **Pluggable drivers**: MySQL and SQLite via `sqlx`, or any [`Driver`] implementation
//! - **Statement logging**: every statement goes through an injected [`SqlLogger`]
//!
//! Values are escaped MySQL style (backslash before `\` and `'`) and spliced into the
//! SQL text. This is not a substitute for bound parameters: validate untrusted input.
//!
//! ## Example
//!
//! ```ignore
//! use sqlhelper::{Insert, Select, SqlHelper, WhereSpec, OrderBy, Limit};
//! use serde_json::json;
//!
//! let helper = sqlhelper::connect(&sqlhelper::DbConfig::from_toml_file("db.toml")?).await?;
//!
//! // select * from orders where user_id = '7' and (status = '1' or status = '2')
//! //   order by id desc limit 0, 10
//! let rows = helper
//!     .select(
//!         Select::table("orders")
//!             .filter(WhereSpec::new().and("user_id", 7).or("status", 1).or("status", 2))
//!             .order(vec![OrderBy::desc("id")])
//!             .limit(Limit::new(0, 10)),
//!     )
//!     .await?;
//!
//! // insert into orders (user_id,amount) values ('7','9.5')
//! let values = json!({"user_id": 7, "amount": 9.5, "note": null});
//! helper
//!     .insert(Insert::into("orders").values(values.as_object().cloned().unwrap_or_default()))
//!     .await?;
//! ```

pub mod condition;
pub mod config;
pub mod driver;
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub mod drivers;
pub mod error;
pub mod escape;
pub mod fragment;
pub mod helper;
pub mod monitor;
pub mod replacements;
pub mod statement;
pub mod transaction;

pub use condition::{ConditionValue, Filter, Group, WhereSpec, assemble_where};
pub use config::{DbConfig, DbType, PoolConfig};
pub use driver::{
    Driver, ExecOptions, InsertResult, QueryOutput, ReleaseHook, Row, StatementType,
    TransactionId,
};
pub use error::{SqlError, SqlResult};
pub use escape::{escape, quote};
pub use fragment::{
    Assignments, BatchRows, Clause, Columns, Direction, Fragment, InsertValues, Limit,
    LimitClause, Lock, OrderBy, Ordering, Values, assemble,
};
pub use helper::SqlHelper;
pub use monitor::{
    NoopLogger, SqlLogger, StatementContext, SuppressedError, TracingSqlLogger, TransactionEvent,
};
pub use replacements::Replacements;
pub use statement::{
    BatchInsert, Count, Delete, Guard, Insert, InsertMode, Select, Sum, UnionSelect, Update,
    UpdateOrInsert,
};
pub use transaction::Transaction;

#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub use config::connect;
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub use drivers::AnyDriver;
#[cfg(feature = "mysql")]
pub use drivers::MySqlDriver;
#[cfg(feature = "sqlite")]
pub use drivers::SqliteDriver;
