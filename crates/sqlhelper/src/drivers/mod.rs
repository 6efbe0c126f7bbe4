//! `sqlx`-backed [`Driver`](crate::Driver) implementations.
//!
//! Each backend owns a pool plus a registry of open transactions keyed by
//! [`TransactionId`]. Statements bound to a transaction run on that transaction's
//! connection, one at a time, in the order they are issued. A transaction whose
//! handle is dropped unfinished is removed from the registry and rolled back by sqlx.
//!
//! Raw statements outside a transaction run on one acquired connection; when they
//! fail, `ROLLBACK` is issued on that connection so a script that opened its own
//! transaction does not leave it open in the pool.

#[cfg(feature = "mysql")]
mod mysql;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mysql")]
pub use mysql::MySqlDriver;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

use crate::driver::{Driver, ExecOptions, QueryOutput, ReleaseHook, TransactionId};
use crate::error::{SqlError, SqlResult};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

/// A statement future pinned to one connection borrow.
pub(crate) type StatementFuture<'a> = Pin<Box<dyn Future<Output = SqlResult<QueryOutput>> + Send + 'a>>;

/// One open transaction. The async mutex serializes statements on it.
pub(crate) type TransactionSlot<DB> = Arc<tokio::sync::Mutex<Option<sqlx::Transaction<'static, DB>>>>;

/// Open transactions of one driver.
pub(crate) struct TransactionRegistry<DB: sqlx::Database> {
    open: Mutex<HashMap<TransactionId, TransactionSlot<DB>>>,
}

impl<DB: sqlx::Database> Default for TransactionRegistry<DB> {
    fn default() -> Self {
        Self {
            open: Mutex::new(HashMap::new()),
        }
    }
}

impl<DB: sqlx::Database> TransactionRegistry<DB> {
    pub(crate) fn insert(&self, id: TransactionId, tx: sqlx::Transaction<'static, DB>) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(tokio::sync::Mutex::new(Some(tx))));
    }

    pub(crate) fn get(&self, id: &TransactionId) -> SqlResult<TransactionSlot<DB>> {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| unknown_transaction(id))
    }

    /// Detach the transaction; waits for an in-flight statement to finish.
    pub(crate) async fn take(&self, id: &TransactionId) -> SqlResult<sqlx::Transaction<'static, DB>> {
        let slot = self
            .open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| unknown_transaction(id))?;
        let tx = slot.lock().await.take();
        tx.ok_or_else(|| unknown_transaction(id))
    }

    /// Drop the transaction without waiting; sqlx rolls it back when the last
    /// reference goes away. Returns whether it was still registered.
    pub(crate) fn release(&self, id: &TransactionId) -> bool {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.open.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

fn unknown_transaction(id: &TransactionId) -> SqlError {
    SqlError::transaction(format!("unknown or finished transaction: {id}"))
}

/// Run one statement on `$executor`, shaping the result by statement type.
macro_rules! execute_on {
    ($executor:expr, $sql:expr, $statement_type:expr, $decode:path, $insert_id:path) => {
        match $statement_type {
            $crate::driver::StatementType::Select => {
                let rows = sqlx::Executor::fetch_all($executor, sqlx::query($sql)).await?;
                Ok($crate::driver::QueryOutput::Rows(
                    rows.iter().map($decode).collect(),
                ))
            }
            $crate::driver::StatementType::Insert => {
                let done = sqlx::Executor::execute($executor, sqlx::query($sql)).await?;
                Ok($crate::driver::QueryOutput::Inserted(
                    $crate::driver::InsertResult {
                        insert_id: $insert_id(&done),
                        affected_rows: done.rows_affected(),
                    },
                ))
            }
            $crate::driver::StatementType::Update | $crate::driver::StatementType::Delete => {
                let done = sqlx::Executor::execute($executor, sqlx::query($sql)).await?;
                Ok($crate::driver::QueryOutput::Affected(done.rows_affected()))
            }
            $crate::driver::StatementType::Raw => {
                let done = sqlx::Executor::execute($executor, sqlx::raw_sql($sql)).await?;
                Ok($crate::driver::QueryOutput::Affected(done.rows_affected()))
            }
        }
    };
}

/// Define a pool-backed driver for one sqlx database.
macro_rules! impl_sqlx_driver {
    (
        $(#[$meta:meta])*
        $name:ident {
            database: $db:ty,
            pool: $pool:ty,
            decode: $decode:path,
            insert_id: $insert_id:path $(,)?
        }
    ) => {
        $(#[$meta])*
        pub struct $name {
            pool: $pool,
            transactions: std::sync::Arc<$crate::drivers::TransactionRegistry<$db>>,
        }

        impl $name {
            pub fn from_pool(pool: $pool) -> Self {
                Self {
                    pool,
                    transactions: std::sync::Arc::default(),
                }
            }

            pub fn pool(&self) -> &$pool {
                &self.pool
            }

            /// Number of transactions begun and not yet committed or rolled back.
            pub fn open_transactions(&self) -> usize {
                self.transactions.len()
            }

            async fn run_statement(
                conn: &mut <$db as sqlx::Database>::Connection,
                sql: &str,
                statement_type: $crate::driver::StatementType,
            ) -> $crate::error::SqlResult<$crate::driver::QueryOutput> {
                $crate::drivers::execute_on!(&mut *conn, sql, statement_type, $decode, $insert_id)
            }

            /// [`run_statement`](Self::run_statement), boxed so the borrow of `conn`
            /// is fixed to `'a` when the future is checked for `Send`.
            fn run_on<'a>(
                conn: &'a mut <$db as sqlx::Database>::Connection,
                sql: &'a str,
                statement_type: $crate::driver::StatementType,
            ) -> $crate::drivers::StatementFuture<'a> {
                Box::pin(Self::run_statement(conn, sql, statement_type))
            }

            /// Run a raw statement on its own connection, rolling that connection
            /// back when the statement fails.
            async fn run_raw(
                &self,
                sql: &str,
            ) -> $crate::error::SqlResult<$crate::driver::QueryOutput> {
                let mut conn = self.pool.acquire().await?;
                let result = Self::run_on(&mut *conn, sql, $crate::driver::StatementType::Raw).await;
                if result.is_err() {
                    // Fails harmlessly when the script opened no transaction.
                    let _ = Self::run_on(&mut *conn, "ROLLBACK", $crate::driver::StatementType::Raw)
                        .await;
                }
                result
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("open_transactions", &self.open_transactions())
                    .finish_non_exhaustive()
            }
        }

        impl $crate::driver::Driver for $name {
            async fn execute(
                &self,
                sql: &str,
                options: $crate::driver::ExecOptions<'_>,
            ) -> $crate::error::SqlResult<$crate::driver::QueryOutput> {
                let bound = $crate::replacements::bind(sql, options.replacements)?;
                let sql: &str = &bound;
                match (options.transaction, options.statement_type) {
                    (None, $crate::driver::StatementType::Raw) => self.run_raw(sql).await,
                    (None, statement_type) => {
                        $crate::drivers::execute_on!(
                            &self.pool,
                            sql,
                            statement_type,
                            $decode,
                            $insert_id
                        )
                    }
                    (Some(id), statement_type) => {
                        let slot = self.transactions.get(id)?;
                        let mut guard = slot.lock().await;
                        let tx = guard.as_mut().ok_or_else(|| {
                            $crate::error::SqlError::transaction(format!(
                                "unknown or finished transaction: {id}"
                            ))
                        })?;
                        Self::run_on(&mut **tx, sql, statement_type).await
                    }
                }
            }

            async fn authenticate(&self) -> $crate::error::SqlResult<()> {
                sqlx::raw_sql("select 1").execute(&self.pool).await?;
                Ok(())
            }

            async fn begin_transaction(
                &self,
            ) -> $crate::error::SqlResult<$crate::driver::TransactionId> {
                let tx = self.pool.begin().await?;
                let id = $crate::driver::TransactionId::generate();
                self.transactions.insert(id.clone(), tx);
                Ok(id)
            }

            async fn commit(
                &self,
                id: &$crate::driver::TransactionId,
            ) -> $crate::error::SqlResult<()> {
                let tx = self.transactions.take(id).await?;
                tx.commit().await?;
                Ok(())
            }

            async fn rollback(
                &self,
                id: &$crate::driver::TransactionId,
            ) -> $crate::error::SqlResult<()> {
                let tx = self.transactions.take(id).await?;
                tx.rollback().await?;
                Ok(())
            }

            async fn close(&self) -> $crate::error::SqlResult<()> {
                self.pool.close().await;
                Ok(())
            }

            fn release_hook(&self) -> Option<$crate::driver::ReleaseHook> {
                let registry = std::sync::Arc::downgrade(&self.transactions);
                Some(std::sync::Arc::new(move |id: &$crate::driver::TransactionId| {
                    if let Some(registry) = registry.upgrade() {
                        registry.release(id);
                    }
                }))
            }
        }
    };
}

pub(crate) use execute_on;
pub(crate) use impl_sqlx_driver;

/// Driver chosen at runtime from a [`DbConfig`](crate::config::DbConfig).
#[derive(Debug)]
pub enum AnyDriver {
    #[cfg(feature = "mysql")]
    MySql(MySqlDriver),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteDriver),
}

macro_rules! delegate {
    ($self:ident, $driver:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "mysql")]
            AnyDriver::MySql($driver) => $call,
            #[cfg(feature = "sqlite")]
            AnyDriver::Sqlite($driver) => $call,
        }
    };
}

impl Driver for AnyDriver {
    async fn execute(&self, sql: &str, options: ExecOptions<'_>) -> SqlResult<QueryOutput> {
        delegate!(self, driver => driver.execute(sql, options).await)
    }

    async fn authenticate(&self) -> SqlResult<()> {
        delegate!(self, driver => driver.authenticate().await)
    }

    async fn begin_transaction(&self) -> SqlResult<TransactionId> {
        delegate!(self, driver => driver.begin_transaction().await)
    }

    async fn commit(&self, id: &TransactionId) -> SqlResult<()> {
        delegate!(self, driver => driver.commit(id).await)
    }

    async fn rollback(&self, id: &TransactionId) -> SqlResult<()> {
        delegate!(self, driver => driver.rollback(id).await)
    }

    async fn close(&self) -> SqlResult<()> {
        delegate!(self, driver => driver.close().await)
    }

    fn release_hook(&self) -> Option<ReleaseHook> {
        delegate!(self, driver => driver.release_hook())
    }
}
