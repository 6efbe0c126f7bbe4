//! Transaction lifecycle: begin, commit, rollback.
//!
//! A [`Transaction`] is a cheap, clonable handle around a driver-side transaction id
//! and a `finished` flag. `commit` and `rollback` are both safe to call more than once:
//! once the handle is finished every further call is a no-op.
//!
//! For ergonomic commit/rollback handling, use [`SqlHelper::run_in_transaction`] or the
//! [`transaction!`](crate::transaction!) macro.
//!
//! # Example
//!
//! ```ignore
//! use sqlhelper::{SqlResult, Update, WhereSpec};
//!
//! # async fn demo(helper: &sqlhelper::SqlHelper<impl sqlhelper::Driver>) -> SqlResult<()> {
//! sqlhelper::transaction!(helper, tx, {
//!     helper
//!         .update(
//!             Update::table("accounts")
//!                 .set("balance = balance - 100")
//!                 .filter(WhereSpec::new().and("id", 1))
//!                 .transaction(&tx),
//!         )
//!         .await?;
//!     Ok(())
//! })?;
//! # Ok(()) }
//! ```

use crate::driver::{Driver, ReleaseHook, TransactionId};
use crate::error::SqlResult;
use crate::helper::SqlHelper;
use crate::monitor::{SuppressedError, TransactionEvent};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Runs the given block inside a transaction.
///
/// - Begins a transaction via `$helper.begin().await`.
/// - Commits on `Ok(_)`; if the commit fails the transaction is rolled back and the
///   commit error returned.
/// - Rolls back on `Err(_)` and returns the original error.
///
/// The block must evaluate to `sqlhelper::SqlResult<T>`.
#[macro_export]
macro_rules! transaction {
    ($helper:expr, $tx:ident, $body:block) => {{
        let __sqlhelper = &$helper;
        let $tx = __sqlhelper.begin().await?;

        let __sqlhelper_tx_body_result = async { $body }.await;
        match __sqlhelper_tx_body_result {
            Ok(value) => match __sqlhelper.commit(&$tx).await {
                Ok(()) => Ok(value),
                Err(error) => {
                    __sqlhelper.rollback(&$tx).await;
                    Err(error)
                }
            },
            Err(error) => {
                __sqlhelper.rollback(&$tx).await;
                Err(error)
            }
        }
    }};
}

/// Handle to an open (or finished) transaction.
///
/// Dropping the last clone of a handle that was never committed or rolled back
/// releases the driver-side transaction, which rolls it back.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TransactionInner>,
}

struct TransactionInner {
    id: TransactionId,
    finished: AtomicBool,
    on_abandon: Option<ReleaseHook>,
}

impl Drop for TransactionInner {
    fn drop(&mut self) {
        if *self.finished.get_mut() {
            return;
        }
        if let Some(release) = &self.on_abandon {
            release(&self.id);
        }
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, on_abandon: Option<ReleaseHook>) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                id,
                finished: AtomicBool::new(false),
                on_abandon,
            }),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.inner.id
    }

    /// Whether `commit` or `rollback` already ran.
    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Mark finished; returns `true` if it already was.
    fn finish(&self) -> bool {
        self.inner.finished.swap(true, Ordering::AcqRel)
    }
}

impl<D: Driver> SqlHelper<D> {
    /// Open a transaction. Driver failures are returned, never retried.
    pub async fn begin(&self) -> SqlResult<Transaction> {
        let id = self.driver.begin_transaction().await?;
        self.logger.on_transaction(TransactionEvent::Begin, &id);
        Ok(Transaction::new(id, Some(self.abandon_hook())))
    }

    /// Log the abandoned transaction, then let the driver release it.
    fn abandon_hook(&self) -> ReleaseHook {
        let logger = Arc::clone(&self.logger);
        let release = self.driver.release_hook();
        Arc::new(move |id: &TransactionId| {
            logger.on_transaction(TransactionEvent::Abandon, id);
            if let Some(release) = &release {
                release(id);
            }
        })
    }

    /// Commit `tx`. No-op when it is already finished.
    ///
    /// The handle is only marked finished once the driver reports success, so a
    /// failed commit can still be rolled back.
    pub async fn commit(&self, tx: &Transaction) -> SqlResult<()> {
        if tx.is_finished() {
            return Ok(());
        }
        self.driver.commit(tx.id()).await?;
        tx.finish();
        self.logger.on_transaction(TransactionEvent::Commit, tx.id());
        Ok(())
    }

    /// Roll back `tx`. No-op when it is already finished.
    ///
    /// Rollback failures are reported to the logger at WARN and otherwise ignored.
    pub async fn rollback(&self, tx: &Transaction) {
        if tx.finish() {
            return;
        }
        match self.driver.rollback(tx.id()).await {
            Ok(()) => self.logger.on_transaction(TransactionEvent::Rollback, tx.id()),
            Err(error) => self.logger.on_suppressed_error(
                &SuppressedError::new("rollback", &error).with_transaction(Some(tx.id())),
            ),
        }
    }

    /// Run `body` inside a fresh transaction: commit when it succeeds, roll back and
    /// return its error when it fails.
    pub async fn run_in_transaction<F, Fut, T>(&self, body: F) -> SqlResult<T>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = SqlResult<T>>,
    {
        let tx = self.begin().await?;
        match body(tx.clone()).await {
            Ok(value) => match self.commit(&tx).await {
                Ok(()) => Ok(value),
                Err(error) => {
                    self.rollback(&tx).await;
                    Err(error)
                }
            },
            Err(error) => {
                self.rollback(&tx).await;
                Err(error)
            }
        }
    }
}
