//! The statement executor.
//!
//! [`SqlHelper`] renders statement options into SQL, logs it, and runs it on its
//! [`Driver`]. Every structured operation checks its guard first and returns an empty
//! default without touching the database when the guard says no.

use crate::condition::Filter;
use crate::driver::{Driver, ExecOptions, InsertResult, QueryOutput, Row, StatementType};
use crate::error::{SqlError, SqlResult};
use crate::fragment::{Assignments, Limit};
use crate::monitor::{SqlLogger, StatementContext, SuppressedError, TracingSqlLogger};
use crate::replacements::Replacements;
use crate::statement::{
    BatchInsert, Count, Delete, Insert, InsertMode, Select, Sum, UnionSelect, Update,
    UpdateOrInsert,
};
use crate::transaction::Transaction;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::Level;

/// Assembles and executes statements over a [`Driver`].
pub struct SqlHelper<D> {
    pub(crate) driver: D,
    pub(crate) logger: Arc<dyn SqlLogger>,
}

impl<D> std::fmt::Debug for SqlHelper<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlHelper").finish_non_exhaustive()
    }
}

impl<D: Driver> SqlHelper<D> {
    /// Wrap a driver, logging through `tracing`.
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            logger: Arc::new(TracingSqlLogger::default()),
        }
    }

    /// Replace the statement logger.
    pub fn with_logger(mut self, logger: impl SqlLogger + 'static) -> Self {
        self.logger = Arc::new(logger);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub async fn authenticate(&self) -> SqlResult<()> {
        self.driver.authenticate().await
    }

    pub async fn close(&self) -> SqlResult<()> {
        self.driver.close().await
    }

    /// Run arbitrary SQL with explicit options.
    pub async fn query(&self, sql: &str, options: ExecOptions<'_>) -> SqlResult<QueryOutput> {
        self.run(sql, options).await
    }

    async fn run(&self, sql: &str, options: ExecOptions<'_>) -> SqlResult<QueryOutput> {
        self.logger.on_statement(
            &StatementContext::new(sql, options.statement_type)
                .with_transaction(options.transaction),
        );
        self.driver.execute(sql, options).await
    }

    // ==================== Reads ====================

    /// Rows matching `opts`; `[]` when nothing matches.
    pub async fn select(&self, opts: Select) -> SqlResult<Vec<Row>> {
        if !opts.allowed() {
            return Ok(Vec::new());
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Select).transaction(opts.transaction_id());
        Ok(self.run(&sql, options).await?.into_rows())
    }

    /// First row matching `opts`, if any.
    pub async fn select_one(&self, opts: Select) -> SqlResult<Option<Row>> {
        Ok(self.select(opts).await?.into_iter().next())
    }

    /// The sum as text (`"0"` when no row matched or the aggregate is null).
    pub async fn sum(&self, opts: Sum) -> SqlResult<String> {
        if !opts.allowed() {
            return Ok("0".to_string());
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Select).transaction(opts.transaction_id());
        let rows = self.run(&sql, options).await?.into_rows();
        let sum = match rows.first().and_then(|row| row.get("sum")) {
            None | Some(Value::Null) => "0".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        Ok(sum)
    }

    /// Number of matching rows.
    pub async fn count(&self, opts: Count) -> SqlResult<u64> {
        if !opts.allowed() {
            return Ok(0);
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Select).transaction(opts.transaction_id());
        let rows = self.run(&sql, options).await?.into_rows();
        Ok(rows
            .first()
            .and_then(|row| row.get("count"))
            .and_then(as_u64)
            .unwrap_or(0))
    }

    pub async fn union_select(&self, opts: UnionSelect) -> SqlResult<Vec<Row>> {
        if !opts.allowed() {
            return Ok(Vec::new());
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Select).transaction(opts.transaction_id());
        Ok(self.run(&sql, options).await?.into_rows())
    }

    // ==================== Writes ====================

    /// Affected-row count.
    pub async fn update(&self, opts: Update) -> SqlResult<u64> {
        if !opts.allowed() {
            return Ok(0);
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Update).transaction(opts.transaction_id());
        Ok(self.run(&sql, options).await?.affected_rows())
    }

    /// Affected-row count.
    pub async fn delete(&self, opts: Delete) -> SqlResult<u64> {
        if !opts.allowed() {
            return Ok(0);
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Delete).transaction(opts.transaction_id());
        Ok(self.run(&sql, options).await?.affected_rows())
    }

    /// `None` when the guard skipped the insert.
    pub async fn insert(&self, opts: Insert) -> SqlResult<Option<InsertResult>> {
        self.insert_with(opts, InsertMode::Plain).await
    }

    /// `insert ignore`: duplicates are skipped by the database.
    pub async fn insert_ignore(&self, opts: Insert) -> SqlResult<Option<InsertResult>> {
        self.insert_with(opts, InsertMode::Ignore).await
    }

    /// Insert, updating the existing row on a duplicate key. With `set` absent every
    /// inserted column is refreshed from the new values.
    pub async fn insert_on_duplicate_key(
        &self,
        opts: Insert,
        set: Option<Assignments>,
    ) -> SqlResult<Option<InsertResult>> {
        self.insert_with(opts, InsertMode::OnDuplicateKeyUpdate(set))
            .await
    }

    async fn insert_with(&self, opts: Insert, mode: InsertMode) -> SqlResult<Option<InsertResult>> {
        if !opts.allowed() {
            return Ok(None);
        }
        let sql = opts.to_sql_with(&mode)?;
        let options = ExecOptions::new(StatementType::Insert).transaction(opts.transaction_id());
        let output = self.run(&sql, options).await?;
        Ok(Some(insert_result(&output)))
    }

    /// Insert, then read the new row back by its generated `id`.
    pub async fn insert_and_fetch(&self, opts: Insert) -> SqlResult<Option<Row>> {
        let table = opts.table.clone();
        let tx = opts.transaction.clone();
        let Some(result) = self.insert(opts).await? else {
            return Ok(None);
        };
        let Some(id) = result.insert_id else {
            return Ok(None);
        };

        let mut lookup = Select::table(table)
            .filter(Filter::raw(format!("id = {id}")))
            .limit(Limit::new(0, 1));
        if let Some(tx) = &tx {
            lookup = lookup.transaction(tx);
        }
        self.select_one(lookup).await
    }

    /// `None` when the guard skipped the insert.
    pub async fn batch_insert(&self, opts: BatchInsert) -> SqlResult<Option<InsertResult>> {
        if !opts.allowed() {
            return Ok(None);
        }
        let sql = opts.to_sql()?;
        let options = ExecOptions::new(StatementType::Insert).transaction(opts.transaction_id());
        let output = self.run(&sql, options).await?;
        Ok(Some(insert_result(&output)))
    }

    /// Update the row matching the filter, or insert one. Returns the id of the
    /// updated row or the generated id of the inserted one.
    ///
    /// Without a caller transaction the lookup and the write run in a transaction of
    /// their own, committed on success and rolled back on failure. A caller's
    /// transaction is left open.
    pub async fn update_or_insert(&self, opts: UpdateOrInsert) -> SqlResult<Option<u64>> {
        if !opts.allowed() {
            return Ok(None);
        }
        opts.validate()?;

        match opts.transaction.clone() {
            Some(tx) => self.upsert_in(&opts, &tx).await,
            None => {
                let tx = self.begin().await?;
                match self.upsert_in(&opts, &tx).await {
                    Ok(id) => {
                        if let Err(error) = self.commit(&tx).await {
                            self.rollback(&tx).await;
                            return Err(error);
                        }
                        Ok(id)
                    }
                    Err(error) => {
                        self.rollback(&tx).await;
                        Err(error)
                    }
                }
            }
        }
    }

    async fn upsert_in(&self, opts: &UpdateOrInsert, tx: &Transaction) -> SqlResult<Option<u64>> {
        match self.select_one(opts.lookup().transaction(tx)).await? {
            Some(row) => {
                self.update(opts.update().transaction(tx)).await?;
                Ok(row.get("id").and_then(as_u64))
            }
            None => {
                let inserted = self.insert(opts.insert().transaction(tx)).await?;
                Ok(inserted.and_then(|r| r.insert_id))
            }
        }
    }

    // ==================== Raw SQL ====================

    /// Rows of a caller-written select; `[]` when nothing matches.
    pub async fn select_by_sql(
        &self,
        sql: &str,
        replacements: &Replacements,
        tx: Option<&Transaction>,
    ) -> SqlResult<Vec<Row>> {
        let options = raw_options(StatementType::Select, replacements, tx);
        Ok(self.run(sql, options).await?.into_rows())
    }

    pub async fn update_by_sql(
        &self,
        sql: &str,
        replacements: &Replacements,
        tx: Option<&Transaction>,
    ) -> SqlResult<u64> {
        let options = raw_options(StatementType::Update, replacements, tx);
        Ok(self.run(sql, options).await?.affected_rows())
    }

    pub async fn delete_by_sql(
        &self,
        sql: &str,
        replacements: &Replacements,
        tx: Option<&Transaction>,
    ) -> SqlResult<u64> {
        let options = raw_options(StatementType::Delete, replacements, tx);
        Ok(self.run(sql, options).await?.affected_rows())
    }

    pub async fn insert_by_sql(
        &self,
        sql: &str,
        replacements: &Replacements,
        tx: Option<&Transaction>,
    ) -> SqlResult<InsertResult> {
        let options = raw_options(StatementType::Insert, replacements, tx);
        let output = self.run(sql, options).await?;
        Ok(insert_result(&output))
    }

    /// DDL (`create table`, `create database`, ...).
    pub async fn create_by_sql(
        &self,
        sql: &str,
        replacements: &Replacements,
        tx: Option<&Transaction>,
    ) -> SqlResult<()> {
        let options = raw_options(StatementType::Raw, replacements, tx);
        self.run(sql, options).await?;
        Ok(())
    }

    /// Run a script wrapped in `BEGIN;` / `COMMIT;`.
    ///
    /// When a statement in the middle fails the sqlx drivers issue `ROLLBACK` on the
    /// same connection before returning the error, so no half-open transaction goes
    /// back to the pool.
    pub async fn execute_sql(&self, sql: &str) -> SqlResult<u64> {
        let script = format!("BEGIN;{sql}COMMIT;");
        let output = self
            .run(&script, ExecOptions::new(StatementType::Raw))
            .await?;
        Ok(output.affected_rows())
    }

    /// Read a script file and run it like [`execute_sql`](Self::execute_sql).
    pub async fn execute_sql_file(&self, path: impl AsRef<Path>) -> SqlResult<u64> {
        let sql = tokio::fs::read_to_string(path.as_ref()).await?;
        self.execute_sql(&sql).await
    }

    /// `create database <name>`; with `force`, an existing database is dropped first.
    pub async fn create_database(&self, name: &str, force: bool) -> SqlResult<()> {
        let name = require_name(name)?;
        if force {
            if let Err(error) = self.drop_database(name).await {
                self.logger.on_suppressed_error(
                    &SuppressedError::new("drop database", &error).level(Level::DEBUG),
                );
            }
        }
        self.run(
            &format!("create database {name}"),
            ExecOptions::new(StatementType::Raw),
        )
        .await?;
        Ok(())
    }

    pub async fn drop_database(&self, name: &str) -> SqlResult<()> {
        let name = require_name(name)?;
        self.run(
            &format!("drop database {name}"),
            ExecOptions::new(StatementType::Raw),
        )
        .await?;
        Ok(())
    }
}

fn raw_options<'a>(
    statement_type: StatementType,
    replacements: &'a Replacements,
    tx: Option<&'a Transaction>,
) -> ExecOptions<'a> {
    ExecOptions::new(statement_type)
        .replacements(replacements)
        .transaction(tx.map(Transaction::id))
}

fn insert_result(output: &QueryOutput) -> InsertResult {
    output.insert_result().unwrap_or(InsertResult {
        insert_id: None,
        affected_rows: output.affected_rows(),
    })
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn require_name(name: &str) -> SqlResult<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(SqlError::param(format!("invalid database name: {name:?}")));
    }
    Ok(name)
}
