//! Shared test doubles: a driver that records what it is asked to run and a logger
//! that records what it is told.

#![allow(dead_code)]

use sqlhelper::{
    Driver, ExecOptions, InsertResult, QueryOutput, ReleaseHook, Replacements, Row, SqlError,
    SqlLogger, SqlResult, StatementContext, StatementType, SuppressedError, TransactionEvent,
    TransactionId,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub statement_type: StatementType,
    pub transaction: Option<TransactionId>,
    pub replacements: Replacements,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    outputs: VecDeque<SqlResult<QueryOutput>>,
    begun: Vec<TransactionId>,
    commits: Vec<TransactionId>,
    rollbacks: Vec<TransactionId>,
    released: Vec<TransactionId>,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    closed: bool,
}

/// Driver double: returns scripted outputs in order, falling back to an empty
/// result of the right shape.
#[derive(Default)]
pub struct RecordingDriver {
    state: Arc<Mutex<State>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_output(&self, output: QueryOutput) -> &Self {
        self.state.lock().unwrap().outputs.push_back(Ok(output));
        self
    }

    pub fn push_rows(&self, rows: Vec<serde_json::Value>) -> &Self {
        let rows = rows
            .into_iter()
            .map(|v| match v {
                serde_json::Value::Object(map) => map,
                other => panic!("row must be an object, got {other}"),
            })
            .collect();
        self.push_output(QueryOutput::Rows(rows))
    }

    pub fn push_error(&self, error: SqlError) -> &Self {
        self.state.lock().unwrap().outputs.push_back(Err(error));
        self
    }

    pub fn fail_begin(&self) {
        self.state.lock().unwrap().fail_begin = true;
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn sqls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn begun(&self) -> usize {
        self.state.lock().unwrap().begun.len()
    }

    pub fn commits(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn rollbacks(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().rollbacks.clone()
    }

    /// Ids handed to the release hook by dropped open handles.
    pub fn released(&self) -> Vec<TransactionId> {
        self.state.lock().unwrap().released.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

impl Driver for RecordingDriver {
    async fn execute(&self, sql: &str, options: ExecOptions<'_>) -> SqlResult<QueryOutput> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call {
            sql: sql.to_string(),
            statement_type: options.statement_type,
            transaction: options.transaction.cloned(),
            replacements: options.replacements.clone(),
        });
        if let Some(output) = state.outputs.pop_front() {
            return output;
        }
        Ok(match options.statement_type {
            StatementType::Select => QueryOutput::Rows(Vec::new()),
            StatementType::Insert => QueryOutput::Inserted(InsertResult::default()),
            _ => QueryOutput::Affected(0),
        })
    }

    async fn authenticate(&self) -> SqlResult<()> {
        Ok(())
    }

    async fn begin_transaction(&self) -> SqlResult<TransactionId> {
        let mut state = self.state.lock().unwrap();
        if state.fail_begin {
            return Err(SqlError::Connection("pool timed out".to_string()));
        }
        let id = TransactionId::generate();
        state.begun.push(id.clone());
        Ok(id)
    }

    async fn commit(&self, id: &TransactionId) -> SqlResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(SqlError::driver("deadlock found when trying to get lock"));
        }
        state.commits.push(id.clone());
        Ok(())
    }

    async fn rollback(&self, id: &TransactionId) -> SqlResult<()> {
        let mut state = self.state.lock().unwrap();
        state.rollbacks.push(id.clone());
        if state.fail_rollback {
            return Err(SqlError::driver("connection reset"));
        }
        Ok(())
    }

    async fn close(&self) -> SqlResult<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    fn release_hook(&self) -> Option<ReleaseHook> {
        let state = Arc::downgrade(&self.state);
        Some(Arc::new(move |id: &TransactionId| {
            if let Some(state) = state.upgrade() {
                state.lock().unwrap().released.push(id.clone());
            }
        }))
    }
}

/// Logger double, cheap to clone so tests keep a handle after handing it over.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    statements: Arc<Mutex<Vec<(String, Option<TransactionId>, tracing::Level)>>>,
    events: Arc<Mutex<Vec<(TransactionEvent, TransactionId)>>>,
    failures: Arc<Mutex<Vec<(String, Option<TransactionId>, tracing::Level)>>>,
}

impl RecordingLogger {
    pub fn statements(&self) -> Vec<(String, Option<TransactionId>, tracing::Level)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<TransactionEvent> {
        self.events.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    pub fn event_ids(&self) -> Vec<TransactionId> {
        self.events.lock().unwrap().iter().map(|(_, id)| id.clone()).collect()
    }

    /// Swallowed failures as (operation, transaction, level).
    pub fn failures(&self) -> Vec<(String, Option<TransactionId>, tracing::Level)> {
        self.failures.lock().unwrap().clone()
    }
}

impl SqlLogger for RecordingLogger {
    fn on_statement(&self, ctx: &StatementContext<'_>) {
        self.statements.lock().unwrap().push((
            ctx.sql.to_string(),
            ctx.transaction_id.cloned(),
            ctx.level,
        ));
    }

    fn on_transaction(&self, event: TransactionEvent, id: &TransactionId) {
        self.events.lock().unwrap().push((event, id.clone()));
    }

    fn on_suppressed_error(&self, failure: &SuppressedError<'_>) {
        self.failures.lock().unwrap().push((
            failure.operation.to_string(),
            failure.transaction_id.cloned(),
            failure.level,
        ));
    }
}

pub fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("row must be an object, got {other}"),
    }
}
