use super::impl_sqlx_driver;
use crate::config::DbConfig;
use crate::driver::Row;
use crate::error::SqlResult;
use serde_json::Value;
use sqlx::sqlite::{
    SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteQueryResult, SqliteRow,
};
use sqlx::{Column, Row as _, ValueRef};
use std::str::FromStr;
use std::time::Duration;

impl_sqlx_driver! {
    /// SQLite driver on a `sqlx` pool, for local runs and tests.
    ///
    /// Values are rendered with MySQL escaping, so a quote becomes `\'`. SQLite does
    /// not treat backslash as an escape character, which means any value containing
    /// `'` produces invalid SQL on this driver. Keep such values out of rendered
    /// clauses when targeting SQLite.
    SqliteDriver {
        database: sqlx::Sqlite,
        pool: SqlitePool,
        decode: decode_row,
        insert_id: insert_id,
    }
}

impl SqliteDriver {
    /// Open the database file named by `config.filename`, or an in-memory database
    /// when it is absent or `:memory:`.
    pub async fn connect(config: &DbConfig) -> SqlResult<Self> {
        match config.filename.as_deref() {
            None | Some(":memory:") => Self::in_memory().await,
            Some(filename) => {
                let options = SqliteConnectOptions::new()
                    .filename(filename)
                    .create_if_missing(true);
                let pool = SqlitePoolOptions::new()
                    .max_connections(config.pool.max)
                    .min_connections(config.pool.min)
                    .idle_timeout(Duration::from_millis(config.pool.idle_ms))
                    .acquire_timeout(Duration::from_millis(config.pool.acquire_ms))
                    .connect_with(options)
                    .await?;
                Ok(Self::from_pool(pool))
            }
        }
    }

    /// A private in-memory database. The pool holds exactly one connection that is
    /// never recycled, since each connection would otherwise see its own database.
    pub async fn in_memory() -> SqlResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(pool))
    }
}

fn insert_id(done: &SqliteQueryResult) -> Option<u64> {
    u64::try_from(done.last_insert_rowid())
        .ok()
        .filter(|id| *id > 0)
}

fn decode_row(row: &SqliteRow) -> Row {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), decode_column(row, col.ordinal())))
        .collect()
}

fn decode_column(row: &SqliteRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return Value::from(v);
    }
    row.try_get_unchecked::<String, _>(idx)
        .map(Value::String)
        .unwrap_or(Value::Null)
}
