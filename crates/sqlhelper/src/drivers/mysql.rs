use super::impl_sqlx_driver;
use crate::config::DbConfig;
use crate::driver::Row;
use crate::error::SqlResult;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlQueryResult, MySqlRow};
use sqlx::{Column, Row as _, ValueRef};
use std::time::Duration;

impl_sqlx_driver! {
    /// MySQL driver on a `sqlx` pool.
    MySqlDriver {
        database: sqlx::MySql,
        pool: MySqlPool,
        decode: decode_row,
        insert_id: insert_id,
    }
}

impl MySqlDriver {
    /// Build the pool described by `config`. Connections are opened lazily up to
    /// `pool.min`; use [`Driver::authenticate`](crate::Driver::authenticate) to check
    /// reachability.
    pub async fn connect(config: &DbConfig) -> SqlResult<Self> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.username)
            .timezone(Some(config.timezone.clone()));
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        if let Some(database) = &config.database {
            options = options.database(database);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(config.pool.max)
            .min_connections(config.pool.min)
            .idle_timeout(Duration::from_millis(config.pool.idle_ms))
            .acquire_timeout(Duration::from_millis(config.pool.acquire_ms))
            .connect_with(options)
            .await?;
        Ok(Self::from_pool(pool))
    }
}

fn insert_id(done: &MySqlQueryResult) -> Option<u64> {
    Some(done.last_insert_id()).filter(|id| *id > 0)
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), decode_column(row, col.ordinal())))
        .collect()
}

fn decode_column(row: &MySqlRow, idx: usize) -> Value {
    match row.try_get_raw(idx) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(idx) {
        return Value::from(v);
    }
    if let Ok(v) = row.try_get::<f32, _>(idx) {
        return Value::from(f64::from(v));
    }
    if let Ok(v) = row.try_get::<String, _>(idx) {
        return Value::String(v);
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(idx) {
        return Value::String(format_datetime(&v));
    }
    if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx) {
        return Value::String(format_datetime(&v.naive_utc()));
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(idx) {
        return Value::String(v.format("%Y-%m-%d").to_string());
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(idx) {
        return match String::from_utf8(v) {
            Ok(s) => Value::String(s),
            Err(e) => Value::from(e.into_bytes()),
        };
    }
    // DECIMAL, JSON and friends travel as text.
    row.try_get_unchecked::<String, _>(idx)
        .map(Value::String)
        .unwrap_or(Value::Null)
}

/// Render a timestamp the way MySQL prints `DATETIME`.
fn format_datetime(dt: &chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}
