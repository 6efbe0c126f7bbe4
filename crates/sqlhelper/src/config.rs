//! Connection configuration.
//!
//! ```toml
//! db_type = "mysql"
//! host = "127.0.0.1"
//! username = "app"
//! password = "${DB_PASSWORD}"
//! database = "app"
//!
//! [pool]
//! max = 10
//! ```
//!
//! `${VAR}` references are expanded from the environment (after loading a `.env`
//! file, when present) before validation.

use crate::error::{SqlError, SqlResult};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum DbType {
    MySql,
    Sqlite,
}

impl FromStr for DbType {
    type Err = SqlError;

    fn from_str(s: &str) -> SqlResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(DbType::MySql),
            "sqlite" => Ok(DbType::Sqlite),
            other => Err(SqlError::config(format!("unsupported db_type: {other}"))),
        }
    }
}

impl TryFrom<String> for DbType {
    type Error = SqlError;

    fn try_from(s: String) -> SqlResult<Self> {
        s.parse()
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::MySql => f.write_str("mysql"),
            DbType::Sqlite => f.write_str("sqlite"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub db_type: DbType,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub database: Option<String>,
    /// SQLite database file; absent or `:memory:` means in-memory.
    pub filename: Option<String>,
    /// Session time zone used when writing timestamps.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max: u32,
    pub min: u32,
    pub idle_ms: u64,
    pub acquire_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max: 30,
            min: 0,
            idle_ms: 10_000,
            acquire_ms: 30_000,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_timezone() -> String {
    "+00:00".to_string()
}

impl DbConfig {
    /// An in-memory SQLite configuration.
    pub fn sqlite_memory() -> Self {
        Self {
            db_type: DbType::Sqlite,
            host: default_host(),
            port: default_port(),
            username: String::new(),
            password: None,
            database: None,
            filename: None,
            timezone: default_timezone(),
            pool: PoolConfig::default(),
        }
    }

    pub fn from_toml_str(raw: &str) -> SqlResult<Self> {
        let mut config: DbConfig = toml::from_str(raw)
            .map_err(|e| SqlError::config(format!("failed to parse config: {e}")))?;
        config.expand_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, honouring a `.env` file in the working directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SqlResult<Self> {
        let path = path.as_ref();
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SqlError::config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    fn expand_env(&mut self) -> SqlResult<()> {
        self.host = expand_env_vars(&self.host)?;
        self.username = expand_env_vars(&self.username)?;
        self.timezone = expand_env_vars(&self.timezone)?;
        for field in [&mut self.password, &mut self.database, &mut self.filename] {
            if let Some(value) = field.as_mut() {
                *value = expand_env_vars(value)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> SqlResult<()> {
        if self.pool.max == 0 {
            return Err(SqlError::config("pool.max must be at least 1"));
        }
        if self.pool.min > self.pool.max {
            return Err(SqlError::config("pool.min must not exceed pool.max"));
        }
        if self.db_type == DbType::MySql {
            if self.host.trim().is_empty() {
                return Err(SqlError::config("host must not be empty"));
            }
            if self.username.trim().is_empty() {
                return Err(SqlError::config("username must not be empty"));
            }
        }
        Ok(())
    }

    /// Where this config points, for log lines.
    pub fn target(&self) -> String {
        match self.db_type {
            DbType::MySql => format!("{}:{}", self.host, self.port),
            DbType::Sqlite => self
                .filename
                .clone()
                .unwrap_or_else(|| ":memory:".to_string()),
        }
    }
}

fn expand_env_vars(input: &str) -> SqlResult<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                return Err(SqlError::config(format!(
                    "unterminated env var reference: ${{{key}}}"
                )));
            }
            if key.is_empty() {
                return Err(SqlError::config("invalid env var reference: ${}"));
            }

            let v = std::env::var(&key).map_err(|_| {
                SqlError::config(format!("missing env var for config expansion: {key}"))
            })?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}

/// Build the configured driver, check that it is reachable and wrap it in a helper.
#[cfg(any(feature = "mysql", feature = "sqlite"))]
pub async fn connect(
    config: &DbConfig,
) -> SqlResult<crate::SqlHelper<crate::drivers::AnyDriver>> {
    use crate::Driver;
    use crate::drivers::AnyDriver;

    config.validate()?;
    let target = config.target();
    tracing::info!(db_type = %config.db_type, target = %target, "connecting");

    let driver = match config.db_type {
        #[cfg(feature = "mysql")]
        DbType::MySql => AnyDriver::MySql(crate::drivers::MySqlDriver::connect(config).await?),
        #[cfg(feature = "sqlite")]
        DbType::Sqlite => AnyDriver::Sqlite(crate::drivers::SqliteDriver::connect(config).await?),
        #[allow(unreachable_patterns)]
        other => {
            return Err(SqlError::config(format!(
                "db_type {other} is not enabled in this build"
            )));
        }
    };
    driver.authenticate().await?;
    tracing::info!(db_type = %config.db_type, target = %target, "connected");

    Ok(crate::SqlHelper::new(driver))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_mysql() {
        let config = DbConfig::from_toml_str(
            r#"
            db_type = "mysql"
            username = "app"
            database = "shop"
            "#,
        )
        .unwrap();
        assert_eq!(config.db_type, DbType::MySql);
        assert_eq!(config.port, 3306);
        assert_eq!(config.timezone, "+00:00");
        assert_eq!(config.pool.max, 30);
        assert_eq!(config.pool.min, 0);
        assert_eq!(config.pool.idle_ms, 10_000);
        assert_eq!(config.pool.acquire_ms, 30_000);
        assert_eq!(config.target(), "127.0.0.1:3306");
    }

    #[test]
    fn test_unsupported_db_type_is_config_error() {
        let err = DbConfig::from_toml_str(r#"db_type = "oracle""#).unwrap_err();
        assert!(err.is_config());
        assert!("postgres".parse::<DbType>().unwrap_err().is_config());
        assert_eq!("SQLite".parse::<DbType>().unwrap(), DbType::Sqlite);
    }

    #[test]
    fn test_env_expansion() {
        // SAFETY: test-local variable name, not read by other tests.
        unsafe { std::env::set_var("SQLHELPER_TEST_DB_PASSWORD", "s3cret") };
        let config = DbConfig::from_toml_str(
            r#"
            db_type = "mysql"
            username = "app"
            password = "${SQLHELPER_TEST_DB_PASSWORD}"
            "#,
        )
        .unwrap();
        assert_eq!(config.password.as_deref(), Some("s3cret"));

        let err = DbConfig::from_toml_str(
            r#"
            db_type = "mysql"
            username = "app"
            password = "${SQLHELPER_TEST_DEFINITELY_UNSET}"
            "#,
        )
        .unwrap_err();
        assert!(err.is_config());
        assert!(expand_env_vars("${oops").unwrap_err().is_config());
    }

    #[test]
    fn test_validation() {
        let err = DbConfig::from_toml_str(r#"db_type = "mysql""#).unwrap_err();
        assert!(err.to_string().contains("username"));

        let err = DbConfig::from_toml_str(
            r#"
            db_type = "sqlite"
            [pool]
            max = 2
            min = 3
            "#,
        )
        .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_sqlite_file_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.toml");
        std::fs::write(
            &path,
            "db_type = \"sqlite\"\nfilename = \"data.db\"\n[pool]\nmax = 4\n",
        )
        .unwrap();
        let config = DbConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.db_type, DbType::Sqlite);
        assert_eq!(config.filename.as_deref(), Some("data.db"));
        assert_eq!(config.pool.max, 4);
        assert_eq!(config.pool.acquire_ms, 30_000);
        assert_eq!(config.target(), "data.db");

        assert!(DbConfig::from_toml_file(dir.path().join("missing.toml")).unwrap_err().is_config());
    }
}
