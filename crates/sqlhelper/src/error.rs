//! Error types for sqlhelper

use thiserror::Error;

/// Result type alias for sqlhelper operations
pub type SqlResult<T> = Result<T, SqlError>;

/// Error types for statement assembly and execution
#[derive(Debug, Error)]
pub enum SqlError {
    /// Invalid or unsupported configuration (e.g. unknown database type)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or inconsistent statement parameters, raised before any SQL runs
    #[error("Parameter error: {0}")]
    Param(String),

    /// Database connection error (authentication, network, pool)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Error reported by the driver while executing a statement
    #[error("Driver error: {0}")]
    Driver(String),

    /// Transaction lifecycle error (begin/commit, unknown handle)
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error (e.g. reading a SQL file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl SqlError {
    /// Create a parameter error
    pub fn param(message: impl Into<String>) -> Self {
        Self::Param(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create a transaction error
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    /// Check if this is a parameter error
    pub fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a connection error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

#[cfg(any(feature = "mysql", feature = "sqlite"))]
impl From<sqlx::Error> for SqlError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(err.to_string()),
            sqlx::Error::Configuration(_) => Self::Config(err.to_string()),
            other => Self::Driver(other.to_string()),
        }
    }
}
