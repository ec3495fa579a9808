//! Error types for MySQL operations.

use thiserror::Error;
use tidemark_core::MigrationError;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Error type for MySQL operations.
#[derive(Debug, Error)]
pub enum MysqlError {
    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A ledger row could not be decoded.
    #[error("Row conversion error: {0}")]
    Conversion(String),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The server's message without any prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Mysql(mysql_async::Error::Server(e)) => e.message.clone(),
            Self::Mysql(e) => e.to_string(),
            Self::Config(msg) | Self::Conversion(msg) => msg.clone(),
        }
    }
}

impl From<mysql_async::FromRowError> for MysqlError {
    fn from(err: mysql_async::FromRowError) -> Self {
        Self::Conversion(err.to_string())
    }
}

impl From<MysqlError> for MigrationError {
    fn from(err: MysqlError) -> Self {
        match err {
            MysqlError::Config(msg) => MigrationError::storage_init(format!("config: {}", msg)),
            other => MigrationError::storage_init(other.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MysqlError::config("invalid host");
        assert!(err.to_string().contains("Configuration error"));
        assert_eq!(err.message(), "invalid host");
    }

    #[test]
    fn test_config_error_converts_to_storage_init() {
        let err: MigrationError = MysqlError::config("bad url").into();
        assert!(matches!(err, MigrationError::StorageInit(ref m) if m == "config: bad url"));
    }
}
