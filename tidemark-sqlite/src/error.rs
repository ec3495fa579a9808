//! Error types for SQLite operations.

use thiserror::Error;
use tidemark_core::MigrationError;

/// Result type for SQLite operations.
pub type SqliteResult<T> = Result<T, SqliteError>;

/// Error type for SQLite operations.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite driver error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] tokio_rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SqliteError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The driver's message without any prefix.
    pub fn message(&self) -> String {
        match self {
            Self::Sqlite(tokio_rusqlite::Error::Rusqlite(e)) => e.to_string(),
            Self::Sqlite(e) => e.to_string(),
            Self::Config(msg) => msg.clone(),
        }
    }
}

impl From<rusqlite::Error> for SqliteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(tokio_rusqlite::Error::Rusqlite(err))
    }
}

impl From<SqliteError> for MigrationError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Config(msg) => MigrationError::storage_init(format!("config: {}", msg)),
            other => MigrationError::storage(other.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SqliteError::config("invalid path");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("invalid path"));
    }

    #[test]
    fn test_error_conversion() {
        let err: MigrationError = SqliteError::config("bad url").into();
        assert!(matches!(err, MigrationError::StorageInit(ref m) if m == "config: bad url"));

        let err: MigrationError =
            SqliteError::from(rusqlite::Error::InvalidQuery).into();
        assert!(matches!(err, MigrationError::Storage(_)));
    }

    #[test]
    fn test_message_unwraps_driver_error() {
        let inner = rusqlite::Error::InvalidQuery;
        let expected = inner.to_string();
        let err = SqliteError::from(inner);

        assert_eq!(err.message(), expected);
        assert!(!err.message().contains("Rusqlite"));
    }
}
