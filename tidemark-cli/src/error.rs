//! CLI error types and result alias.

use miette::Diagnostic;
use thiserror::Error;
use tidemark_core::MigrationError;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(tidemark::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(tidemark::config))]
    Config(String),

    /// Database connection error
    #[error("Database error: {0}")]
    #[diagnostic(code(tidemark::database))]
    Database(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(tidemark::migration))]
    Migration(#[from] MigrationError),
}

impl CliError {
    /// Help text for errors that have an obvious next step.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Migration(MigrationError::ChecksumMismatch { .. }) => Some(
                "Applied migrations must not be edited. Restore the original file and put the change in a new migration.",
            ),
            Self::Migration(MigrationError::NoMigrations(_)) => {
                Some("Run `tidemark migrate new <NAME>` to create the first migration.")
            }
            Self::Migration(MigrationError::UnsupportedDriver(_)) => {
                Some("Use a sqlite:, postgres:, postgresql: or mysql: URL.")
            }
            Self::Config(msg) if msg.starts_with("Database URL not found") => {
                Some("Add a [database] url entry to tidemark.toml to avoid passing --url every time.")
            }
            _ => None,
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

#[cfg(feature = "sqlite")]
impl From<tidemark_sqlite::SqliteError> for CliError {
    fn from(err: tidemark_sqlite::SqliteError) -> Self {
        CliError::Database(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<tidemark_postgres::PgError> for CliError {
    fn from(err: tidemark_postgres::PgError) -> Self {
        CliError::Database(err.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<tidemark_mysql::MysqlError> for CliError {
    fn from(err: tidemark_mysql::MysqlError) -> Self {
        CliError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_display() {
        let err = CliError::from(MigrationError::Execution {
            name: "001_init".into(),
            message: "syntax error".into(),
        });
        assert_eq!(
            err.to_string(),
            "Migration error: Failed to execute migration '001_init': syntax error"
        );
        assert_eq!(err.hint(), None);
    }

    #[test]
    fn test_hints() {
        let err = CliError::from(MigrationError::ChecksumMismatch {
            name: "001_init".into(),
            expected: "a".into(),
            actual: "b".into(),
        });
        assert!(err.hint().unwrap().contains("new migration"));
        assert!(
            CliError::Config("Database URL not found. Pass --url".into())
                .hint()
                .is_some()
        );
        assert!(CliError::Config("Failed to parse TOML".into()).hint().is_none());
    }
}
