//! Error types for the migration engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The migrations directory does not exist.
    #[error("Migrations directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// The migrations directory contains no scripts.
    #[error("No migrations found in {}", .0.display())]
    NoMigrations(PathBuf),

    /// Invalid migration file or name.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// The ledger table could not be created.
    #[error("Failed to initialize migration ledger: {0}")]
    StorageInit(String),

    /// A ledger read or write failed.
    #[error("Ledger error: {0}")]
    Storage(String),

    /// An already applied migration was modified on disk.
    #[error("Checksum mismatch for migration '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Migration name.
        name: String,
        /// Checksum recorded in the ledger.
        expected: String,
        /// Checksum of the file on disk.
        actual: String,
    },

    /// A migration script failed to execute.
    #[error("Failed to execute migration '{name}': {message}")]
    Execution {
        /// Migration name.
        name: String,
        /// Driver error message.
        message: String,
    },

    /// Begin, commit or rollback failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A non-execution failure while a migration was being applied.
    #[error("Migration '{name}' aborted: {source}")]
    Aborted {
        /// Migration name.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<MigrationError>,
    },

    /// Ledger table name is not a plain identifier.
    #[error("Invalid ledger table name: '{0}'")]
    InvalidTable(String),

    /// No ledger backend exists for the requested driver.
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),
}

impl MigrationError {
    /// Create a storage initialization error.
    pub fn storage_init(msg: impl Into<String>) -> Self {
        Self::StorageInit(msg.into())
    }

    /// Create a ledger storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a transaction error.
    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    /// Create a migration file error.
    pub fn migration_file(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create an unsupported driver error.
    pub fn unsupported_driver(driver: impl Into<String>) -> Self {
        Self::UnsupportedDriver(driver.into())
    }

    /// Attach the name of the migration that was in progress.
    ///
    /// Execution errors already carry the name and are returned unchanged.
    pub fn in_migration(self, name: impl Into<String>) -> Self {
        match self {
            err @ (Self::Execution { .. } | Self::Aborted { .. }) => err,
            other => Self::Aborted {
                name: name.into(),
                source: Box::new(other),
            },
        }
    }

    /// The bare message of a storage-level error, without the variant prefix.
    ///
    /// This is what gets written to the ledger's `error` column.
    pub fn driver_message(&self) -> String {
        match self {
            Self::Storage(msg)
            | Self::StorageInit(msg)
            | Self::Transaction(msg)
            | Self::InvalidMigration(msg) => msg.clone(),
            Self::Execution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The migration this error refers to, if any.
    pub fn migration_name(&self) -> Option<&str> {
        match self {
            Self::ChecksumMismatch { name, .. }
            | Self::Execution { name, .. }
            | Self::Aborted { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Check if this error was raised before any database access.
    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::DirectoryNotFound(_)
                | Self::NoMigrations(_)
                | Self::InvalidMigration(_)
        )
    }
}
