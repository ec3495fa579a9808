//! Migration ledger storage.
//!
//! The ledger is a single table with one row per migration name ever
//! attempted. Backends implement [`LedgerStore`] for the top-level connection
//! and [`LedgerTransaction`] for an open transaction; both share the
//! statement-level operations of [`LedgerExecutor`], so bookkeeping code runs
//! unchanged inside and outside a transaction.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// Default name of the ledger table.
pub const DEFAULT_LEDGER_TABLE: &str = "migrations";

/// Layout used by every backend when reading `applied_at` back as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A row of the migration ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Surrogate key, increasing with insertion order.
    pub id: i64,
    /// Migration name.
    pub name: String,
    /// Checksum recorded at the last attempt.
    pub checksum: String,
    /// Whether the last attempt succeeded.
    pub success: bool,
    /// Error message of the last failed attempt.
    pub error: Option<String>,
    /// When the row was last written.
    pub applied_at: Option<NaiveDateTime>,
}

/// Values written to the ledger for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry<'a> {
    /// Migration name.
    pub name: &'a str,
    /// Checksum of the attempted content.
    pub checksum: &'a str,
    /// Outcome of the attempt.
    pub success: bool,
    /// Error message for a failed attempt.
    pub error: Option<&'a str>,
}

impl<'a> LedgerEntry<'a> {
    /// Entry for a successful attempt.
    pub fn success(name: &'a str, checksum: &'a str) -> Self {
        Self {
            name,
            checksum,
            success: true,
            error: None,
        }
    }

    /// Entry for a failed attempt.
    pub fn failure(name: &'a str, checksum: &'a str, error: &'a str) -> Self {
        Self {
            name,
            checksum,
            success: false,
            error: Some(error),
        }
    }
}

/// Validated ledger table identifier.
///
/// Backends interpolate the name into SQL text, so only plain identifiers are
/// accepted: ASCII letters, digits and `_`, not starting with a digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LedgerTable(String);

impl LedgerTable {
    /// Validate a table name.
    pub fn new(name: impl Into<String>) -> MigrateResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.len() <= 63
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid {
            Ok(Self(name))
        } else {
            Err(MigrationError::InvalidTable(name))
        }
    }

    /// The table name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LedgerTable {
    fn default() -> Self {
        Self(DEFAULT_LEDGER_TABLE.to_string())
    }
}

impl fmt::Display for LedgerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse an `applied_at` value read back as text.
///
/// Fractional seconds are tolerated; unparsable values yield `None`.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

/// Statement-level ledger operations.
///
/// Implemented by the top-level connection and by open transactions.
#[async_trait::async_trait]
pub trait LedgerExecutor: Send {
    /// Execute a migration script as a single batch.
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()>;

    /// Insert a ledger row.
    ///
    /// When a row with the same name exists only its `success` flag is
    /// overwritten; `checksum` and `error` keep their stored values.
    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()>;

    /// Remove the ledger row for `name`.
    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()>;
}

/// An open ledger transaction.
#[async_trait::async_trait]
pub trait LedgerTransaction: LedgerExecutor {
    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> MigrateResult<()>;

    /// Roll the transaction back.
    async fn rollback(self: Box<Self>) -> MigrateResult<()>;
}

/// Ledger storage bound to a database connection.
#[async_trait::async_trait]
pub trait LedgerStore: LedgerExecutor {
    /// Create the ledger table if it does not exist.
    async fn init_schema(&mut self) -> MigrateResult<()>;

    /// Load every ledger row, oldest first.
    async fn load_applied(&mut self) -> MigrateResult<Vec<LedgerRecord>>;

    /// Begin a transaction.
    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn LedgerTransaction + 'a>>;
}
