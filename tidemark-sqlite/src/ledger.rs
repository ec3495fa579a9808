//! SQLite migration ledger.

use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use tidemark_core::{
    LedgerEntry, LedgerExecutor, LedgerRecord, LedgerStore, LedgerTable, LedgerTransaction,
    MigrateResult, MigrationError, parse_timestamp,
};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};

/// Migration ledger stored in a SQLite database.
///
/// Holds a single connection; scripts, ledger writes and transaction control
/// all go through it in order.
pub struct SqliteLedger {
    conn: Connection,
    table: LedgerTable,
}

impl SqliteLedger {
    /// Open the database described by `config` and apply its pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let init_sql = config.init_sql();

        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        debug!(path = %config.path.display(), table = %config.table, "Opened SQLite ledger");
        Ok(Self::from_connection(conn, config.table))
    }

    /// Open from a `sqlite:` URL.
    pub async fn connect(url: &str) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection, table: LedgerTable) -> Self {
        Self { conn, table }
    }

    /// Get the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get the ledger table.
    pub fn table(&self) -> &LedgerTable {
        &self.table
    }
}

async fn execute_batch(conn: &Connection, sql: &str) -> SqliteResult<()> {
    let sql = sql.to_string();
    conn.call(move |conn| Ok(conn.execute_batch(&sql)?))
        .await
        .map_err(SqliteError::from)
}

async fn upsert(conn: &Connection, table: &LedgerTable, entry: &LedgerEntry<'_>) -> SqliteResult<()> {
    let sql = format!(
        "INSERT INTO {table} (name, checksum, success, error) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(name) DO UPDATE SET success = excluded.success"
    );
    let name = entry.name.to_string();
    let checksum = entry.checksum.to_string();
    let success = entry.success;
    let error = entry.error.map(String::from);

    conn.call(move |conn| {
        conn.execute(&sql, rusqlite::params![name, checksum, success, error])?;
        Ok(())
    })
    .await
    .map_err(SqliteError::from)
}

async fn delete_by_name(conn: &Connection, table: &LedgerTable, name: &str) -> SqliteResult<()> {
    let sql = format!("DELETE FROM {table} WHERE name = ?1");
    let name = name.to_string();

    conn.call(move |conn| {
        conn.execute(&sql, [name])?;
        Ok(())
    })
    .await
    .map_err(SqliteError::from)
}

fn storage(err: SqliteError) -> MigrationError {
    MigrationError::storage(err.message())
}

fn transaction(err: SqliteError) -> MigrationError {
    MigrationError::transaction(err.message())
}

#[async_trait::async_trait]
impl LedgerExecutor for SqliteLedger {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        execute_batch(&self.conn, sql).await.map_err(storage)
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        upsert(&self.conn, &self.table, entry).await.map_err(storage)
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        delete_by_name(&self.conn, &self.table, name)
            .await
            .map_err(storage)
    }
}

#[async_trait::async_trait]
impl LedgerStore for SqliteLedger {
    async fn init_schema(&mut self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                checksum TEXT NOT NULL,
                success BOOLEAN NOT NULL DEFAULT FALSE,
                error TEXT,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            self.table
        );
        execute_batch(&self.conn, &sql)
            .await
            .map_err(|e| MigrationError::storage_init(e.message()))
    }

    async fn load_applied(&mut self) -> MigrateResult<Vec<LedgerRecord>> {
        let sql = format!(
            "SELECT id, name, checksum, success, error, CAST(applied_at AS TEXT) \
             FROM {} ORDER BY id",
            self.table
        );

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([], |row| {
                    let applied_at: Option<String> = row.get(5)?;
                    Ok(LedgerRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        checksum: row.get(2)?,
                        success: row.get(3)?,
                        error: row.get(4)?,
                        applied_at: applied_at.as_deref().and_then(parse_timestamp),
                    })
                })?;

                let results: Result<Vec<_>, _> = rows.collect();
                Ok(results?)
            })
            .await
            .map_err(|e| storage(e.into()))?;

        debug!(count = rows.len(), "Loaded SQLite ledger rows");
        Ok(rows)
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn LedgerTransaction + 'a>> {
        execute_batch(&self.conn, "BEGIN IMMEDIATE")
            .await
            .map_err(transaction)?;
        Ok(Box::new(SqliteTransaction { ledger: self }))
    }
}

/// An open SQLite transaction on a [`SqliteLedger`].
struct SqliteTransaction<'a> {
    ledger: &'a mut SqliteLedger,
}

#[async_trait::async_trait]
impl LedgerExecutor for SqliteTransaction<'_> {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        self.ledger.execute_script(sql).await
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        self.ledger.upsert(entry).await
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        self.ledger.delete_by_name(name).await
    }
}

#[async_trait::async_trait]
impl LedgerTransaction for SqliteTransaction<'_> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let Err(err) = execute_batch(&self.ledger.conn, "COMMIT").await else {
            return Ok(());
        };

        // A failed COMMIT (e.g. a deferred constraint) leaves the transaction open.
        if let Err(e) = execute_batch(&self.ledger.conn, "ROLLBACK").await {
            warn!(error = %e.message(), "Rollback after failed commit failed");
        }
        Err(transaction(err))
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        execute_batch(&self.ledger.conn, "ROLLBACK")
            .await
            .map_err(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ledger() -> SqliteLedger {
        let mut ledger = SqliteLedger::open(SqliteConfig::memory()).await.unwrap();
        ledger.init_schema().await.unwrap();
        ledger
    }

    async fn table_exists(ledger: &SqliteLedger, name: &str) -> bool {
        let name = name.to_string();
        ledger
            .connection()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [name],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let mut ledger = ledger().await;
        ledger.init_schema().await.unwrap();

        assert!(table_exists(&ledger, "migrations").await);
        assert!(ledger.load_applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_table_name() {
        let table = LedgerTable::new("schema_history").unwrap();
        let mut ledger = SqliteLedger::open(SqliteConfig::memory().table(table))
            .await
            .unwrap();
        ledger.init_schema().await.unwrap();

        assert!(table_exists(&ledger, "schema_history").await);
        assert!(!table_exists(&ledger, "migrations").await);
    }

    #[tokio::test]
    async fn test_upsert_and_load() {
        let mut ledger = ledger().await;
        ledger
            .upsert(&LedgerEntry::success("001_init", "aaa"))
            .await
            .unwrap();
        ledger
            .upsert(&LedgerEntry::failure("002_users", "bbb", "no such table"))
            .await
            .unwrap();

        let rows = ledger.load_applied().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "001_init");
        assert!(rows[0].success);
        assert_eq!(rows[0].error, None);
        assert!(rows[0].applied_at.is_some());
        assert_eq!(rows[1].name, "002_users");
        assert!(!rows[1].success);
        assert_eq!(rows[1].error.as_deref(), Some("no such table"));
        assert!(rows[0].id < rows[1].id);
    }

    #[tokio::test]
    async fn test_upsert_conflict_only_updates_success() {
        let mut ledger = ledger().await;
        ledger
            .upsert(&LedgerEntry::failure("001_init", "old", "boom"))
            .await
            .unwrap();
        ledger
            .upsert(&LedgerEntry::success("001_init", "new"))
            .await
            .unwrap();

        let rows = ledger.load_applied().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
        assert_eq!(rows[0].checksum, "old");
        assert_eq!(rows[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_delete_by_name() {
        let mut ledger = ledger().await;
        ledger
            .upsert(&LedgerEntry::success("001_init", "aaa"))
            .await
            .unwrap();
        ledger.delete_by_name("001_init").await.unwrap();
        ledger.delete_by_name("missing").await.unwrap();

        assert!(ledger.load_applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transaction_commit() {
        let mut ledger = ledger().await;

        let mut tx = ledger.begin().await.unwrap();
        tx.execute_script("CREATE TABLE users (id INTEGER PRIMARY KEY); INSERT INTO users VALUES (1);")
            .await
            .unwrap();
        tx.upsert(&LedgerEntry::success("001_users", "aaa"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert!(table_exists(&ledger, "users").await);
        assert_eq!(ledger.load_applied().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let mut ledger = ledger().await;

        let mut tx = ledger.begin().await.unwrap();
        tx.execute_script("CREATE TABLE users (id INTEGER PRIMARY KEY);")
            .await
            .unwrap();
        tx.upsert(&LedgerEntry::success("001_users", "aaa"))
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert!(!table_exists(&ledger, "users").await);
        assert!(ledger.load_applied().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_is_rolled_back() {
        let mut ledger = ledger().await;
        ledger
            .execute_script(
                "CREATE TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TABLE child (
                     id INTEGER PRIMARY KEY,
                     parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .await
            .unwrap();

        let mut tx = ledger.begin().await.unwrap();
        tx.execute_script("INSERT INTO child VALUES (1, 99);")
            .await
            .unwrap();
        tx.upsert(&LedgerEntry::success("002_bad", "aaa"))
            .await
            .unwrap();
        let err = tx.commit().await.unwrap_err();

        match err {
            MigrationError::Transaction(msg) => assert!(msg.contains("FOREIGN KEY"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(ledger.load_applied().await.unwrap().is_empty());

        let count: i64 = ledger
            .connection()
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM child", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 0);

        // No transaction is left open.
        let tx = ledger.begin().await.unwrap();
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_script_error_message() {
        let mut ledger = ledger().await;
        let err = ledger
            .execute_script("INSERT INTO missing VALUES (1);")
            .await
            .unwrap_err();

        match err {
            MigrationError::Storage(msg) => assert_eq!(msg, "no such table: missing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_load_applied_without_schema() {
        let mut ledger = SqliteLedger::open(SqliteConfig::memory()).await.unwrap();
        let err = ledger.load_applied().await.unwrap_err();
        assert!(matches!(err, MigrationError::Storage(_)));
    }
}
