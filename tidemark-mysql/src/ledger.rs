//! MySQL migration ledger.

use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Row, Transaction, TxOpts, from_row_opt};
use tracing::debug;

use tidemark_core::{
    LedgerEntry, LedgerExecutor, LedgerRecord, LedgerStore, LedgerTable, LedgerTransaction,
    MigrateResult, MigrationError, parse_timestamp,
};

use crate::config::MysqlConfig;
use crate::error::{MysqlError, MysqlResult};

/// Migration ledger stored in a MySQL database.
///
/// MySQL commits DDL statements implicitly, so a failing script may leave
/// earlier statements of the same script applied. The ledger row itself is
/// still only written on success.
pub struct MysqlLedger {
    conn: Conn,
    table: LedgerTable,
}

impl MysqlLedger {
    /// Connect using `config`.
    pub async fn connect(config: MysqlConfig) -> MysqlResult<Self> {
        let conn = Conn::new(Opts::from(config.to_opts_builder())).await?;
        debug!(
            host = %config.host,
            database = %config.database,
            table = %config.table,
            "Connected MySQL ledger"
        );
        Ok(Self {
            conn,
            table: config.table,
        })
    }

    /// Connect from a `mysql://` URL.
    pub async fn connect_url(url: &str) -> MysqlResult<Self> {
        Self::connect(MysqlConfig::from_url(url)?).await
    }

    /// Get the underlying connection.
    pub fn connection(&mut self) -> &mut Conn {
        &mut self.conn
    }

    /// Get the ledger table.
    pub fn table(&self) -> &LedgerTable {
        &self.table
    }

    /// Close the connection.
    pub async fn disconnect(self) -> MysqlResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }
}

async fn execute_script<Q: Queryable>(conn: &mut Q, sql: &str) -> MysqlResult<()> {
    conn.query_drop(sql).await?;
    Ok(())
}

async fn upsert<Q: Queryable>(
    conn: &mut Q,
    table: &LedgerTable,
    entry: &LedgerEntry<'_>,
) -> MysqlResult<()> {
    let sql = format!(
        "INSERT INTO {table} (name, checksum, success, error) VALUES (?, ?, ?, ?) \
         ON DUPLICATE KEY UPDATE success = VALUES(success)"
    );
    conn.exec_drop(
        sql,
        (entry.name, entry.checksum, entry.success, entry.error),
    )
    .await?;
    Ok(())
}

async fn delete_by_name<Q: Queryable>(conn: &mut Q, table: &LedgerTable, name: &str) -> MysqlResult<()> {
    let sql = format!("DELETE FROM {table} WHERE name = ?");
    conn.exec_drop(sql, (name,)).await?;
    Ok(())
}

type RecordRow = (i64, String, String, bool, Option<String>, Option<String>);

fn record_from_row(row: Row) -> MysqlResult<LedgerRecord> {
    let (id, name, checksum, success, error, applied_at) = from_row_opt::<RecordRow>(row)?;
    Ok(LedgerRecord {
        id,
        name,
        checksum,
        success,
        error,
        applied_at: applied_at.as_deref().and_then(parse_timestamp),
    })
}

fn storage(err: MysqlError) -> MigrationError {
    MigrationError::storage(err.message())
}

fn transaction(err: MysqlError) -> MigrationError {
    MigrationError::transaction(err.message())
}

#[async_trait::async_trait]
impl LedgerExecutor for MysqlLedger {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.conn, sql).await.map_err(storage)
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        upsert(&mut self.conn, &self.table, entry)
            .await
            .map_err(storage)
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        delete_by_name(&mut self.conn, &self.table, name)
            .await
            .map_err(storage)
    }
}

#[async_trait::async_trait]
impl LedgerStore for MysqlLedger {
    async fn init_schema(&mut self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                checksum VARCHAR(64) NOT NULL,
                success BOOLEAN NOT NULL DEFAULT FALSE,
                error TEXT,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            self.table
        );
        execute_script(&mut self.conn, &sql)
            .await
            .map_err(|e| MigrationError::storage_init(e.message()))
    }

    async fn load_applied(&mut self) -> MigrateResult<Vec<LedgerRecord>> {
        let sql = format!(
            "SELECT id, name, checksum, success, error, \
             DATE_FORMAT(applied_at, '%Y-%m-%d %H:%i:%s') \
             FROM {} ORDER BY id",
            self.table
        );

        let rows: Vec<Row> = self
            .conn
            .query(sql)
            .await
            .map_err(|e| storage(e.into()))?;

        let records = rows
            .into_iter()
            .map(record_from_row)
            .collect::<MysqlResult<Vec<_>>>()
            .map_err(storage)?;

        debug!(count = records.len(), "Loaded MySQL ledger rows");
        Ok(records)
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn LedgerTransaction + 'a>> {
        let tx = self
            .conn
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| transaction(e.into()))?;
        Ok(Box::new(MysqlTransaction {
            tx,
            table: &self.table,
        }))
    }
}

/// An open transaction on a [`MysqlLedger`].
///
/// Dropping it without committing rolls back.
struct MysqlTransaction<'a> {
    tx: Transaction<'a>,
    table: &'a LedgerTable,
}

#[async_trait::async_trait]
impl LedgerExecutor for MysqlTransaction<'_> {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        execute_script(&mut self.tx, sql).await.map_err(storage)
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        upsert(&mut self.tx, self.table, entry)
            .await
            .map_err(storage)
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        delete_by_name(&mut self.tx, self.table, name)
            .await
            .map_err(storage)
    }
}

#[async_trait::async_trait]
impl LedgerTransaction for MysqlTransaction<'_> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await.map_err(|e| transaction(e.into()))
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await.map_err(|e| transaction(e.into()))
    }
}
