//! PostgreSQL migration ledger.

use tokio::task::JoinHandle;
use tokio_postgres::{Client, GenericClient, NoTls, Row, Transaction};
use tracing::{debug, error};

use tidemark_core::{
    LedgerEntry, LedgerExecutor, LedgerRecord, LedgerStore, LedgerTable, LedgerTransaction,
    MigrateResult, MigrationError, parse_timestamp,
};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// Migration ledger stored in a PostgreSQL database.
///
/// Owns one client; its connection is driven by a background task that ends
/// when the ledger is dropped.
pub struct PgLedger {
    client: Client,
    table: LedgerTable,
    connection: JoinHandle<()>,
}

impl PgLedger {
    /// Connect using `config`.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let (client, connection) = config.to_pg_config().connect(NoTls).await?;

        let connection = tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection error");
            }
        });

        debug!(
            host = %config.host,
            database = %config.database,
            table = %config.table,
            "Connected PostgreSQL ledger"
        );
        Ok(Self {
            client,
            table: config.table,
            connection,
        })
    }

    /// Connect from a `postgres://` URL.
    pub async fn connect_url(url: &str) -> PgResult<Self> {
        Self::connect(PgConfig::from_url(url)?).await
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Get the ledger table.
    pub fn table(&self) -> &LedgerTable {
        &self.table
    }
}

impl Drop for PgLedger {
    fn drop(&mut self) {
        self.connection.abort();
    }
}

async fn upsert<C>(client: &C, table: &LedgerTable, entry: &LedgerEntry<'_>) -> PgResult<()>
where
    C: GenericClient + Sync,
{
    let sql = format!(
        "INSERT INTO {table} (name, checksum, success, error) VALUES ($1, $2, $3, $4) \
         ON CONFLICT (name) DO UPDATE SET success = EXCLUDED.success"
    );
    client
        .execute(
            sql.as_str(),
            &[&entry.name, &entry.checksum, &entry.success, &entry.error],
        )
        .await?;
    Ok(())
}

async fn delete_by_name<C>(client: &C, table: &LedgerTable, name: &str) -> PgResult<()>
where
    C: GenericClient + Sync,
{
    let sql = format!("DELETE FROM {table} WHERE name = $1");
    client.execute(sql.as_str(), &[&name]).await?;
    Ok(())
}

fn record_from_row(row: &Row) -> PgResult<LedgerRecord> {
    let id: i32 = row.try_get("id")?;
    let applied_at: Option<String> = row.try_get("applied_at")?;
    Ok(LedgerRecord {
        id: i64::from(id),
        name: row.try_get("name")?,
        checksum: row.try_get("checksum")?,
        success: row.try_get("success")?,
        error: row.try_get("error")?,
        applied_at: applied_at.as_deref().and_then(parse_timestamp),
    })
}

fn storage(err: PgError) -> MigrationError {
    MigrationError::storage(err.message())
}

fn transaction(err: PgError) -> MigrationError {
    MigrationError::transaction(err.message())
}

#[async_trait::async_trait]
impl LedgerExecutor for PgLedger {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        self.client
            .batch_execute(sql)
            .await
            .map_err(|e| storage(e.into()))
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        upsert(&self.client, &self.table, entry)
            .await
            .map_err(storage)
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        delete_by_name(&self.client, &self.table, name)
            .await
            .map_err(storage)
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedger {
    async fn init_schema(&mut self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                checksum VARCHAR(64) NOT NULL,
                success BOOLEAN NOT NULL DEFAULT FALSE,
                error TEXT,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
            self.table
        );
        self.client
            .batch_execute(&sql)
            .await
            .map_err(|e| MigrationError::storage_init(PgError::from(e).message()))
    }

    async fn load_applied(&mut self) -> MigrateResult<Vec<LedgerRecord>> {
        let sql = format!(
            "SELECT id, name, checksum, success, error, \
             to_char(applied_at, 'YYYY-MM-DD HH24:MI:SS') AS applied_at \
             FROM {} ORDER BY id",
            self.table
        );

        let rows = self
            .client
            .query(sql.as_str(), &[])
            .await
            .map_err(|e| storage(e.into()))?;

        let records = rows
            .iter()
            .map(record_from_row)
            .collect::<PgResult<Vec<_>>>()
            .map_err(storage)?;

        debug!(count = records.len(), "Loaded PostgreSQL ledger rows");
        Ok(records)
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn LedgerTransaction + 'a>> {
        let tx = self
            .client
            .transaction()
            .await
            .map_err(|e| transaction(e.into()))?;
        Ok(Box::new(PgTransaction {
            tx,
            table: &self.table,
        }))
    }
}

/// An open transaction on a [`PgLedger`].
///
/// Dropping it without committing rolls back.
struct PgTransaction<'a> {
    tx: Transaction<'a>,
    table: &'a LedgerTable,
}

#[async_trait::async_trait]
impl LedgerExecutor for PgTransaction<'_> {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        self.tx
            .batch_execute(sql)
            .await
            .map_err(|e| storage(e.into()))
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        upsert(&self.tx, self.table, entry).await.map_err(storage)
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        delete_by_name(&self.tx, self.table, name)
            .await
            .map_err(storage)
    }
}

#[async_trait::async_trait]
impl LedgerTransaction for PgTransaction<'_> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        self.tx.commit().await.map_err(|e| transaction(e.into()))
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.tx.rollback().await.map_err(|e| transaction(e.into()))
    }
}
