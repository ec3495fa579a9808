//! In-memory ledger used by unit tests.

use std::collections::HashMap;

use crate::error::{MigrateResult, MigrationError};
use crate::ledger::{LedgerEntry, LedgerExecutor, LedgerRecord, LedgerStore, LedgerTransaction};

/// A recorded ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Init,
    Begin,
    Script(String),
    Upsert(String, bool),
    Delete(String),
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Default)]
struct State {
    rows: Vec<LedgerRecord>,
    executed: Vec<String>,
    next_id: i64,
}

impl State {
    fn upsert(&mut self, entry: &LedgerEntry<'_>) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.name == entry.name) {
            row.success = entry.success;
            return;
        }
        self.next_id += 1;
        self.rows.push(LedgerRecord {
            id: self.next_id,
            name: entry.name.to_string(),
            checksum: entry.checksum.to_string(),
            success: entry.success,
            error: entry.error.map(String::from),
            applied_at: None,
        });
    }

    fn delete(&mut self, name: &str) {
        self.rows.retain(|r| r.name != name);
    }
}

/// Ledger kept in memory with staged transactions and failure injection.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: State,
    ops: Vec<Op>,
    failing_scripts: HashMap<String, String>,
    fail_outer_upserts: bool,
    fail_commit: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing the op log.
    pub fn seed(&mut self, name: &str, checksum: &str, success: bool, error: Option<&str>) {
        self.state.upsert(&LedgerEntry {
            name,
            checksum,
            success,
            error,
        });
    }

    /// Make any script containing `pattern` fail with `message`.
    pub fn fail_script(&mut self, pattern: &str, message: &str) {
        self.failing_scripts
            .insert(pattern.to_string(), message.to_string());
    }

    pub fn fail_upserts_outside_transaction(&mut self) {
        self.fail_outer_upserts = true;
    }

    pub fn fail_commit(&mut self) {
        self.fail_commit = true;
    }

    pub fn rows(&self) -> &[LedgerRecord] {
        &self.state.rows
    }

    /// Scripts executed by committed transactions.
    pub fn executed(&self) -> &[String] {
        &self.state.executed
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    fn script_error(&self, sql: &str) -> Option<MigrationError> {
        self.failing_scripts
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, message)| MigrationError::storage(message.clone()))
    }
}

#[async_trait::async_trait]
impl LedgerExecutor for MemoryLedger {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        self.ops.push(Op::Script(sql.to_string()));
        if let Some(err) = self.script_error(sql) {
            return Err(err);
        }
        self.state.executed.push(sql.to_string());
        Ok(())
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        self.ops
            .push(Op::Upsert(entry.name.to_string(), entry.success));
        if self.fail_outer_upserts {
            return Err(MigrationError::storage("ledger unavailable"));
        }
        self.state.upsert(entry);
        Ok(())
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        self.ops.push(Op::Delete(name.to_string()));
        self.state.delete(name);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn init_schema(&mut self) -> MigrateResult<()> {
        self.ops.push(Op::Init);
        Ok(())
    }

    async fn load_applied(&mut self) -> MigrateResult<Vec<LedgerRecord>> {
        let mut rows = self.state.rows.clone();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn begin<'a>(&'a mut self) -> MigrateResult<Box<dyn LedgerTransaction + 'a>> {
        self.ops.push(Op::Begin);
        let staged = self.state.clone();
        Ok(Box::new(MemoryTransaction {
            ledger: self,
            staged,
        }))
    }
}

struct MemoryTransaction<'a> {
    ledger: &'a mut MemoryLedger,
    staged: State,
}

#[async_trait::async_trait]
impl LedgerExecutor for MemoryTransaction<'_> {
    async fn execute_script(&mut self, sql: &str) -> MigrateResult<()> {
        self.ledger.ops.push(Op::Script(sql.to_string()));
        if let Some(err) = self.ledger.script_error(sql) {
            return Err(err);
        }
        self.staged.executed.push(sql.to_string());
        Ok(())
    }

    async fn upsert(&mut self, entry: &LedgerEntry<'_>) -> MigrateResult<()> {
        self.ledger
            .ops
            .push(Op::Upsert(entry.name.to_string(), entry.success));
        self.staged.upsert(entry);
        Ok(())
    }

    async fn delete_by_name(&mut self, name: &str) -> MigrateResult<()> {
        self.ledger.ops.push(Op::Delete(name.to_string()));
        self.staged.delete(name);
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerTransaction for MemoryTransaction<'_> {
    async fn commit(self: Box<Self>) -> MigrateResult<()> {
        let this = *self;
        if this.ledger.fail_commit {
            return Err(MigrationError::transaction("commit refused"));
        }
        this.ledger.ops.push(Op::Commit);
        this.ledger.state = this.staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrateResult<()> {
        self.ledger.ops.push(Op::Rollback);
        Ok(())
    }
}
