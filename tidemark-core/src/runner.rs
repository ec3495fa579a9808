//! Migration runner: the caller-facing entry points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::apply::{ApplyOutcome, apply_migration};
use crate::error::MigrateResult;
use crate::file::{LocalMigration, load_local};
use crate::ledger::{LedgerRecord, LedgerStore};
use crate::plan::{MigrationAction, MigrationState, classify, plan};

/// Default migrations directory.
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";

/// Configuration for the migration runner.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Path to the migrations directory.
    pub migrations_dir: PathBuf,
    /// Record migrations as applied without executing them.
    pub dry_run: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            dry_run: false,
        }
    }
}

impl RunnerConfig {
    /// Create a new configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the migrations directory.
    pub fn migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = dir.into();
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Result of a migration run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Migrations executed for the first time.
    pub applied: Vec<String>,
    /// Previously failed migrations executed again.
    pub reapplied: Vec<String>,
    /// Migrations recorded without execution (dry run).
    pub recorded: Vec<String>,
    /// Migrations already applied.
    pub skipped: Vec<String>,
    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Number of migrations written to the ledger by this run.
    pub fn total_processed(&self) -> usize {
        self.applied.len() + self.reapplied.len() + self.recorded.len()
    }

    /// Check if the run changed anything.
    pub fn has_changes(&self) -> bool {
        self.total_processed() > 0
    }

    /// Get a summary of the result.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if !self.applied.is_empty() {
            parts.push(format!("{} applied", self.applied.len()));
        }

        if !self.reapplied.is_empty() {
            parts.push(format!("{} reapplied", self.reapplied.len()));
        }

        if !self.recorded.is_empty() {
            parts.push(format!("{} recorded without execution", self.recorded.len()));
        }

        if !self.skipped.is_empty() {
            parts.push(format!("{} already applied", self.skipped.len()));
        }

        if parts.is_empty() {
            "No migrations applied".to_string()
        } else {
            format!("{} in {}ms", parts.join(", "), self.duration_ms)
        }
    }

    fn record(&mut self, name: String, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => self.applied.push(name),
            ApplyOutcome::Reapplied => self.reapplied.push(name),
            ApplyOutcome::DryRun => self.recorded.push(name),
        }
    }
}

/// Reconcile the scripts in `dir` with the ledger and apply what is missing.
///
/// Scripts are loaded before the database is touched, so discovery errors
/// never reach the ledger. Migrations run one at a time in order and the
/// first failure ends the run.
pub async fn run<S>(store: &mut S, dir: impl AsRef<Path>, dry_run: bool) -> MigrateResult<RunReport>
where
    S: LedgerStore + ?Sized,
{
    let start = Instant::now();
    let dir = dir.as_ref();

    let local = load_local(dir).await?;

    store.init_schema().await?;
    let applied = store.load_applied().await?;
    debug!(records = applied.len(), "Loaded migration ledger");

    let plan = plan(local, &applied)?;
    info!(dry_run = dry_run, "Migration plan: {}", plan.summary());

    let mut report = RunReport::default();
    for step in plan.into_steps() {
        let name = step.migration.name.clone();
        if step.action == MigrationAction::Skip {
            debug!(migration = %name, "Already applied");
            report.skipped.push(name);
            continue;
        }

        let outcome = apply_migration(store, &step.migration, step.action, dry_run).await?;
        report.record(name, outcome);
    }

    report.duration_ms = start.elapsed().as_millis() as u64;
    if dry_run {
        info!("No SQL was executed. {}", report.summary());
    } else {
        info!("All migrations applied. {}", report.summary());
    }
    Ok(report)
}

/// Migration runner bound to a ledger store.
pub struct MigrationRunner<S: LedgerStore> {
    config: RunnerConfig,
    store: S,
}

impl<S: LedgerStore> MigrationRunner<S> {
    /// Create a new migration runner.
    pub fn new(config: RunnerConfig, store: S) -> Self {
        Self { config, store }
    }

    /// Get the configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Get the ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the ledger store mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the runner and return the ledger store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply outstanding migrations.
    pub async fn migrate(&mut self) -> MigrateResult<RunReport> {
        run(
            &mut self.store,
            &self.config.migrations_dir,
            self.config.dry_run,
        )
        .await
    }

    /// Get migration status.
    pub async fn status(&mut self) -> MigrateResult<MigrationStatus> {
        status(&mut self.store, &self.config.migrations_dir).await
    }
}

/// A local migration and its ledger state.
#[derive(Debug, Clone)]
pub struct MigrationStatusEntry {
    /// The migration.
    pub migration: LocalMigration,
    /// Ledger row, if one exists.
    pub record: Option<LedgerRecord>,
    /// Classification against the ledger.
    pub state: MigrationState,
}

/// Migration status information.
#[derive(Debug, Default)]
pub struct MigrationStatus {
    /// Local migrations in run order.
    pub entries: Vec<MigrationStatusEntry>,
    /// Ledger rows with no matching script on disk.
    pub orphaned: Vec<LedgerRecord>,
}

impl MigrationStatus {
    /// Number of migrations in the given state kind.
    fn count(&self, pred: impl Fn(&MigrationState) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.state)).count()
    }

    /// Migrations not yet attempted.
    pub fn pending(&self) -> usize {
        self.count(|s| matches!(s, MigrationState::Pending))
    }

    /// Migrations applied and unchanged.
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, MigrationState::Applied))
    }

    /// Migrations whose last attempt failed.
    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, MigrationState::Failed { .. }))
    }

    /// Applied migrations modified on disk.
    pub fn drifted(&self) -> usize {
        self.count(|s| matches!(s, MigrationState::Drifted { .. }))
    }

    /// Check if the next run would fail on drift.
    pub fn has_blocking_issues(&self) -> bool {
        self.drifted() > 0
    }

    /// Check if the ledger matches the directory exactly.
    pub fn is_up_to_date(&self) -> bool {
        self.pending() == 0 && self.failed() == 0 && self.drifted() == 0
    }
}

/// Report how each script in `dir` relates to the ledger, without applying
/// anything.
pub async fn status<S>(store: &mut S, dir: impl AsRef<Path>) -> MigrateResult<MigrationStatus>
where
    S: LedgerStore + ?Sized,
{
    let local = load_local(dir).await?;

    store.init_schema().await?;
    let applied = store.load_applied().await?;

    let mut by_name: HashMap<&str, &LedgerRecord> =
        applied.iter().map(|r| (r.name.as_str(), r)).collect();

    let entries = local
        .into_iter()
        .map(|migration| {
            let record = by_name.remove(migration.name.as_str());
            MigrationStatusEntry {
                state: classify(&migration, record),
                record: record.cloned(),
                migration,
            }
        })
        .collect();

    let orphaned = applied
        .iter()
        .filter(|r| by_name.contains_key(r.name.as_str()))
        .cloned()
        .collect();

    Ok(MigrationStatus { entries, orphaned })
}
