//! Transactional application of a single migration.

use std::fmt;
use std::time::Instant;

use tracing::{info, instrument, warn};

use crate::error::{MigrateResult, MigrationError};
use crate::file::LocalMigration;
use crate::ledger::{LedgerEntry, LedgerStore, LedgerTransaction};
use crate::plan::MigrationAction;

/// Terminal state of a successful [`apply_migration`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// Script executed for the first time and committed.
    Applied,
    /// A previously failed script executed and committed.
    Reapplied,
    /// Recorded as applied without executing the script.
    DryRun,
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Reapplied => write!(f, "reapplied"),
            Self::DryRun => write!(f, "recorded (dry run)"),
        }
    }
}

/// Apply one migration.
///
/// The script and its ledger bookkeeping share one transaction. When
/// `action` is [`MigrationAction::Reapply`] the previous failed row is
/// deleted inside that transaction before the new row is written. With
/// `dry_run` the script is not executed, only recorded as applied.
///
/// If the script fails the transaction is rolled back and a failure row is
/// written outside of it on a best-effort basis; the returned error is always
/// the script's own error.
#[instrument(skip_all, fields(migration = %migration.name, action = %action, dry_run = dry_run))]
pub async fn apply_migration<S>(
    store: &mut S,
    migration: &LocalMigration,
    action: MigrationAction,
    dry_run: bool,
) -> MigrateResult<ApplyOutcome>
where
    S: LedgerStore + ?Sized,
{
    let reapply = match action {
        MigrationAction::Apply => false,
        MigrationAction::Reapply => true,
        MigrationAction::Skip => {
            return Err(MigrationError::migration_file(format!(
                "migration '{}' is already applied",
                migration.name
            )));
        }
    };

    let start = Instant::now();
    let outcome = apply_inner(store, migration, reapply, dry_run)
        .await
        .map_err(|e| e.in_migration(&migration.name))?;

    info!(
        outcome = %outcome,
        duration_ms = start.elapsed().as_millis() as u64,
        "Migration {}",
        migration.name
    );
    Ok(outcome)
}

async fn apply_inner<S>(
    store: &mut S,
    migration: &LocalMigration,
    reapply: bool,
    dry_run: bool,
) -> MigrateResult<ApplyOutcome>
where
    S: LedgerStore + ?Sized,
{
    let mut tx = store.begin().await?;

    if dry_run {
        if let Err(e) = record_success(tx.as_mut(), migration, reapply).await {
            rollback_quietly(tx, &migration.name).await;
            return Err(e);
        }
        tx.commit().await?;
        return Ok(ApplyOutcome::DryRun);
    }

    if let Err(e) = tx.execute_script(&migration.content).await {
        let message = e.driver_message();
        rollback_quietly(tx, &migration.name).await;

        let entry = LedgerEntry::failure(&migration.name, &migration.checksum, &message);
        if let Err(save_err) = store.upsert(&entry).await {
            warn!(
                migration = %migration.name,
                error = %save_err,
                "Failed to record migration failure"
            );
        }

        return Err(MigrationError::Execution {
            name: migration.name.clone(),
            message,
        });
    }

    if let Err(e) = record_success(tx.as_mut(), migration, reapply).await {
        rollback_quietly(tx, &migration.name).await;
        return Err(e);
    }
    tx.commit().await?;

    Ok(if reapply {
        ApplyOutcome::Reapplied
    } else {
        ApplyOutcome::Applied
    })
}

async fn record_success(
    executor: &mut (dyn LedgerTransaction + '_),
    migration: &LocalMigration,
    reapply: bool,
) -> MigrateResult<()> {
    if reapply {
        executor.delete_by_name(&migration.name).await?;
    }
    executor
        .upsert(&LedgerEntry::success(&migration.name, &migration.checksum))
        .await
}

async fn rollback_quietly(tx: Box<dyn LedgerTransaction + '_>, name: &str) {
    if let Err(e) = tx.rollback().await {
        warn!(migration = %name, error = %e, "Rollback failed");
    }
}
