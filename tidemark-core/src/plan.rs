//! Reconciliation of local scripts against the ledger.

use std::collections::HashMap;
use std::fmt;

use crate::error::{MigrateResult, MigrationError};
use crate::file::LocalMigration;
use crate::ledger::LedgerRecord;

/// What the runner does with a local migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationAction {
    /// Never attempted; apply it.
    Apply,
    /// Last attempt failed; apply it again from the current file.
    Reapply,
    /// Already applied with a matching checksum.
    Skip,
}

impl MigrationAction {
    /// Whether this action runs the migration.
    pub fn is_pending(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

impl fmt::Display for MigrationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Reapply => write!(f, "reapply"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// How a local migration relates to its ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationState {
    /// No ledger row.
    Pending,
    /// Applied and unchanged on disk.
    Applied,
    /// The last attempt failed.
    Failed {
        /// Stored error message.
        error: Option<String>,
    },
    /// Applied, but the file changed since.
    Drifted {
        /// Checksum in the ledger.
        expected: String,
        /// Checksum on disk.
        actual: String,
    },
}

/// Classify a local migration against its ledger row, if any.
pub fn classify(local: &LocalMigration, record: Option<&LedgerRecord>) -> MigrationState {
    match record {
        None => MigrationState::Pending,
        Some(record) if !record.success => MigrationState::Failed {
            error: record.error.clone(),
        },
        Some(record) if record.checksum == local.checksum => MigrationState::Applied,
        Some(record) => MigrationState::Drifted {
            expected: record.checksum.clone(),
            actual: local.checksum.clone(),
        },
    }
}

/// A local migration paired with its planned action.
#[derive(Debug, Clone)]
pub struct PlanStep {
    /// The migration.
    pub migration: LocalMigration,
    /// What to do with it.
    pub action: MigrationAction,
}

/// Ordered actions for one run.
#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    steps: Vec<PlanStep>,
}

impl MigrationPlan {
    /// Every step, in execution order.
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Steps that run a migration.
    pub fn pending(&self) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(|s| s.action.is_pending())
    }

    /// Number of steps with the given action.
    pub fn count(&self, action: MigrationAction) -> usize {
        self.steps.iter().filter(|s| s.action == action).count()
    }

    /// Check if there's anything to run.
    pub fn is_empty(&self) -> bool {
        self.pending().next().is_none()
    }

    /// Consume the plan into its steps.
    pub fn into_steps(self) -> Vec<PlanStep> {
        self.steps
    }

    /// Get a summary of the plan.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        let apply = self.count(MigrationAction::Apply);
        if apply > 0 {
            parts.push(format!("{} to apply", apply));
        }

        let reapply = self.count(MigrationAction::Reapply);
        if reapply > 0 {
            parts.push(format!("{} to retry", reapply));
        }

        let skip = self.count(MigrationAction::Skip);
        if skip > 0 {
            parts.push(format!("{} up to date", skip));
        }

        if parts.is_empty() {
            "No migrations".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Decide what to do with each local migration.
///
/// `local` must already be in run order. Fails on the first migration that
/// was applied successfully but has since changed on disk; nothing is planned
/// in that case.
pub fn plan(local: Vec<LocalMigration>, applied: &[LedgerRecord]) -> MigrateResult<MigrationPlan> {
    let by_name: HashMap<&str, &LedgerRecord> =
        applied.iter().map(|r| (r.name.as_str(), r)).collect();

    let mut steps = Vec::with_capacity(local.len());
    for migration in local {
        let action = match classify(&migration, by_name.get(migration.name.as_str()).copied()) {
            MigrationState::Pending => MigrationAction::Apply,
            MigrationState::Failed { .. } => MigrationAction::Reapply,
            MigrationState::Applied => MigrationAction::Skip,
            MigrationState::Drifted { expected, actual } => {
                return Err(MigrationError::ChecksumMismatch {
                    name: migration.name,
                    expected,
                    actual,
                });
            }
        };
        steps.push(PlanStep { migration, action });
    }

    Ok(MigrationPlan { steps })
}
