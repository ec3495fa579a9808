//! # tidemark-core
//!
//! Migration engine for Tidemark.
//!
//! This crate provides functionality for:
//! - Discovering `.sql` migration scripts and fingerprinting them
//! - Tracking every attempted migration in a ledger table
//! - Reconciling scripts against the ledger (apply, retry, skip, or refuse)
//! - Applying each script and its ledger row in a single transaction
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌─────────────┐
//! │ Script Dir   │────▶│ Loader         │────▶│ Planner     │
//! └──────────────┘     └────────────────┘     └─────────────┘
//!                                                    ▲   │
//!                      ┌────────────────┐            │   ▼
//!                      │ Ledger Table   │────────────┘ ┌─────────────┐
//!                      └────────────────┘◀─────────────│ Applier     │
//!                                                      └─────────────┘
//! ```
//!
//! Storage is abstracted behind [`LedgerStore`]; the `tidemark-sqlite`,
//! `tidemark-postgres` and `tidemark-mysql` crates provide implementations.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tidemark_core::{MigrationRunner, RunnerConfig};
//!
//! async fn migrate(store: impl tidemark_core::LedgerStore) -> tidemark_core::MigrateResult<()> {
//!     let config = RunnerConfig::new().migrations_dir("./migrations");
//!     let mut runner = MigrationRunner::new(config, store);
//!
//!     let report = runner.migrate().await?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Migration Files
//!
//! Each migration is one file; its name without the `.sql` extension is the
//! migration name. The text before the first `_` is parsed as an integer to
//! order the scripts:
//!
//! ```text
//! migrations/
//! ├── 20231215120000_create_users.sql
//! └── 20231216090000_add_posts.sql
//! ```
//!
//! A migration that was applied successfully must not change afterwards. A
//! migration that failed is retried from its current content on the next run.

pub mod apply;
pub mod error;
pub mod file;
pub mod ledger;
pub mod plan;
pub mod runner;

#[cfg(test)]
mod testing;

// Re-exports
pub use apply::{ApplyOutcome, apply_migration};
pub use error::{MigrateResult, MigrationError};
pub use file::{
    LocalMigration, SCRIPT_EXTENSION, compute_checksum, create_migration, generate_version,
    load_local, sequence_key, sort_migrations,
};
pub use ledger::{
    DEFAULT_LEDGER_TABLE, LedgerEntry, LedgerExecutor, LedgerRecord, LedgerStore, LedgerTable,
    LedgerTransaction, TIMESTAMP_FORMAT, parse_timestamp,
};
pub use plan::{MigrationAction, MigrationPlan, MigrationState, PlanStep, classify, plan};
pub use runner::{
    DEFAULT_MIGRATIONS_DIR, MigrationRunner, MigrationStatus, MigrationStatusEntry, RunReport,
    RunnerConfig, run, status,
};
