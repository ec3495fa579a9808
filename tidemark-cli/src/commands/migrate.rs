//! `tidemark migrate` commands - Apply and inspect migrations.

use std::path::PathBuf;

use tidemark_core::{LedgerTable, MigrationState, MigrationStatus};

use crate::cli::{
    MigrateArgs, MigrateNewArgs, MigrateStatusArgs, MigrateSubcommand, MigrateUpArgs, TargetArgs,
};
use crate::commands::Context;
use crate::driver::{self, redact};
use crate::error::CliResult;
use crate::output::{self, success, warn};

/// Run the migrate command
pub async fn run(args: MigrateArgs, ctx: &Context) -> CliResult<()> {
    match args.command {
        MigrateSubcommand::Up(up_args) => run_up(up_args, ctx).await,
        MigrateSubcommand::Status(status_args) => run_status(status_args, ctx).await,
        MigrateSubcommand::New(new_args) => run_new(new_args, ctx).await,
    }
}

/// Run `tidemark migrate up` - apply pending migrations
async fn run_up(args: MigrateUpArgs, ctx: &Context) -> CliResult<()> {
    output::header(if args.dry_run {
        "Migrate Up (dry run)"
    } else {
        "Migrate Up"
    });

    let target = Target::resolve(&args.target, ctx)?;
    target.print();

    let mut store = driver::connect(&target.url, target.table.clone()).await?;
    let report = tidemark_core::run(store.as_mut(), &target.dir, args.dry_run).await?;

    for name in &report.applied {
        output::list_item(&format!("{} {}", output::style_success("applied"), name));
    }
    for name in &report.reapplied {
        output::list_item(&format!("{} {}", output::style_success("reapplied"), name));
    }
    for name in &report.recorded {
        output::list_item(&format!("{} {}", output::style_pending("recorded"), name));
    }
    if report.has_changes() {
        output::newline();
        success(&report.summary());
    } else {
        success("Database is up to date");
    }

    if args.dry_run && !report.recorded.is_empty() {
        warn("Dry run: scripts were recorded as applied without being executed");
    }

    Ok(())
}

/// Run `tidemark migrate status` - compare local files with the ledger
async fn run_status(args: MigrateStatusArgs, ctx: &Context) -> CliResult<()> {
    output::header("Migration Status");

    let target = Target::resolve(&args.target, ctx)?;
    target.print();

    let mut store = driver::connect(&target.url, target.table.clone()).await?;
    let status = tidemark_core::status(store.as_mut(), &target.dir).await?;

    print_status(&status);
    Ok(())
}

fn print_status(status: &MigrationStatus) {
    if status.entries.is_empty() {
        output::info("No migration files found");
    } else {
        output::section("Migrations");
        for (i, entry) in status.entries.iter().enumerate() {
            let label = match &entry.state {
                MigrationState::Pending => output::style_pending("pending"),
                MigrationState::Applied => output::style_success("applied"),
                MigrationState::Failed { .. } => output::style_error("failed"),
                MigrationState::Drifted { .. } => output::style_error("drifted"),
            };
            output::numbered_item(i + 1, &format!("{} [{}]", entry.migration.name, label));

            match &entry.state {
                MigrationState::Failed { error: Some(error) } => {
                    output::dim(&format!("       {}", error));
                }
                MigrationState::Drifted { expected, actual } => {
                    output::dim(&format!("       recorded {} / on disk {}", expected, actual));
                }
                _ => {}
            }
        }
    }

    if !status.orphaned.is_empty() {
        output::newline();
        output::section("Recorded without a local file");
        for record in &status.orphaned {
            output::list_item(&record.name);
        }
    }

    output::newline();
    output::kv("Applied", &status.applied().to_string());
    output::kv("Pending", &status.pending().to_string());
    output::kv("Failed", &status.failed().to_string());
    output::kv("Drifted", &status.drifted().to_string());
    output::newline();

    if status.drifted() > 0 {
        warn("Applied migrations were modified; `migrate up` will refuse to run");
    } else if status.is_up_to_date() {
        success("Database is up to date");
    } else {
        output::info("Run `tidemark migrate up` to apply pending migrations");
    }
}

/// Run `tidemark migrate new` - create an empty migration script
async fn run_new(args: MigrateNewArgs, ctx: &Context) -> CliResult<()> {
    let dir = ctx.config.migrations_dir(args.dir.as_deref());
    let path = tidemark_core::create_migration(&dir, &args.name).await?;
    success(&format!("Created {}", path.display()));
    Ok(())
}

/// Database and directory a command operates on.
struct Target {
    url: String,
    dir: PathBuf,
    table: LedgerTable,
}

impl Target {
    fn resolve(args: &TargetArgs, ctx: &Context) -> CliResult<Self> {
        Ok(Self {
            url: ctx.config.database_url(args.url.as_deref())?,
            dir: ctx.config.migrations_dir(args.dir.as_deref()),
            table: ctx.config.ledger_table(ctx.table.as_deref())?,
        })
    }

    fn print(&self) {
        output::kv("Database", &redact(&self.url));
        output::kv("Migrations", &self.dir.display().to_string());
        output::kv("Ledger table", self.table.as_str());
        output::newline();
    }
}
