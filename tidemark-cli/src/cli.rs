//! CLI argument definitions using clap.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// Tidemark - checksummed, transactional SQL migrations
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version)]
#[command(about = "Tidemark - checksummed, transactional SQL migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Ledger table name (overrides the configuration file)
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Database migration commands
    Migrate(MigrateArgs),

    /// Display version information
    Version,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(subcommand)]
    pub command: MigrateSubcommand,
}

/// Migrate subcommands
#[derive(Subcommand, Debug)]
pub enum MigrateSubcommand {
    /// Apply all outstanding migrations
    Up(MigrateUpArgs),

    /// Show how each migration relates to the ledger
    Status(MigrateStatusArgs),

    /// Create a new, empty migration file
    New(MigrateNewArgs),
}

/// Database and script directory selection shared by commands that connect
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Migrations directory (overrides the configuration file)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Database URL; the scheme selects the backend (sqlite, postgres, mysql)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub url: Option<String>,
}

/// Arguments for `migrate up`
#[derive(Args, Debug)]
pub struct MigrateUpArgs {
    /// Record migrations as applied without executing them
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for `migrate status`
#[derive(Args, Debug)]
pub struct MigrateStatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Arguments for `migrate new`
#[derive(Args, Debug)]
pub struct MigrateNewArgs {
    /// Descriptive name, appended to the timestamp prefix
    pub name: String,

    /// Migrations directory (overrides the configuration file)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate_up() {
        let cli = Cli::try_parse_from([
            "tidemark",
            "migrate",
            "up",
            "--dry-run",
            "--dir",
            "db/migrations",
            "--url",
            "sqlite://app.db",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, PathBuf::from("tidemark.toml"));
        match cli.command {
            Command::Migrate(MigrateArgs {
                command: MigrateSubcommand::Up(args),
            }) => {
                assert!(args.dry_run);
                assert_eq!(args.target.dir, Some(PathBuf::from("db/migrations")));
                assert_eq!(args.target.url.as_deref(), Some("sqlite://app.db"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_migrate_new_with_global_flags() {
        let cli = Cli::try_parse_from([
            "tidemark",
            "--table",
            "schema_history",
            "migrate",
            "new",
            "add_users",
        ])
        .unwrap();

        assert_eq!(cli.table.as_deref(), Some("schema_history"));
        match cli.command {
            Command::Migrate(MigrateArgs {
                command: MigrateSubcommand::New(args),
            }) => {
                assert_eq!(args.name, "add_users");
                assert_eq!(args.dir, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
