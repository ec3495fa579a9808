//! Tidemark CLI - Command-line interface for the Tidemark migration runner.

use clap::Parser;

use tidemark_cli::cli::{Cli, Command};
use tidemark_cli::commands::{self, Context};
use tidemark_cli::error::CliResult;
use tidemark_cli::{logging, output};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        if let Some(hint) = e.hint() {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let Cli {
        config,
        table,
        command,
        ..
    } = cli;

    match command {
        Command::Migrate(args) => {
            let ctx = Context::load(config, table)?;
            commands::migrate::run(args, &ctx).await
        }
        Command::Version => commands::version::run().await,
    }
}
