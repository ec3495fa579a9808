//! Logging setup for the `tidemark` binary.
//!
//! Log output goes to stderr so command output on stdout stays clean.
//!
//! # Environment Variables
//!
//! - `RUST_LOG` - Full filter directive; overrides everything else
//! - `TIDEMARK_LOG_LEVEL=trace|debug|info|warn|error` - Level for Tidemark crates
//! - `TIDEMARK_LOG_FORMAT=compact|pretty|json` - Output format (default: compact)

use std::env;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const CRATES: &[&str] = &[
    "tidemark",
    "tidemark_core",
    "tidemark_sqlite",
    "tidemark_postgres",
    "tidemark_mysql",
    "tidemark_cli",
];

/// Level implied by the number of `-v` flags.
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Get the configured log level.
///
/// Any `-v` flag wins; otherwise `TIDEMARK_LOG_LEVEL` is used when it holds a
/// valid level.
pub fn get_log_level(verbose: u8) -> &'static str {
    if verbose > 0 {
        return level_for_verbosity(verbose);
    }
    match env::var("TIDEMARK_LOG_LEVEL")
        .map(|l| l.to_lowercase())
        .as_deref()
    {
        Ok("trace") => "trace",
        Ok("debug") => "debug",
        Ok("info") => "info",
        Ok("warn") => "warn",
        Ok("error") => "error",
        _ => level_for_verbosity(0),
    }
}

/// Build the filter directive for all Tidemark crates at `level`.
pub fn filter_directive(level: &str) -> String {
    CRATES
        .iter()
        .map(|krate| format!("{}={}", krate, level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging. Calling it more than once is harmless.
pub fn init(verbose: u8) {
    let level = get_log_level(verbose);
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(level)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let format = env::var("TIDEMARK_LOG_FORMAT")
        .map(|f| f.to_lowercase())
        .unwrap_or_default();

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!(level = level, format = %format, "Logging initialized");
    }
}
