//! `tidemark version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("Tidemark");

    kv("Version", VERSION);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let mut backends = Vec::new();

    #[cfg(feature = "sqlite")]
    backends.push("sqlite");

    #[cfg(feature = "postgres")]
    backends.push("postgres");

    #[cfg(feature = "mysql")]
    backends.push("mysql");

    if backends.is_empty() {
        backends.push("none");
    }

    kv("Backends", &backends.join(", "));
    output::newline();

    Ok(())
}
