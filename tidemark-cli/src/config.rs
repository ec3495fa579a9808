//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tidemark_core::{DEFAULT_LEDGER_TABLE, DEFAULT_MIGRATIONS_DIR, LedgerTable};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "tidemark.toml";

/// Tidemark CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a file, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> CliResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the database URL.
    ///
    /// An explicit URL (from `--url` or `DATABASE_URL`) wins over the
    /// configuration file. `${VAR}` and `$VAR` references in the file's URL
    /// are expanded from the environment.
    pub fn database_url(&self, explicit: Option<&str>) -> CliResult<String> {
        if let Some(url) = explicit.filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }

        if let Some(ref url) = self.database.url {
            let expanded = expand_env_var(url);
            if !expanded.is_empty() && !expanded.contains("${") {
                return Ok(expanded);
            }
            return Err(CliError::Config(format!(
                "database URL '{}' references an unset environment variable",
                url
            )));
        }

        Err(CliError::Config(format!(
            "Database URL not found. Pass --url, set DATABASE_URL or configure it in {}",
            CONFIG_FILE_NAME
        )))
    }

    /// Resolve the migrations directory
    pub fn migrations_dir(&self, explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&self.migrations.directory))
    }

    /// Resolve the ledger table name
    pub fn ledger_table(&self, explicit: Option<&str>) -> CliResult<LedgerTable> {
        let name = explicit.unwrap_or(&self.migrations.table);
        LedgerTable::new(name).map_err(|e| CliError::Config(e.to_string()))
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory for migration files
    pub directory: String,

    /// Ledger table name
    pub table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: DEFAULT_MIGRATIONS_DIR.to_string(),
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }
}

/// Expand `${VAR}` and `$VAR` references from the environment.
///
/// Unset variables are left in place.
fn expand_env_var(s: &str) -> String {
    let mut result = s.to_string();
    for pattern in [r"\$\{([^}]+)\}", r"\$([A-Z_][A-Z0-9_]*)"] {
        let Ok(re) = regex_lite::Regex::new(pattern) else {
            continue;
        };
        result = re
            .replace_all(&result, |caps: &regex_lite::Captures<'_>| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned();
    }
    result
}
