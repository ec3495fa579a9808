//! CLI command implementations.

pub mod migrate;
pub mod version;

use std::path::PathBuf;

use crate::config::Config;
use crate::error::CliResult;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Loaded configuration file (or defaults)
    pub config: Config,
    /// Where the configuration was looked up
    pub config_path: PathBuf,
    /// `--table` override
    pub table: Option<String>,
}

impl Context {
    /// Load the configuration at `config_path`, falling back to defaults.
    pub fn load(config_path: PathBuf, table: Option<String>) -> CliResult<Self> {
        Ok(Self {
            config: Config::load_or_default(&config_path)?,
            config_path,
            table,
        })
    }
}
