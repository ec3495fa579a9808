//! Tidemark CLI - Command-line interface for the Tidemark migration runner.
//!
//! Applies plain SQL migration scripts to SQLite, PostgreSQL or MySQL and
//! reports what the ledger table knows about them.

pub mod cli;
pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod output;
