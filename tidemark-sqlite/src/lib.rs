//! SQLite ledger backend for Tidemark.
//!
//! This crate stores the migration ledger in a SQLite database, using
//! `tokio-rusqlite` for asynchronous access.
//!
//! # Features
//!
//! - Async/await support via `tokio-rusqlite`
//! - In-memory and file-based databases
//! - Migrations and their ledger rows share one `BEGIN IMMEDIATE` transaction
//!
//! # Example
//!
//! ```rust,ignore
//! use tidemark_sqlite::{SqliteConfig, SqliteLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SqliteConfig::from_url("sqlite://./app.db")?;
//!     let mut ledger = SqliteLedger::open(config).await?;
//!
//!     tidemark_core::run(&mut ledger, "./migrations", false).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use error::{SqliteError, SqliteResult};
pub use ledger::SqliteLedger;
