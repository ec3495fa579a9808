//! # Tidemark
//!
//! A checksummed, transactional SQL migration runner.
//!
//! Tidemark provides:
//! - Discovery of timestamp-prefixed `.sql` scripts with SHA-256 fingerprints
//! - A persisted ledger of every migration attempt and its outcome
//! - Drift detection for scripts edited after they were applied
//! - Automatic retry of migrations whose last attempt failed
//! - Ledger backends for SQLite, PostgreSQL and MySQL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tidemark::sqlite::{SqliteConfig, SqliteLedger};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tidemark::MigrationError> {
//!     let mut ledger = SqliteLedger::open(SqliteConfig::file("app.db")).await?;
//!
//!     let report = tidemark::run(&mut ledger, "./migrations", false).await?;
//!     println!("{}", report.summary());
//!
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use tidemark_core::*;

/// SQLite ledger backend.
#[cfg(feature = "sqlite")]
pub mod sqlite {
    pub use tidemark_sqlite::*;
}

/// PostgreSQL ledger backend.
#[cfg(feature = "postgres")]
pub mod postgres {
    pub use tidemark_postgres::*;
}

/// MySQL ledger backend.
#[cfg(feature = "mysql")]
pub mod mysql {
    pub use tidemark_mysql::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use tidemark_core::{
        LedgerExecutor, LedgerStore, LedgerTransaction, LocalMigration, MigrateResult,
        MigrationError, MigrationRunner, RunnerConfig, run, status,
    };
}
