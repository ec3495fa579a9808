//! Backend selection from a database URL.

use std::fmt;

use tidemark_core::{LedgerStore, LedgerTable, MigrationError};
use tracing::debug;

use crate::error::CliResult;

/// A supported database backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// SQLite via `sqlite:` URLs
    Sqlite,
    /// PostgreSQL via `postgres:` or `postgresql:` URLs
    Postgres,
    /// MySQL via `mysql:` URLs
    Mysql,
}

impl Driver {
    /// Pick the backend from the URL scheme.
    pub fn from_url(url: &str) -> CliResult<Self> {
        let scheme = url.split_once(':').map(|(scheme, _)| scheme).unwrap_or(url);
        match scheme.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            _ => Err(MigrationError::unsupported_driver(scheme).into()),
        }
    }

    /// Cargo feature that compiles this backend in.
    pub fn feature(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::Mysql => write!(f, "MySQL"),
        }
    }
}

/// Open a ledger store for `url`.
pub async fn connect(url: &str, table: LedgerTable) -> CliResult<Box<dyn LedgerStore>> {
    let driver = Driver::from_url(url)?;
    debug!(driver = %driver, url = %redact(url), "Connecting");

    match driver {
        #[cfg(feature = "sqlite")]
        Driver::Sqlite => {
            let config = tidemark_sqlite::SqliteConfig::from_url(url)?.table(table);
            Ok(Box::new(tidemark_sqlite::SqliteLedger::open(config).await?))
        }
        #[cfg(feature = "postgres")]
        Driver::Postgres => {
            let config = tidemark_postgres::PgConfig::from_url(url)?.table(table);
            Ok(Box::new(tidemark_postgres::PgLedger::connect(config).await?))
        }
        #[cfg(feature = "mysql")]
        Driver::Mysql => {
            let config = tidemark_mysql::MysqlConfig::from_url(url)?.table(table);
            Ok(Box::new(tidemark_mysql::MysqlLedger::connect(config).await?))
        }
        #[allow(unreachable_patterns)]
        other => {
            let _ = table;
            Err(MigrationError::unsupported_driver(format!(
                "{} (built without the `{}` feature)",
                other.feature(),
                other.feature()
            ))
            .into())
        }
    }
}

/// Hide the password in a database URL.
pub fn redact(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some("****")).is_ok() {
                parsed.to_string()
            } else {
                url.to_string()
            }
        }
        _ => url.to_string(),
    }
}
