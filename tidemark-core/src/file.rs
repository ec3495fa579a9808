//! Migration file discovery and creation.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};

/// File extension of migration scripts.
pub const SCRIPT_EXTENSION: &str = "sql";

/// A migration script discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalMigration {
    /// Path the script was read from.
    pub path: PathBuf,
    /// Migration name (file name without extension).
    pub name: String,
    /// Ordering key parsed from the name prefix.
    pub sequence_key: i64,
    /// SHA-256 of the raw file bytes, hex encoded.
    pub checksum: String,
    /// SQL to execute.
    pub content: String,
}

impl LocalMigration {
    /// Create a migration from a name and its raw content.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        let content = content.into();
        Self {
            path: PathBuf::new(),
            sequence_key: sequence_key(&name),
            checksum: compute_checksum(content.as_bytes()),
            name,
            content,
        }
    }

    /// Set the path for this migration.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }
}

/// Compute a SHA-256 checksum of raw script bytes.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Parse the ordering key from a migration name.
///
/// The key is the text before the first `_` read as a signed integer.
/// Anything that does not parse counts as `0`.
pub fn sequence_key(name: &str) -> i64 {
    let prefix = name.split_once('_').map_or(name, |(prefix, _)| prefix);
    prefix.parse().unwrap_or(0)
}

/// Load every migration script in `dir`, fingerprinted and in run order.
pub async fn load_local(dir: impl AsRef<Path>) -> MigrateResult<Vec<LocalMigration>> {
    let dir = dir.as_ref();

    match tokio::fs::metadata(dir).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(MigrationError::DirectoryNotFound(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MigrationError::DirectoryNotFound(dir.to_path_buf()));
        }
        Err(e) => return Err(MigrationError::Io(e)),
    }

    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if is_script(&path) && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(MigrationError::NoMigrations(dir.to_path_buf()));
    }

    let mut migrations = Vec::with_capacity(paths.len());
    for path in paths {
        migrations.push(read_script(&path).await?);
    }

    sort_migrations(&mut migrations);

    info!(dir = %dir.display(), count = migrations.len(), "Loaded local migrations");
    Ok(migrations)
}

/// Sort migrations by sequence key, then by name.
pub fn sort_migrations(migrations: &mut [LocalMigration]) {
    migrations.sort_by(|a, b| {
        a.sequence_key
            .cmp(&b.sequence_key)
            .then_with(|| a.name.cmp(&b.name))
    });
}

fn is_script(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SCRIPT_EXTENSION)
}

async fn read_script(path: &Path) -> MigrateResult<LocalMigration> {
    let name = path
        .file_stem()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            MigrationError::migration_file(format!("invalid file name: {}", path.display()))
        })?
        .to_string();

    let bytes = tokio::fs::read(path).await?;
    let checksum = compute_checksum(&bytes);
    let content = String::from_utf8(bytes).map_err(|_| {
        MigrationError::migration_file(format!("{} is not valid UTF-8", path.display()))
    })?;

    debug!(name = %name, checksum = %checksum, "Read migration script");

    Ok(LocalMigration {
        path: path.to_path_buf(),
        sequence_key: sequence_key(&name),
        name,
        checksum,
        content,
    })
}

/// Generate a new migration version from the current UTC time.
pub fn generate_version() -> String {
    Utc::now().format("%Y%m%d%H%M%S").to_string()
}

/// Create an empty, timestamped migration script in `dir`.
///
/// Returns the path of the new file.
pub async fn create_migration(dir: impl AsRef<Path>, name: &str) -> MigrateResult<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MigrationError::migration_file("migration name cannot be empty"));
    }

    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let file_name = format!("{}_{}.{}", generate_version(), name, SCRIPT_EXTENSION);
    let path = dir.join(&file_name);

    if tokio::fs::try_exists(&path).await? {
        return Err(MigrationError::migration_file(format!(
            "{} already exists",
            path.display()
        )));
    }

    let header = format!(
        "-- Migration: {}\n-- Created at: {}\n\n",
        file_name,
        Utc::now().to_rfc3339()
    );
    tokio::fs::write(&path, header).await?;

    info!(path = %path.display(), "Created migration");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write(dir: &Path, file: &str, content: &str) {
        tokio::fs::write(dir.join(file), content).await.unwrap();
    }

    #[test]
    fn test_sequence_key() {
        assert_eq!(sequence_key("20240101000000_create_users"), 20240101000000);
        assert_eq!(sequence_key("0_c"), 0);
        assert_eq!(sequence_key("abc_def"), 0);
        assert_eq!(sequence_key("42"), 42);
        assert_eq!(sequence_key("99999999999999999999_overflow"), 0);
        assert_eq!(sequence_key("_leading"), 0);
    }

    #[test]
    fn test_compute_checksum() {
        let checksum1 = compute_checksum(b"CREATE TABLE users();");
        let checksum2 = compute_checksum(b"CREATE TABLE users();");
        let checksum3 = compute_checksum(b"DROP TABLE users;");

        assert_eq!(checksum1, checksum2);
        assert_ne!(checksum1, checksum3);
        assert_eq!(checksum1.len(), 64);
    }

    #[test]
    fn test_checksum_known_value() {
        assert_eq!(
            compute_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sort_ties_broken_by_name() {
        let mut migrations = vec![
            LocalMigration::new("5_b", "SELECT 1"),
            LocalMigration::new("x_unparsable", "SELECT 1"),
            LocalMigration::new("5_a", "SELECT 1"),
            LocalMigration::new("0_zero", "SELECT 1"),
        ];
        sort_migrations(&mut migrations);

        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["0_zero", "x_unparsable", "5_a", "5_b"]);
    }

    #[tokio::test]
    async fn test_load_local_orders_by_sequence_key() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "20240102000000_b.sql", "SELECT 2;").await;
        write(dir.path(), "20240101000000_a.sql", "SELECT 1;").await;
        write(dir.path(), "0_c.sql", "SELECT 0;").await;

        let migrations = load_local(dir.path()).await.unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["0_c", "20240101000000_a", "20240102000000_b"]);
    }

    #[tokio::test]
    async fn test_load_local_fingerprints_raw_bytes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "001_init.sql", "CREATE TABLE t(id int)").await;

        let migrations = load_local(dir.path()).await.unwrap();
        assert_eq!(migrations.len(), 1);
        let m = &migrations[0];
        assert_eq!(m.name, "001_init");
        assert_eq!(m.sequence_key, 1);
        assert_eq!(m.content, "CREATE TABLE t(id int)");
        assert_eq!(m.checksum, compute_checksum(b"CREATE TABLE t(id int)"));
        assert_eq!(m.path, dir.path().join("001_init.sql"));
    }

    #[tokio::test]
    async fn test_load_local_ignores_other_files_and_subdirs() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "001_init.sql", "SELECT 1;").await;
        write(dir.path(), "README.md", "docs").await;
        write(dir.path(), "002_upper.SQL", "SELECT 2;").await;
        tokio::fs::create_dir(dir.path().join("003_nested.sql")).await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();
        write(&dir.path().join("sub"), "004_deep.sql", "SELECT 4;").await;

        let migrations = load_local(dir.path()).await.unwrap();
        let names: Vec<_> = migrations.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["001_init"]);
    }

    #[tokio::test]
    async fn test_load_local_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = load_local(&missing).await.unwrap_err();
        assert!(matches!(err, MigrationError::DirectoryNotFound(p) if p == missing));
    }

    #[tokio::test]
    async fn test_load_local_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes.txt", "nothing here").await;

        let err = load_local(dir.path()).await.unwrap_err();
        assert!(matches!(err, MigrationError::NoMigrations(_)));
    }

    #[tokio::test]
    async fn test_load_local_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("001_bin.sql"), [0xff, 0xfe, 0x00])
            .await
            .unwrap();

        let err = load_local(dir.path()).await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidMigration(_)));
    }

    #[tokio::test]
    async fn test_create_migration_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("migrations");

        let path = create_migration(&target, "add_users").await.unwrap();
        let file_name = path.file_name().unwrap().to_str().unwrap().to_string();

        assert!(file_name.ends_with("_add_users.sql"));
        let version = file_name.split('_').next().unwrap();
        assert_eq!(version.len(), 14);
        assert!(version.chars().all(|c| c.is_ascii_digit()));

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(content.starts_with(&format!("-- Migration: {}\n-- Created at: ", file_name)));
        assert!(content.ends_with("\n\n"));

        let loaded = load_local(&target).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, file_name.trim_end_matches(".sql"));
    }

    #[tokio::test]
    async fn test_create_migration_rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_migration(dir.path(), "  ").await.unwrap_err();
        assert!(matches!(err, MigrationError::InvalidMigration(_)));
    }
}
