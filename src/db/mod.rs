//! Catalogue store: SQLite schema and per-entity accessors.
//!
//! Uses SQLx with SQLite for lightweight, embedded storage. The store is a
//! pool; every worker acquires its own connection from it.
//!
//! Accessor functions take `&mut SqliteConnection`, so the caller picks the
//! commit boundary: pass a pooled connection for autocommit statements, or
//! `&mut *tx` to batch writes inside a transaction.
//!
//! - [`artists`], [`genres`], [`albums`], [`tracks`] - lookups and inserts
//! - [`maintenance`] - compilation merge and orphan cleanup
//!
//! # Example
//!
//! ```ignore
//! use songbook::db;
//!
//! let pool = db::init_db(&db::default_db_path()?).await?;
//! let mut conn = pool.acquire().await?;
//! let name = db::albums::name(&mut conn, 1).await?;
//! ```

pub mod albums;
pub mod artists;
pub mod genres;
pub mod maintenance;
pub mod tracks;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::error::{Error, Result, ResultExt};

/// Default database filename.
pub const DEFAULT_DB_NAME: &str = "songbook.db";

/// Build a SQLite database URL from a file path.
pub fn db_url(path: &Path) -> String {
    format!("sqlite:{}", path.display())
}

/// `LIKE` pattern matching `text` anywhere. Wildcards in `text` match
/// literally; pair it with `ESCAPE '\'`.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Location of the catalogue under the user data directory.
///
/// Falls back to the current directory when the platform has no data dir.
pub fn default_db_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("songbook").join(DEFAULT_DB_NAME),
        None => PathBuf::from(DEFAULT_DB_NAME),
    }
}

/// Open (creating if needed) the catalogue database and run migrations.
///
/// Creates the parent directory, enables WAL so readers do not block the
/// scanner's write transaction, and sets a busy timeout so concurrent writers
/// queue instead of failing.
///
/// # Errors
///
/// Any failure is reported as [`Error::StorageUnavailable`] naming the path.
pub async fn init_db(path: &Path) -> Result<SqlitePool> {
    open(path)
        .await
        .map_err(|e| Error::storage_unavailable(path, e))
}

async fn open(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(format!("creating {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::from_str(&db_url(path))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!(target: "db", path = %path.display(), "Catalogue opened");
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_db_creates_database() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let pool = init_db(&db_path).await.expect("Failed to init db");
        assert!(db_path.exists());

        let mut conn = pool.acquire().await.unwrap();
        assert!(maintenance::is_empty(&mut conn).await.unwrap());
    }

    #[tokio::test]
    async fn test_init_db_is_reopenable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let pool = init_db(&db_path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        artists::add(&mut conn, "Kept").await.unwrap();
        drop(conn);
        pool.close().await;

        let pool = init_db(&db_path).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert!(artists::id_by_name(&mut conn, "Kept").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unopenable_path_is_storage_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = init_db(&blocker.join("test.db")).await.unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("queen"), "%queen%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("a_b"), "%a\\_b%");
        assert_eq!(contains_pattern("c:\\x"), "%c:\\\\x%");
    }
}
