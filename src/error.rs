//! Application-wide error types.
//!
//! Library modules return [`Result`] over the [`Error`] enum, built with
//! `thiserror`. The CLI and `main` use `anyhow` for convenient propagation.
//!
//! Lookup misses (asking for an id that does not exist) are never errors:
//! accessors return `Option` or an empty collection instead.
//!
//! # Example
//!
//! ```ignore
//! use songbook::error::{Error, Result};
//!
//! fn open(path: &Path) -> Result<SqlitePool> {
//!     let pool = db::init_db(path).await?; // storage errors convert
//!     Ok(pool)
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The catalogue database could not be opened or created
    #[error("Catalogue unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Unreadable or missing tags on an audio file
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    /// Audio output collaborator failure
    #[error("Playback error: {0}")]
    Playback(String),

    /// A background task was cancelled before it finished
    #[error("Operation cancelled")]
    Cancelled,

    /// A background task panicked or was aborted
    #[error("Task join error: {0}")]
    TaskJoin(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a metadata error.
    pub fn metadata(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Metadata {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a playback error.
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback(message.into())
    }

    /// Wrap an error as storage-unavailable for the given database path.
    pub fn storage_unavailable(path: impl Into<PathBuf>, source: impl Into<Error>) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            source: Box::new(source.into()),
        }
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// True if this error (or the error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskJoin(e.to_string())
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_unavailable_names_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::storage_unavailable("/data/songbook.db", io);
        let msg = err.to_string();
        assert!(msg.contains("/data/songbook.db"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_metadata_error() {
        let err = Error::metadata("/music/song.mp3", "no tags");
        let msg = err.to_string();
        assert!(msg.contains("song.mp3"));
        assert!(msg.contains("no tags"));
    }

    #[test]
    fn test_cancelled_survives_context() {
        let err = Error::Cancelled.context("scanning /music");
        assert!(err.is_cancelled());
        assert!(!Error::playback("underrun").is_cancelled());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::playback("test"));
        let with_ctx = result.with_context("additional context");
        assert!(with_ctx.unwrap_err().to_string().contains("additional context"));
    }
}
