//! Error types for rollcall.
//!
//! Submission failures against the remote ledger are not errors at this
//! level: the orchestrator folds them into a queued result. What remains here
//! are the failures a caller genuinely has to see, chiefly storage.

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the library.
#[derive(Error, Debug)]
pub enum Error {
    /// The queue database could not be opened or created.
    #[error("cannot open queue database {path}: {source}")]
    DatabaseOpen {
        /// Database file.
        path: PathBuf,
        /// Cause reported by `SQLite`.
        #[source]
        source: rusqlite::Error,
    },

    /// A statement against the queue database failed.
    #[error("queue database error: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The queue database schema could not be brought up to date.
    #[error("queue schema migration failed: {message}")]
    DatabaseMigration {
        /// What went wrong.
        message: String,
    },

    /// The storage engine refused the operation.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The data directory for the queue database could not be created.
    #[error("cannot create data directory {path}: {source}")]
    DirectoryCreate {
        /// Directory that was requested.
        path: PathBuf,
        /// Cause reported by the OS.
        #[source]
        source: std::io::Error,
    },

    /// Configuration sources could not be read or merged.
    #[error("cannot load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration was read but holds an unusable value.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Which setting is wrong and why.
        message: String,
    },

    /// An endpoint URL could not be parsed.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Cause reported by the parser.
        #[source]
        source: url::ParseError,
    },

    /// A bug or an environment problem that callers cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Shorthand for [`Error::StorageUnavailable`].
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageUnavailable(message.into())
    }

    /// Shorthand for [`Error::Internal`].
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Shorthand for [`Error::InvalidUrl`].
    #[must_use]
    pub fn invalid_url(url: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            source,
        }
    }

    /// Whether the offline queue itself failed. The orchestrator reports
    /// these to the user instead of queueing.
    #[must_use]
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::StorageUnavailable(_)
                | Self::DirectoryCreate { .. }
        )
    }
}
