//! Centralized error types for emlsearch.

use std::path::PathBuf;
use thiserror::Error;

use crate::index::IndexState;

/// All errors produced by the emlsearch library.
#[derive(Error, Debug)]
pub enum EmlError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file or directory does not exist.
    #[error("Not found: {0}")]
    FileNotFound(PathBuf),

    /// An email file could not be read or is not a valid message.
    #[error("Cannot parse email '{path}': {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The index lock is held by a live writer and the retry budget ran out.
    #[error("Index at '{path}' is locked by another process (gave up after {attempts} attempts)")]
    IndexUnavailable { path: PathBuf, attempts: u32 },

    /// An index operation was issued outside its valid lifecycle state.
    #[error("Cannot {operation} while the index is {state}")]
    InvalidState {
        operation: &'static str,
        state: IndexState,
    },

    /// The free-text search expression is malformed.
    #[error("Invalid search query '{query}': {reason}")]
    QuerySyntax { query: String, reason: String },

    /// The on-disk index is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible index at '{path}': {reason}")]
    InvalidIndex { path: PathBuf, reason: String },

    /// Search was requested while the session runs without an index.
    #[error("Search is disabled: {0}")]
    SearchDisabled(String),

    /// An invalid path was provided.
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Convenience alias for `Result<T, EmlError>`.
pub type Result<T> = std::result::Result<T, EmlError>;

impl EmlError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Parse` variant for an email file.
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors caused by calling the API incorrectly rather than by
    /// runtime conditions. These must surface to the caller, never be skipped.
    pub fn is_programmer_error(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }
}

impl From<std::io::Error> for EmlError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
