//! Error types for the refit library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using refit's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing, refactoring, or reporting.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library directory not found.
    #[error("Library not found: {path}")]
    LibraryNotFound { path: PathBuf },

    /// Syntax error in a source file. Fatal for the whole library.
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// A location that no longer exists in the snapshot.
    #[error("Invalid location {file}#{index}: {reason}")]
    InvalidLocation {
        file: String,
        index: usize,
        reason: String,
    },

    /// A location that names something other than a class declaration.
    #[error("Declaration {file}#{index} is not a class")]
    NotAClass { file: String, index: usize },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML rendering error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid-location error.
    pub fn invalid_location(file: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidLocation {
            file: file.into(),
            index,
            reason: reason.into(),
        }
    }

    /// Whether this error only means a location went stale after earlier
    /// structural changes. Callers skip the attempt and continue.
    pub fn is_stale_location(&self) -> bool {
        matches!(self, Self::InvalidLocation { .. })
    }
}
