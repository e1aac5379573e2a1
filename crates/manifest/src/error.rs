//! Error types for the manifest crate

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during manifest operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest document could not be parsed or serialized
    #[error("invalid manifest {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Manifest could not be written to disk
    #[error("failed to write manifest {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed while hashing
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Path does not exist
    #[error("path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    /// Failed to hash file
    #[error("failed to hash file {}: {source}", .path.display())]
    HashFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Hashing was stopped by the caller
    #[error("hashing cancelled")]
    Cancelled,

    /// Invalid path (e.g., empty manifest file name)
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, Error>;
