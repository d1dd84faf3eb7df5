//! Error types for model import and caching.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a format importer.
#[derive(Error, Debug)]
pub enum ImportError {
    /// I/O error reading the model file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No registered importer accepts the file.
    #[error("unsupported model format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The file was recognized but its contents are invalid.
    #[error("malformed mesh: {0}")]
    Malformed(String),
}

impl ImportError {
    /// Create a malformed-mesh error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Errors that can occur while loading through the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// I/O error on the source file or the cache directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Import of the source file failed.
    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    /// A cache blob could not be encoded or decoded.
    #[error("cache blob serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A cache blob exists but does not describe the requested source.
    #[error("stale cache blob: {0}")]
    Stale(String),

    /// The cache directory can only be chosen once.
    #[error("cache directory already set to {}", .0.display())]
    CacheDirAlreadySet(PathBuf),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
