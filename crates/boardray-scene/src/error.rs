//! Error types for board loading and scene configuration.

use thiserror::Error;

/// Errors raised while preparing a board or its settings.
///
/// Nothing in here is raised by a reload itself: per-item problems during
/// assembly are logged and skipped.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Invalid scene settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings file could not be parsed.
    #[error("settings parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Board description could not be parsed.
    #[error("board description parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading an input file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecognized layer name.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),

    /// The board description is unusable as a whole.
    #[error("invalid board: {0}")]
    InvalidBoard(String),
}

/// Result type for scene operations.
pub type Result<T> = std::result::Result<T, SceneError>;
