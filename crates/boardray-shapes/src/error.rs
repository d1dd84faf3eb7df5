//! Error types for shape construction.

use thiserror::Error;

/// Errors that can occur while building layer shapes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Circle or ring radius is not positive, or a ring is inverted.
    #[error("invalid radius: {0}")]
    InvalidRadius(f64),

    /// Segment width is not positive.
    #[error("invalid segment width: {0}")]
    InvalidWidth(f64),

    /// Polygon contour has too few points or no area.
    #[error("degenerate polygon: {0}")]
    DegeneratePolygon(String),

    /// Outline set has no usable contour.
    #[error("board outline is empty")]
    EmptyOutline,
}

/// Result type for shape operations.
pub type Result<T> = std::result::Result<T, ShapeError>;
