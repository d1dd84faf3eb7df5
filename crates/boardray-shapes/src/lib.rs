#![warn(missing_docs)]

//! Layer-plane shapes for the boardray scene builder.
//!
//! Every board layer is described as a set of 2D shapes which are later
//! extruded between two Z planes. This crate holds those shapes and the
//! machinery to combine and index them.
//!
//! # Architecture
//!
//! - [`Shape2D`] / [`ShapeKind`] - closed set of shape variants
//! - [`ShapeArena`] - per-reload owner of all shapes, addressed by [`ShapeId`]
//! - [`CsgComposite`] - "positive minus subtract shapes" evaluated lazily
//! - [`polygon`] - contour normalization and outline fragmentation
//! - [`Container2d`] - frozen bounding-volume hierarchy over shapes
//!
//! # Example
//!
//! ```ignore
//! use boardray_shapes::{Container2dBuilder, Shape2D, ShapeArena, SplitPolicy};
//!
//! let mut arena = ShapeArena::new();
//! let pad = arena.push(Shape2D::filled_circle(Point2::new(1.0, 1.0), 0.5, None)?);
//!
//! let mut builder = Container2dBuilder::new();
//! builder.add(&arena, pad);
//! let container = builder.build(4, SplitPolicy::Median);
//!
//! let hits = container.query_overlap(&query_box);
//! ```

pub mod arena;
pub mod container;
pub mod error;
pub mod polygon;
pub mod shape;

pub use arena::{CsgComposite, ShapeArena, ShapeId};
pub use container::{Container2d, Container2dBuilder, SplitPolicy};
pub use error::{Result, ShapeError};
pub use polygon::{Contour, PolygonFragment};
pub use shape::{BoardItemId, Hit2, Shape2D, ShapeKind};
