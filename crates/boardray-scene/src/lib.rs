#![warn(missing_docs)]

//! Scene assembly for circuit-board ray tracing.
//!
//! Turns a prepared board (layer shapes, holes, vias, pads, footprints)
//! and a set of render settings into a [`Scene`]: extruded copper, paste,
//! silkscreen and mask layers with holes cut out, the board body, plated
//! barrels, footprint models, a backdrop and lights, behind a BVH.
//!
//! # Architecture
//!
//! - [`board`] - board description, validation and frozen shape sets
//! - [`settings`] - render flags, colors, lights and BVH tuning (TOML)
//! - [`materials`] - board materials and per-layer appearance
//! - [`compositor`] - extrusion passes with CSG subtraction
//! - [`environment`] - outline, board body, backdrop and lights
//! - [`layers`] - layer, plated-pad and solder-mask passes
//! - [`holes`] - via and pad barrels
//! - [`model_materials`] - component model material derivation and memo
//! - [`models`] - footprint model placement
//! - [`assembler`] - [`SceneAssembler`], reload orchestration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use boardray_model_cache::ModelCache;
//! use boardray_scene::{Board, LogReporter, SceneAssembler, SceneSettings};
//!
//! let assembler = SceneAssembler::new(Arc::new(ModelCache::default()));
//! assembler.set_board(Board::load("board.json")?);
//! assembler.set_settings(SceneSettings::load("render.toml")?)?;
//!
//! let scene = assembler.reload(Some(&LogReporter), false).unwrap();
//! println!("{} objects", scene.len());
//! ```

pub mod assembler;
pub mod board;
pub mod compositor;
pub mod environment;
pub mod error;
pub mod holes;
pub mod layer;
pub mod layers;
pub mod materials;
pub mod model_materials;
pub mod models;
pub mod reporter;
pub mod settings;

pub use assembler::{Scene, SceneAssembler, SceneStats};
pub use board::{Board, BoardDescription};
pub use error::{Result, SceneError};
pub use layer::{LayerId, Side};
pub use reporter::{CollectingReporter, LogReporter, Reporter};
pub use settings::{MaterialMode, SceneSettings};
