#![warn(missing_docs)]

//! Content-addressed cache of imported 3D component models.
//!
//! Component models are often shared by hundreds of footprints and are slow
//! to parse. The cache keeps each parsed model in memory for the lifetime of
//! the process and persists it to a blob named after the SHA-1 of the source
//! file, so later sessions skip the importer entirely.
//!
//! # Architecture
//!
//! - [`ModelCache`] - memory map, disk blobs, single-flight loads
//! - [`ModelImporter`] / [`ImporterRegistry`] - pluggable format readers
//! - [`SceneGraph`] - the hierarchy an importer produces (and what is persisted)
//! - [`RenderModel`] - flattened form handed to the scene assembler
//! - [`ContentHash`] - SHA-1 of the source bytes
//!
//! # Example
//!
//! ```ignore
//! use boardray_model_cache::ModelCache;
//!
//! let cache = ModelCache::default();
//! cache.set_cache_dir("/home/me/.cache/boardray/3d")?;
//!
//! if let Some(model) = cache.get_model("/libs/R_0603.stl") {
//!     println!("{} triangles", model.triangle_count());
//! }
//! ```

pub mod cache;
pub mod error;
mod hash;
pub mod importer;
pub mod scene;
pub mod stl;

pub use cache::{CacheEntry, CacheStats, ModelCache, CACHE_EXTENSION};
pub use error::{CacheError, ImportError, Result};
pub use hash::ContentHash;
pub use importer::{ImporterRegistry, ModelImporter};
pub use scene::{Mesh, MeshMaterial, RenderMesh, RenderModel, SceneGraph, SceneNode};
pub use stl::{parse_stl, StlImporter};
