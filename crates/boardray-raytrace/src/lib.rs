#![warn(missing_docs)]

//! Traceable scene for circuit-board renders.
//!
//! This crate holds what a ray tracer consumes: extruded layer items,
//! vertical hole cylinders and mesh triangles, their Blinn-Phong materials,
//! the lights, and a top-level bounding volume hierarchy answering
//! nearest-hit queries. It contains no integrator.
//!
//! # Architecture
//!
//! - [`Ray`] - Ray representation with origin and direction
//! - [`SceneHit`] - Nearest intersection with object, material and color
//! - [`Object3D`] / [`Primitive`] - closed set of traceable primitives
//! - [`Material`] / [`NormalPerturbation`] - surface parameters
//! - [`Light`] - camera, directional and point lights
//! - [`bvh`] - Bounding volume hierarchy for acceleration
//! - [`SceneContainer`] - owner of all of the above
//!
//! # Example
//!
//! ```ignore
//! use boardray_raytrace::{Ray, SceneContainer};
//!
//! let mut scene = SceneContainer::new(arena);
//! let copper = scene.add_material(copper_material);
//! scene.add(Object3D::new(Primitive::LayerItem { shape, z_min, z_max }, copper, color));
//! scene.build_bvh(8, SplitPolicy::Middle);
//!
//! let ray = Ray::new(Point3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
//! let hit = scene.intersect(&ray, 0.0, f64::INFINITY);
//! ```

mod ray;
pub mod bvh;
pub mod container;
pub mod light;
pub mod material;
pub mod primitive;

pub use bvh::SceneBvh;
pub use container::SceneContainer;
pub use light::Light;
pub use material::{Material, MaterialId, NormalPerturbation};
pub use primitive::{Object3D, ObjectId, Primitive, PrimitiveKind, Triangle};
pub use ray::{Ray, SceneHit};
