//! The traceable scene: objects, materials, lights and their BVH.

use std::collections::BTreeMap;

use boardray_math::Aabb3;
use boardray_shapes::{ShapeArena, SplitPolicy};
use tracing::debug;

use crate::bvh::SceneBvh;
use crate::light::Light;
use crate::material::{Material, MaterialId};
use crate::primitive::{Object3D, ObjectId, PrimitiveKind};
use crate::ray::{Ray, SceneHit};

/// Owner of everything a ray tracer needs for one scene generation.
///
/// Objects are added while the scene is assembled; [`build_bvh`] freezes
/// them into the top-level hierarchy. Until then [`intersect`] falls back
/// to testing every object.
///
/// [`build_bvh`]: SceneContainer::build_bvh
/// [`intersect`]: SceneContainer::intersect
#[derive(Debug, Default)]
pub struct SceneContainer {
    arena: ShapeArena,
    objects: Vec<Object3D>,
    materials: Vec<Material>,
    lights: Vec<Light>,
    bbox: Aabb3,
    bvh: Option<SceneBvh>,
}

impl SceneContainer {
    /// An empty scene whose layer items reference shapes in `arena`.
    pub fn new(arena: ShapeArena) -> Self {
        Self {
            arena,
            ..Self::default()
        }
    }

    /// The shape arena.
    pub fn arena(&self) -> &ShapeArena {
        &self.arena
    }

    /// Mutable access to the shape arena, for composites built during
    /// assembly.
    pub fn arena_mut(&mut self) -> &mut ShapeArena {
        &mut self.arena
    }

    /// Register a material.
    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        self.materials.push(material);
        id
    }

    /// Look up a material.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to a different container.
    pub fn material(&self, id: MaterialId) -> &Material {
        &self.materials[id.index()]
    }

    /// All materials.
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Add an object. Invalidates a previously built BVH.
    pub fn add(&mut self, object: Object3D) -> ObjectId {
        let id = ObjectId(self.objects.len() as u32);
        self.bbox.union(&object.bbox(&self.arena));
        self.objects.push(object);
        self.bvh = None;
        id
    }

    /// Look up an object.
    pub fn object(&self, id: ObjectId) -> &Object3D {
        &self.objects[id.index()]
    }

    /// All objects in insertion order.
    pub fn objects(&self) -> &[Object3D] {
        &self.objects
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if there are no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Bounds of all objects.
    pub fn bbox(&self) -> &Aabb3 {
        &self.bbox
    }

    /// Add a light.
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    /// All lights.
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Object count per primitive kind.
    pub fn count_by_kind(&self) -> BTreeMap<PrimitiveKind, usize> {
        let mut counts = BTreeMap::new();
        for obj in &self.objects {
            *counts.entry(obj.kind(&self.arena)).or_insert(0) += 1;
        }
        counts
    }

    /// Build the top-level BVH.
    pub fn build_bvh(&mut self, leaf_size: usize, policy: SplitPolicy) {
        let bboxes: Vec<Aabb3> = self.objects.iter().map(|o| o.bbox(&self.arena)).collect();
        let bvh = SceneBvh::build(&bboxes, leaf_size, policy);
        debug!(
            objects = bvh.len(),
            depth = bvh.depth(),
            leaf_size,
            ?policy,
            "built scene BVH"
        );
        self.bvh = Some(bvh);
    }

    /// The BVH, if built and still current.
    pub fn bvh(&self) -> Option<&SceneBvh> {
        self.bvh.as_ref()
    }

    /// Nearest intersection with `t` in `[t_min, t_max]`.
    pub fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<SceneHit> {
        let test = |i: u32, lo: f64, hi: f64| {
            self.objects[i as usize]
                .intersect(&self.arena, ray, lo, hi)
                .map(|h| (h.t, (i, h)))
        };
        let (_, (index, hit)) = match &self.bvh {
            Some(bvh) => bvh.trace_closest(ray, t_min, t_max, test)?,
            None => self.intersect_linear(t_min, t_max, test)?,
        };
        let object = &self.objects[index as usize];
        let material = self.material(object.material);
        Some(SceneHit {
            t: hit.t,
            point: ray.at(hit.t),
            normal: hit.normal,
            object: ObjectId(index),
            material: object.material,
            color: hit.color,
            transparency: object.transparency.unwrap_or(material.transparency),
            item: object.item,
        })
    }

    fn intersect_linear<H>(
        &self,
        t_min: f64,
        t_max: f64,
        test: impl Fn(u32, f64, f64) -> Option<(f64, H)>,
    ) -> Option<(f64, H)> {
        let mut closest: Option<(f64, H)> = None;
        let mut closest_t = t_max;
        for i in 0..self.objects.len() as u32 {
            if let Some((t, h)) = test(i, t_min, closest_t) {
                if t < closest_t || closest.is_none() {
                    closest_t = t;
                    closest = Some((t, h));
                }
            }
        }
        closest
    }
}
