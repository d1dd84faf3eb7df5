//! Traceable 3D primitives.
//!
//! Board geometry is made of [`Primitive::LayerItem`]s: a 2D shape from the
//! scene's [`ShapeArena`] extruded between two Z planes. Component models
//! are triangles, and hole walls in the board body are open vertical
//! cylinders.

use boardray_math::{Aabb2, Aabb3, Point2, Point3, Rgb, Vec2, Vec3};
use boardray_shapes::{BoardItemId, ShapeArena, ShapeId};

use crate::material::MaterialId;
use crate::ray::Ray;

/// Index of an object in a [`SceneContainer`](crate::SceneContainer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u32);

impl ObjectId {
    /// Position in the object list.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A triangle with per-vertex normals and optional per-vertex colors.
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    vertices: [Point3; 3],
    normals: [Vec3; 3],
    colors: Option<[Rgb; 3]>,
}

impl Triangle {
    /// A flat triangle. Returns `None` for degenerate input.
    pub fn new(v0: Point3, v1: Point3, v2: Point3) -> Option<Self> {
        let n = (v1 - v0).cross(&(v2 - v0)).try_normalize(1e-300)?;
        Some(Self {
            vertices: [v0, v1, v2],
            normals: [n; 3],
            colors: None,
        })
    }

    /// A triangle with smooth vertex normals. Zero normals fall back to the
    /// face normal.
    pub fn with_normals(v: [Point3; 3], n: [Vec3; 3]) -> Option<Self> {
        let mut tri = Self::new(v[0], v[1], v[2])?;
        let face = tri.normals[0];
        for (slot, given) in tri.normals.iter_mut().zip(n) {
            *slot = given.try_normalize(1e-12).unwrap_or(face);
        }
        Some(tri)
    }

    /// Attach per-vertex colors.
    pub fn set_vertex_colors(&mut self, colors: [Rgb; 3]) {
        self.colors = Some(colors);
    }

    /// Vertices.
    pub fn vertices(&self) -> &[Point3; 3] {
        &self.vertices
    }

    /// Vertex normals.
    pub fn normals(&self) -> &[Vec3; 3] {
        &self.normals
    }

    /// Per-vertex colors, if any.
    pub fn vertex_colors(&self) -> Option<&[Rgb; 3]> {
        self.colors.as_ref()
    }

    /// Möller-Trumbore. Returns `(t, u, v)`.
    fn intersect(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<(f64, f64, f64)> {
        let [v0, v1, v2] = &self.vertices;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let d = ray.direction.as_ref();
        let p = d.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < 1e-14 {
            return None;
        }
        let inv = 1.0 / det;
        let s = ray.origin - v0;
        let u = s.dot(&p) * inv;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = d.dot(&q) * inv;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(&q) * inv;
        (t >= t_min && t <= t_max).then_some((t, u, v))
    }

    fn bbox(&self) -> Aabb3 {
        let mut b = Aabb3::empty();
        for v in &self.vertices {
            b.include_point(v);
        }
        b
    }
}

/// Geometry of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// A 2D shape extruded between `z_min` and `z_max`.
    LayerItem {
        /// Shape in the scene's arena.
        shape: ShapeId,
        /// Bottom plane.
        z_min: f64,
        /// Top plane.
        z_max: f64,
    },
    /// Open vertical tube (no caps).
    VerticalCylinder {
        /// Axis position.
        center: Point2,
        /// Tube radius.
        radius: f64,
        /// Bottom end.
        z_min: f64,
        /// Top end.
        z_max: f64,
    },
    /// A mesh triangle.
    Triangle(Triangle),
}

/// Kind tag of a [`Primitive`], for statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    /// [`Primitive::LayerItem`] over a plain shape.
    LayerItem,
    /// [`Primitive::LayerItem`] over a CSG composite.
    CsgLayerItem,
    /// [`Primitive::VerticalCylinder`].
    VerticalCylinder,
    /// [`Primitive::Triangle`].
    Triangle,
}

/// A placed primitive with its appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Object3D {
    /// Geometry.
    pub primitive: Primitive,
    /// Material in the container's table.
    pub material: MaterialId,
    /// Linear base color (overridden by triangle vertex colors).
    pub color: Rgb,
    /// Replaces the material transparency when set.
    pub transparency: Option<f64>,
    /// Originating board item, for diagnostics.
    pub item: Option<BoardItemId>,
}

/// Raw primitive hit, before material lookup.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PrimitiveHit {
    pub t: f64,
    pub normal: Vec3,
    pub color: Rgb,
}

impl Object3D {
    /// An object with the given geometry and appearance.
    pub fn new(primitive: Primitive, material: MaterialId, color: Rgb) -> Self {
        Self {
            primitive,
            material,
            color,
            transparency: None,
            item: None,
        }
    }

    /// Tag with the originating board item.
    pub fn with_item(mut self, item: Option<BoardItemId>) -> Self {
        self.item = item;
        self
    }

    /// Override the material transparency for this object.
    pub fn with_transparency(mut self, transparency: f64) -> Self {
        self.transparency = Some(transparency.clamp(0.0, 1.0));
        self
    }

    /// Kind tag.
    pub fn kind(&self, arena: &ShapeArena) -> PrimitiveKind {
        match &self.primitive {
            Primitive::LayerItem { shape, .. } if arena.get(*shape).is_composite() => {
                PrimitiveKind::CsgLayerItem
            }
            Primitive::LayerItem { .. } => PrimitiveKind::LayerItem,
            Primitive::VerticalCylinder { .. } => PrimitiveKind::VerticalCylinder,
            Primitive::Triangle(_) => PrimitiveKind::Triangle,
        }
    }

    /// World-space bounds.
    pub fn bbox(&self, arena: &ShapeArena) -> Aabb3 {
        match &self.primitive {
            Primitive::LayerItem { shape, z_min, z_max } => {
                Aabb3::from_2d(arena.get(*shape).bbox(), *z_min, *z_max)
            }
            Primitive::VerticalCylinder {
                center,
                radius,
                z_min,
                z_max,
            } => Aabb3::from_2d(&Aabb2::around_circle(*center, *radius), *z_min, *z_max),
            Primitive::Triangle(tri) => tri.bbox(),
        }
    }

    pub(crate) fn intersect(
        &self,
        arena: &ShapeArena,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
    ) -> Option<PrimitiveHit> {
        let (t, normal) = match &self.primitive {
            Primitive::LayerItem { shape, z_min, z_max } => {
                let bounds = Aabb3::from_2d(arena.get(*shape).bbox(), *z_min, *z_max);
                let (lo, hi) = ray.intersect_aabb_in(&bounds, t_min, t_max)?;
                intersect_layer_item(arena, *shape, *z_min, *z_max, ray, lo, hi)?
            }
            Primitive::VerticalCylinder {
                center,
                radius,
                z_min,
                z_max,
            } => intersect_vertical_cylinder(center, *radius, *z_min, *z_max, ray, t_min, t_max)?,
            Primitive::Triangle(tri) => {
                let (t, u, v) = tri.intersect(ray, t_min, t_max)?;
                let w = 1.0 - u - v;
                let n = tri.normals[0] * w + tri.normals[1] * u + tri.normals[2] * v;
                let color = match &tri.colors {
                    Some(c) => c[0] * w + c[1] * u + c[2] * v,
                    None => self.color,
                };
                return Some(PrimitiveHit {
                    t,
                    normal: n.try_normalize(1e-12).unwrap_or(tri.normals[0]),
                    color,
                });
            }
        };
        Some(PrimitiveHit {
            t,
            normal,
            color: self.color,
        })
    }
}

fn intersect_layer_item(
    arena: &ShapeArena,
    shape: ShapeId,
    z_min: f64,
    z_max: f64,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
) -> Option<(f64, Vec3)> {
    let o = ray.origin;
    let d = ray.direction.as_ref();
    let mut best: Option<(f64, Vec3)> = None;
    let mut consider = |t: f64, n: Vec3| {
        if t >= t_min && t <= t_max && best.map_or(true, |(bt, _)| t < bt) {
            best = Some((t, n));
        }
    };

    // caps
    if d.z.abs() > 1e-12 {
        for (z, nz) in [(z_min, -1.0), (z_max, 1.0)] {
            let t = (z - o.z) / d.z;
            if t >= t_min && t <= t_max {
                let p = Point2::new(o.x + t * d.x, o.y + t * d.y);
                if arena.contains(shape, &p) {
                    consider(t, Vec3::new(0.0, 0.0, nz));
                }
            }
        }
    }

    // walls
    let d2 = Vec2::new(d.x, d.y);
    if d2.norm_squared() > 1e-24 {
        for h in arena.crossings(shape, &Point2::new(o.x, o.y), &d2) {
            let z = o.z + h.t * d.z;
            if z >= z_min && z <= z_max {
                consider(h.t, Vec3::new(h.normal.x, h.normal.y, 0.0));
            }
        }
    }
    best
}

fn intersect_vertical_cylinder(
    center: &Point2,
    radius: f64,
    z_min: f64,
    z_max: f64,
    ray: &Ray,
    t_min: f64,
    t_max: f64,
) -> Option<(f64, Vec3)> {
    let d = ray.direction.as_ref();
    let a = d.x * d.x + d.y * d.y;
    if a < 1e-24 {
        return None;
    }
    let ox = ray.origin.x - center.x;
    let oy = ray.origin.y - center.y;
    let b = 2.0 * (ox * d.x + oy * d.y);
    let c = ox * ox + oy * oy - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
        if t < t_min || t > t_max {
            continue;
        }
        let p = ray.at(t);
        if p.z < z_min || p.z > z_max {
            continue;
        }
        let mut n = Vec3::new(p.x - center.x, p.y - center.y, 0.0) / radius;
        // the tube is seen from either side
        if n.dot(d) > 0.0 {
            n = -n;
        }
        return Some((t, n));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use boardray_shapes::{CsgComposite, Shape2D};

    fn mat() -> MaterialId {
        MaterialId(0)
    }

    #[test]
    fn test_layer_item_cap_and_wall() {
        let mut arena = ShapeArena::new();
        let disc = arena.push(Shape2D::filled_circle(Point2::new(0.0, 0.0), 1.0, None).unwrap());
        let obj = Object3D::new(
            Primitive::LayerItem {
                shape: disc,
                z_min: 0.0,
                z_max: 0.5,
            },
            mat(),
            Rgb::gray(0.5),
        );

        let down = Ray::new(Point3::new(0.2, 0.1, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = obj.intersect(&arena, &down, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 4.5, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.z, 1.0);

        let side = Ray::new(Point3::new(-5.0, 0.0, 0.25), Vec3::new(1.0, 0.0, 0.0));
        let hit = obj.intersect(&arena, &side, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 4.0, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-12);

        let above = Ray::new(Point3::new(-5.0, 0.0, 0.75), Vec3::new(1.0, 0.0, 0.0));
        assert!(obj.intersect(&arena, &above, 0.0, f64::INFINITY).is_none());
        assert!(obj.intersect(&arena, &down, 0.0, 4.0).is_none());
    }

    #[test]
    fn test_layer_item_through_csg_hole() {
        let mut arena = ShapeArena::new();
        let board = arena.push(
            Shape2D::round_segment(Point2::new(-3.0, 0.0), Point2::new(3.0, 0.0), 4.0, None).unwrap(),
        );
        let hole = arena.push(Shape2D::filled_circle(Point2::new(0.0, 0.0), 0.5, None).unwrap());
        let csg = arena.add_composite(CsgComposite::new(board, vec![hole]), None);
        let obj = Object3D::new(
            Primitive::LayerItem {
                shape: csg,
                z_min: -0.8,
                z_max: 0.8,
            },
            mat(),
            Rgb::gray(0.5),
        );
        assert_eq!(obj.kind(&arena), PrimitiveKind::CsgLayerItem);

        // straight down the hole: nothing
        let down = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(obj.intersect(&arena, &down, 0.0, f64::INFINITY).is_none());

        // slanted into the hole hits its wall, facing the hole axis
        let slant = Ray::new(Point3::new(0.0, 0.0, 1.0), Vec3::new(1.0, 0.0, -1.0));
        let hit = obj.intersect(&arena, &slant, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t * std::f64::consts::FRAC_1_SQRT_2, 0.5, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-9);

        // off the hole: the top cap
        let cap = Ray::new(Point3::new(2.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = obj.intersect(&arena, &cap, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 4.2, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_cylinder_from_inside() {
        let arena = ShapeArena::new();
        let obj = Object3D::new(
            Primitive::VerticalCylinder {
                center: Point2::new(1.0, 1.0),
                radius: 0.5,
                z_min: -1.0,
                z_max: 1.0,
            },
            mat(),
            Rgb::gray(0.3),
        );
        let ray = Ray::new(Point3::new(1.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let hit = obj.intersect(&arena, &ray, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 0.5, epsilon = 1e-12);
        // facing back towards the axis
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-12);

        let outside = Ray::new(Point3::new(-2.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let hit = obj.intersect(&arena, &outside, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 2.5, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-12);

        let vertical = Ray::new(Point3::new(1.0, 1.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(obj.intersect(&arena, &vertical, 0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_triangle_barycentric_color() {
        let arena = ShapeArena::new();
        let mut tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
        .unwrap();
        tri.set_vertex_colors([Rgb::new(1.0, 0.0, 0.0), Rgb::new(0.0, 1.0, 0.0), Rgb::new(0.0, 0.0, 1.0)]);
        let obj = Object3D::new(Primitive::Triangle(tri), mat(), Rgb::BLACK).with_transparency(0.7);
        assert_eq!(obj.transparency, Some(0.7));

        let ray = Ray::new(Point3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = obj.intersect(&arena, &ray, 0.0, f64::INFINITY).unwrap();
        assert_relative_eq!(hit.t, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hit.color.r, 0.5, epsilon = 1e-12);
        assert_relative_eq!(hit.color.g, 0.25, epsilon = 1e-12);
        assert_relative_eq!(hit.color.b, 0.25, epsilon = 1e-12);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-12);

        let miss = Ray::new(Point3::new(0.8, 0.8, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(obj.intersect(&arena, &miss, 0.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_degenerate_triangle_rejected() {
        let p = Point3::new(1.0, 1.0, 1.0);
        assert!(Triangle::new(p, p, Point3::new(2.0, 2.0, 2.0)).is_none());
    }
}
