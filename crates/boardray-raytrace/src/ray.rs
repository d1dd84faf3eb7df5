//! Ray representation and basic ray-geometry tests.

use boardray_math::{Aabb3, Dir3, Point3, Rgb, Vec3};
use boardray_shapes::BoardItemId;

use crate::material::MaterialId;
use crate::primitive::ObjectId;

/// A ray in 3D space defined by origin and direction.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Unit direction of the ray.
    pub direction: Dir3,
    /// Precomputed reciprocal of direction components for fast AABB tests.
    inv_direction: Vec3,
    /// Sign of direction components (0 if positive, 1 if negative).
    sign: [usize; 3],
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        let dir = Dir3::new_normalize(direction);
        let inv = Vec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        let sign = [
            usize::from(inv.x < 0.0),
            usize::from(inv.y < 0.0),
            usize::from(inv.z < 0.0),
        ];
        Self {
            origin,
            direction: dir,
            inv_direction: inv,
            sign,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction.as_ref()
    }

    /// Test ray-AABB intersection using the slab method.
    ///
    /// Returns `Some((t_min, t_max))` if the ray intersects the box,
    /// where `t_min` and `t_max` are the entry and exit parameters.
    /// Returns `None` if no intersection.
    ///
    /// Handles infinite values correctly for axis-aligned rays.
    #[inline]
    pub fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = [aabb.min, aabb.max];

        let tx1 = (bounds[self.sign[0]].x - self.origin.x) * self.inv_direction.x;
        let tx2 = (bounds[1 - self.sign[0]].x - self.origin.x) * self.inv_direction.x;

        let mut t_min = tx1;
        let mut t_max = tx2;

        let ty1 = (bounds[self.sign[1]].y - self.origin.y) * self.inv_direction.y;
        let ty2 = (bounds[1 - self.sign[1]].y - self.origin.y) * self.inv_direction.y;

        t_min = t_min.max(ty1);
        t_max = t_max.min(ty2);

        let tz1 = (bounds[self.sign[2]].z - self.origin.z) * self.inv_direction.z;
        let tz2 = (bounds[1 - self.sign[2]].z - self.origin.z) * self.inv_direction.z;

        t_min = t_min.max(tz1);
        t_max = t_max.min(tz2);

        if t_max >= t_min && t_max >= 0.0 {
            Some((t_min.max(0.0), t_max))
        } else {
            None
        }
    }

    /// Slab test restricted to the parametric range `[t_lo, t_hi]`.
    #[inline]
    pub fn intersect_aabb_in(&self, aabb: &Aabb3, t_lo: f64, t_hi: f64) -> Option<(f64, f64)> {
        let (t0, t1) = self.intersect_aabb(aabb)?;
        let t0 = t0.max(t_lo);
        let t1 = t1.min(t_hi);
        (t0 <= t1).then_some((t0, t1))
    }
}

/// Nearest intersection of a ray with the scene.
#[derive(Debug, Clone, Copy)]
pub struct SceneHit {
    /// Parameter along the ray where intersection occurs.
    pub t: f64,
    /// 3D intersection point.
    pub point: Point3,
    /// Geometric normal at the intersection (pointing outward).
    pub normal: Vec3,
    /// Object that was hit.
    pub object: ObjectId,
    /// Material of the hit object.
    pub material: MaterialId,
    /// Linear color at the hit point.
    pub color: Rgb,
    /// Effective transparency, after any per-object override.
    pub transparency: f64,
    /// Board item the object was derived from.
    pub item: Option<BoardItemId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A 20 x 10 board core, 1.6 thick.
    fn slab() -> Aabb3 {
        Aabb3::new(Point3::new(0.0, 0.0, -0.8), Point3::new(20.0, 10.0, 0.8))
    }

    #[test]
    fn test_direction_is_normalized() {
        let ray = Ray::new(Point3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 3.0, -4.0));
        assert_relative_eq!(ray.direction.norm(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(ray.at(5.0), Point3::new(1.0, 5.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_straight_down_through_slab() {
        let ray = Ray::new(Point3::new(5.0, 5.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        let (t0, t1) = ray.intersect_aabb(&slab()).unwrap();
        assert_relative_eq!(t0, 9.2, epsilon = 1e-12);
        assert_relative_eq!(t1, 10.8, epsilon = 1e-12);
    }

    #[test]
    fn test_grazing_ray_above_slab_misses() {
        let ray = Ray::new(Point3::new(-5.0, 5.0, 1.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(ray.intersect_aabb(&slab()).is_none());
    }

    #[test]
    fn test_origin_inside_slab() {
        let ray = Ray::new(Point3::new(5.0, 5.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let (t0, t1) = ray.intersect_aabb(&slab()).unwrap();
        assert_eq!(t0, 0.0);
        assert_relative_eq!(t1, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_ray_aabb_flat_box() {
        // layer items on a plane have zero thickness in z
        let ray = Ray::new(Point3::new(0.5, 0.5, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let aabb = Aabb3::new(Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 1.0));
        let (t_min, t_max) = ray.intersect_aabb(&aabb).unwrap();
        assert_relative_eq!(t_min, 2.0, epsilon = 1e-12);
        assert_relative_eq!(t_max, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_range_clips_slab_interval() {
        let ray = Ray::new(Point3::new(5.0, 5.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray.intersect_aabb_in(&slab(), 0.0, 9.0).is_none());
        let (t0, t1) = ray.intersect_aabb_in(&slab(), 10.0, 100.0).unwrap();
        assert_relative_eq!(t0, 10.0, epsilon = 1e-12);
        assert_relative_eq!(t1, 10.8, epsilon = 1e-12);
    }

    #[test]
    fn test_slab_behind_origin() {
        let ray = Ray::new(Point3::new(5.0, 5.0, -3.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(ray.intersect_aabb(&slab()).is_none());
    }
}
