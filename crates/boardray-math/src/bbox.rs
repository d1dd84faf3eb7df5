//! Axis-aligned bounding boxes.
//!
//! Used as the broad phase everywhere: shape containers, CSG candidate
//! selection and the top-level scene hierarchy only compare boxes; exact
//! geometry is tested afterwards by the caller.

use serde::{Deserialize, Serialize};

use crate::{Point2, Point3, Vec2, Vec3};

/// Axis-aligned bounding box on a layer plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    /// Minimum corner.
    pub min: Point2,
    /// Maximum corner.
    pub max: Point2,
}

impl Aabb2 {
    /// Create a box from min and max corners.
    pub fn new(min: Point2, max: Point2) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point2::new(f64::INFINITY, f64::INFINITY),
            max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Box around a circle.
    pub fn around_circle(center: Point2, radius: f64) -> Self {
        Self {
            min: Point2::new(center.x - radius, center.y - radius),
            max: Point2::new(center.x + radius, center.y + radius),
        }
    }

    /// True if no point was ever included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    /// Expand this box to include another box.
    pub fn union(&mut self, other: &Aabb2) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test if two boxes overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Test if a point lies inside or on the box.
    pub fn contains(&self, p: &Point2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Test if `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &Aabb2) -> bool {
        self.contains(&other.min) && self.contains(&other.max)
    }

    /// Overlapping region of two boxes, if any.
    pub fn intersection(&self, other: &Aabb2) -> Option<Aabb2> {
        if !self.overlaps(other) {
            return None;
        }
        Some(Aabb2::new(
            Point2::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            Point2::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        ))
    }

    /// Expand the box by a margin in all directions.
    pub fn expand(&mut self, margin: f64) {
        self.min.x -= margin;
        self.min.y -= margin;
        self.max.x += margin;
        self.max.y += margin;
    }

    /// Size along each axis.
    pub fn extent(&self) -> Vec2 {
        self.max - self.min
    }

    /// Center point.
    pub fn center(&self) -> Point2 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Area of the box.
    pub fn area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let e = self.extent();
        e.x * e.y
    }

    /// Index of the longest axis (0 = x, 1 = y).
    pub fn dominant_axis(&self) -> usize {
        let e = self.extent();
        if e.y > e.x {
            1
        } else {
            0
        }
    }

    /// The four corners, counter-clockwise from `min`.
    pub fn corners(&self) -> [Point2; 4] {
        [
            self.min,
            Point2::new(self.max.x, self.min.y),
            self.max,
            Point2::new(self.min.x, self.max.y),
        ]
    }
}

impl Default for Aabb2 {
    fn default() -> Self {
        Self::empty()
    }
}

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Create a box from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Extrude a 2D box between two Z planes.
    pub fn from_2d(bbox: &Aabb2, z_min: f64, z_max: f64) -> Self {
        Self {
            min: Point3::new(bbox.min.x, bbox.min.y, z_min.min(z_max)),
            max: Point3::new(bbox.max.x, bbox.max.y, z_min.max(z_max)),
        }
    }

    /// True if no point was ever included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Expand this box to include another box.
    pub fn union(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.include_point(&other.min);
        self.include_point(&other.max);
    }

    /// Test if two boxes overlap (touching counts as overlap).
    pub fn overlaps(&self, other: &Aabb3) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Size along each axis.
    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    /// Center point.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Scale the box about its center.
    pub fn scale_about_center(&mut self, factor: f64) {
        let c = self.center();
        let half = self.extent() * (0.5 * factor);
        self.min = c - half;
        self.max = c + half;
    }

    /// Surface area (used by the SAH split policy).
    pub fn surface_area(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let d = self.extent();
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Index of the longest axis (0 = x, 1 = y, 2 = z).
    pub fn dominant_axis(&self) -> usize {
        let e = self.extent();
        if e.x >= e.y && e.x >= e.z {
            0
        } else if e.y >= e.z {
            1
        } else {
            2
        }
    }
}

impl Default for Aabb3 {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_union() {
        let mut b = Aabb2::empty();
        assert!(b.is_empty());
        b.union(&Aabb2::around_circle(Point2::new(1.0, 1.0), 1.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, Point2::new(0.0, 0.0));
        assert_eq!(b.max, Point2::new(2.0, 2.0));
    }

    #[test]
    fn test_touching_boxes_overlap() {
        let a = Aabb2::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        let b = Aabb2::new(Point2::new(1.0, 0.0), Point2::new(2.0, 1.0));
        let c = Aabb2::new(Point2::new(1.5, 0.0), Point2::new(2.0, 1.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_scale_about_center() {
        let mut b = Aabb3::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
        b.scale_about_center(3.0);
        assert_eq!(b.min, Point3::new(-3.0, -3.0, -3.0));
        assert_eq!(b.max, Point3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_from_2d_orders_z() {
        let b2 = Aabb2::new(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0));
        let b3 = Aabb3::from_2d(&b2, 2.0, -1.0);
        assert_eq!(b3.min.z, -1.0);
        assert_eq!(b3.max.z, 2.0);
    }
}
