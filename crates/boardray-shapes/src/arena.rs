//! Per-reload shape storage and CSG evaluation.
//!
//! All shapes of one scene generation live in a single [`ShapeArena`] and
//! refer to each other by [`ShapeId`]. Composites never own their operands,
//! so a hole shared by many layer items is stored once.

use boardray_math::{Aabb2, Point2, Vec2};

use crate::shape::{
    circle_contains, circle_crossings, circle_intersects_box, ring_contains, ring_crossings,
    ring_intersects_box, round_segment_contains, round_segment_crossings,
    round_segment_intersects_box, BoardItemId, Hit2, Shape2D, ShapeKind,
};

/// Index of a shape inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
    /// Position in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// "positive minus union(subtract)", optionally intersected with a clip
/// shape. Without a clip the composite is unbounded on that side (the
/// full-block case).
#[derive(Debug, Clone, PartialEq)]
pub struct CsgComposite {
    positive: ShapeId,
    subtract: Vec<ShapeId>,
    clip: Option<ShapeId>,
}

impl CsgComposite {
    /// Create a composite with no clip shape.
    pub fn new(positive: ShapeId, subtract: Vec<ShapeId>) -> Self {
        Self {
            positive,
            subtract,
            clip: None,
        }
    }

    /// Intersect the result with `clip`.
    pub fn with_clip(mut self, clip: ShapeId) -> Self {
        self.clip = Some(clip);
        self
    }

    /// The shape material is taken from.
    pub fn positive(&self) -> ShapeId {
        self.positive
    }

    /// Shapes removed from the positive shape.
    pub fn subtract(&self) -> &[ShapeId] {
        &self.subtract
    }

    /// Optional clip shape.
    pub fn clip(&self) -> Option<ShapeId> {
        self.clip
    }

    /// True when no clip shape restricts the result.
    pub fn is_full_block(&self) -> bool {
        self.clip.is_none()
    }
}

/// Owner of every shape in one scene generation.
#[derive(Debug, Clone, Default)]
pub struct ShapeArena {
    shapes: Vec<Shape2D>,
}

impl ShapeArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty arena with room for `capacity` shapes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            shapes: Vec::with_capacity(capacity),
        }
    }

    /// Store a shape.
    pub fn push(&mut self, shape: Shape2D) -> ShapeId {
        let id = ShapeId(self.shapes.len() as u32);
        self.shapes.push(shape);
        id
    }

    /// Store a composite. Its bounding box is that of the positive shape,
    /// narrowed by the clip shape when present.
    pub fn add_composite(
        &mut self,
        composite: CsgComposite,
        item: Option<BoardItemId>,
    ) -> ShapeId {
        let mut bbox = *self.get(composite.positive).bbox();
        if let Some(clip) = composite.clip {
            bbox = bbox
                .intersection(self.get(clip).bbox())
                .unwrap_or_else(Aabb2::empty);
        }
        self.push(Shape2D::composite(composite, bbox, item))
    }

    /// Look up a shape.
    ///
    /// # Panics
    ///
    /// Panics if `id` was issued by a different arena and is out of range.
    pub fn get(&self, id: ShapeId) -> &Shape2D {
        &self.shapes[id.index()]
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True if the arena holds no shapes.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// All shapes with their ids.
    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &Shape2D)> {
        self.shapes
            .iter()
            .enumerate()
            .map(|(i, s)| (ShapeId(i as u32), s))
    }

    /// Point containment, boundary inclusive.
    pub fn contains(&self, id: ShapeId, p: &Point2) -> bool {
        let shape = self.get(id);
        if !shape.bbox().contains(p) {
            return false;
        }
        match shape.kind() {
            ShapeKind::FilledCircle { center, radius } => circle_contains(center, *radius, p),
            ShapeKind::Ring {
                center,
                inner_radius,
                outer_radius,
            } => ring_contains(center, *inner_radius, *outer_radius, p),
            ShapeKind::RoundSegment { start, end, width } => {
                round_segment_contains(start, end, *width, p)
            }
            ShapeKind::Polygon(poly) => poly.contains(p),
            ShapeKind::Csg(c) => {
                self.contains(c.positive, p)
                    && !self.any_contains(&c.subtract, p, None)
                    && c.clip.map_or(true, |k| self.contains(k, p))
            }
        }
    }

    fn any_contains(&self, ids: &[ShapeId], p: &Point2, skip: Option<usize>) -> bool {
        ids.iter()
            .enumerate()
            .any(|(i, &id)| Some(i) != skip && self.contains(id, p))
    }

    /// Boundary crossings of the infinite line `o + t * d`, in no
    /// particular order. Normals point out of the shape's region.
    pub fn crossings(&self, id: ShapeId, o: &Point2, d: &Vec2) -> Vec<Hit2> {
        match self.get(id).kind() {
            ShapeKind::FilledCircle { center, radius } => circle_crossings(center, *radius, o, d),
            ShapeKind::Ring {
                center,
                inner_radius,
                outer_radius,
            } => ring_crossings(center, *inner_radius, *outer_radius, o, d),
            ShapeKind::RoundSegment { start, end, width } => {
                round_segment_crossings(start, end, *width, o, d)
            }
            ShapeKind::Polygon(poly) => poly.crossings(o, d),
            ShapeKind::Csg(c) => self.composite_crossings(c, o, d),
        }
    }

    fn composite_crossings(&self, c: &CsgComposite, o: &Point2, d: &Vec2) -> Vec<Hit2> {
        let at = |t: f64| o + d * t;
        let in_clip = |p: &Point2| c.clip.map_or(true, |k| self.contains(k, p));
        let mut hits = Vec::new();

        for h in self.crossings(c.positive, o, d) {
            let p = at(h.t);
            if !self.any_contains(&c.subtract, &p, None) && in_clip(&p) {
                hits.push(h);
            }
        }
        for (i, &sub) in c.subtract.iter().enumerate() {
            for h in self.crossings(sub, o, d) {
                let p = at(h.t);
                if self.contains(c.positive, &p)
                    && !self.any_contains(&c.subtract, &p, Some(i))
                    && in_clip(&p)
                {
                    // the wall of a cut faces into the cut
                    hits.push(Hit2 {
                        t: h.t,
                        normal: -h.normal,
                    });
                }
            }
        }
        if let Some(clip) = c.clip {
            for h in self.crossings(clip, o, d) {
                let p = at(h.t);
                if self.contains(c.positive, &p) && !self.any_contains(&c.subtract, &p, None) {
                    hits.push(h);
                }
            }
        }
        hits
    }

    /// Exact shape/rectangle intersection test.
    ///
    /// Composites answer conservatively from their bounding box.
    pub fn intersects_box(&self, id: ShapeId, rect: &Aabb2) -> bool {
        let shape = self.get(id);
        if !shape.bbox().overlaps(rect) {
            return false;
        }
        match shape.kind() {
            ShapeKind::FilledCircle { center, radius } => {
                circle_intersects_box(center, *radius, rect)
            }
            ShapeKind::Ring {
                center,
                inner_radius,
                outer_radius,
            } => ring_intersects_box(center, *inner_radius, *outer_radius, rect),
            ShapeKind::RoundSegment { start, end, width } => {
                round_segment_intersects_box(start, end, *width, rect)
            }
            ShapeKind::Polygon(poly) => poly.intersects_box(rect),
            ShapeKind::Csg(_) => true,
        }
    }

    /// Area estimate by midpoint sampling on a `samples x samples` grid over
    /// the bounding box.
    pub fn estimate_area(&self, id: ShapeId, samples: usize) -> f64 {
        let bbox = *self.get(id).bbox();
        if bbox.is_empty() || samples == 0 {
            return 0.0;
        }
        let e = bbox.extent();
        let (sx, sy) = (e.x / samples as f64, e.y / samples as f64);
        let mut inside = 0usize;
        for j in 0..samples {
            for i in 0..samples {
                let p = Point2::new(
                    bbox.min.x + (i as f64 + 0.5) * sx,
                    bbox.min.y + (j as f64 + 0.5) * sy,
                );
                if self.contains(id, &p) {
                    inside += 1;
                }
            }
        }
        inside as f64 * sx * sy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygon::{Contour, PolygonFragment};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    struct Lcg(u64);

    impl Lcg {
        fn next_f64(&mut self) -> f64 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 11) as f64 / (1u64 << 53) as f64
        }
    }

    fn board_square(arena: &mut ShapeArena) -> ShapeId {
        let rect = Aabb2::new(Point2::new(0.0, 0.0), Point2::new(10.0, 10.0));
        let poly = PolygonFragment::whole(vec![Contour::rectangle(&rect)]).unwrap();
        arena.push(Shape2D::polygon(poly, None))
    }

    fn circle(arena: &mut ShapeArena, x: f64, y: f64, r: f64) -> ShapeId {
        arena.push(Shape2D::filled_circle(Point2::new(x, y), r, None).unwrap())
    }

    #[test]
    fn test_composite_excludes_both_cuts() {
        let mut arena = ShapeArena::new();
        let a = board_square(&mut arena);
        let b1 = circle(&mut arena, 3.0, 3.0, 1.0);
        let b2 = circle(&mut arena, 7.0, 6.0, 1.5);
        let csg = arena.add_composite(CsgComposite::new(a, vec![b1, b2]), None);

        let mut rng = Lcg(7);
        for _ in 0..5000 {
            let p = Point2::new(rng.next_f64() * 12.0 - 1.0, rng.next_f64() * 12.0 - 1.0);
            let d1 = (p - Point2::new(3.0, 3.0)).norm();
            let d2 = (p - Point2::new(7.0, 6.0)).norm();
            // keep clear of boundaries
            if (d1 - 1.0).abs() < 1e-6 || (d2 - 1.5).abs() < 1e-6 {
                continue;
            }
            let in_a = (0.0..=10.0).contains(&p.x) && (0.0..=10.0).contains(&p.y);
            let expected = in_a && d1 > 1.0 && d2 > 1.5;
            assert_eq!(arena.contains(csg, &p), expected, "at {p:?}");
        }
    }

    #[test]
    fn test_subtraction_order_independent() {
        let mut arena = ShapeArena::new();
        let a = board_square(&mut arena);
        let b1 = circle(&mut arena, 3.0, 3.0, 1.0);
        let b2 = circle(&mut arena, 3.5, 3.0, 1.0);
        let fwd = arena.add_composite(CsgComposite::new(a, vec![b1, b2]), None);
        let rev = arena.add_composite(CsgComposite::new(a, vec![b2, b1]), None);

        let o = Point2::new(-1.0, 3.0);
        let d = Vec2::new(1.0, 0.0);
        let mut f: Vec<f64> = arena.crossings(fwd, &o, &d).iter().map(|h| h.t).collect();
        let mut r: Vec<f64> = arena.crossings(rev, &o, &d).iter().map(|h| h.t).collect();
        f.sort_by(f64::total_cmp);
        r.sort_by(f64::total_cmp);
        assert_eq!(f, r);
    }

    #[test]
    fn test_composite_crossings_flip_cut_normals() {
        let mut arena = ShapeArena::new();
        let a = board_square(&mut arena);
        let b = circle(&mut arena, 3.0, 3.0, 1.0);
        let csg = arena.add_composite(CsgComposite::new(a, vec![b]), None);

        let mut hits = arena.crossings(csg, &Point2::new(-1.0, 3.0), &Vec2::new(1.0, 0.0));
        hits.sort_by(|x, y| x.t.total_cmp(&y.t));
        assert_eq!(hits.len(), 4);
        assert_relative_eq!(hits[1].t, 3.0, epsilon = 1e-12);
        // entering the cut: the wall faces back toward +x
        assert_relative_eq!(hits[1].normal.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hits[2].t, 5.0, epsilon = 1e-12);
        assert_relative_eq!(hits[2].normal.x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nested_composite_ring() {
        let mut arena = ShapeArena::new();
        let outer = circle(&mut arena, 0.0, 0.0, 2.0);
        let inner = circle(&mut arena, 0.0, 0.0, 1.0);
        let ring = arena.add_composite(CsgComposite::new(outer, vec![inner]), None);
        let notch = circle(&mut arena, 2.0, 0.0, 0.5);
        let cut = arena.add_composite(CsgComposite::new(ring, vec![notch]), None);

        assert!(arena.contains(cut, &Point2::new(-1.5, 0.0)));
        assert!(!arena.contains(cut, &Point2::new(1.8, 0.0)));
        assert!(!arena.contains(cut, &Point2::new(0.0, 0.0)));
        assert_relative_eq!(
            arena.estimate_area(ring, 400),
            PI * 3.0,
            epsilon = 0.05
        );
    }

    #[test]
    fn test_clip_restricts_result() {
        let mut arena = ShapeArena::new();
        let a = board_square(&mut arena);
        let clip = circle(&mut arena, 0.0, 0.0, 5.0);
        let csg = arena.add_composite(CsgComposite::new(a, vec![]).with_clip(clip), None);
        match arena.get(csg).kind() {
            ShapeKind::Csg(c) => assert!(!c.is_full_block()),
            other => panic!("expected composite, got {other:?}"),
        }
        assert!(arena.contains(csg, &Point2::new(1.0, 1.0)));
        assert!(!arena.contains(csg, &Point2::new(9.0, 9.0)));
        assert_eq!(arena.get(csg).bbox().max, Point2::new(5.0, 5.0));
    }

    #[test]
    fn test_estimate_area_square_minus_circle() {
        let mut arena = ShapeArena::new();
        let a = board_square(&mut arena);
        let b = circle(&mut arena, 5.0, 5.0, 2.0);
        let csg = arena.add_composite(CsgComposite::new(a, vec![b]), None);
        assert_relative_eq!(arena.estimate_area(csg, 400), 100.0 - 4.0 * PI, epsilon = 0.1);
    }
}
