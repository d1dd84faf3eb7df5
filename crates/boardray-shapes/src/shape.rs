//! Shape variants on a layer plane.
//!
//! Shapes are immutable once created. Every shape carries its bounding box
//! and an optional [`BoardItemId`] pointing back at the board item it came
//! from; that id is only used for diagnostics and never owns anything.

use boardray_math::{Aabb2, Point2, Vec2};

use crate::arena::CsgComposite;
use crate::error::{Result, ShapeError};
use crate::polygon::PolygonFragment;

/// Opaque reference to the board item (pad, track, zone...) a shape was
/// derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoardItemId(pub u64);

/// A boundary crossing of a 2D line `o + t * d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit2 {
    /// Line parameter at the crossing.
    pub t: f64,
    /// Unit normal pointing out of the region at the crossing.
    pub normal: Vec2,
}

/// The closed set of shape kinds.
#[derive(Debug, Clone)]
pub enum ShapeKind {
    /// A solid disc.
    FilledCircle {
        /// Center of the disc.
        center: Point2,
        /// Radius of the disc.
        radius: f64,
    },
    /// An annulus between two concentric circles.
    Ring {
        /// Common center.
        center: Point2,
        /// Radius of the hole.
        inner_radius: f64,
        /// Radius of the outer edge.
        outer_radius: f64,
    },
    /// A segment with round caps (a stadium), as used for tracks.
    RoundSegment {
        /// First end point of the center line.
        start: Point2,
        /// Second end point of the center line.
        end: Point2,
        /// Full width of the segment.
        width: f64,
    },
    /// A polygon set, optionally restricted to a rectangular cell.
    Polygon(PolygonFragment),
    /// A positive shape minus a set of subtract shapes.
    Csg(CsgComposite),
}

/// A shape with its bounding box and originating board item.
#[derive(Debug, Clone)]
pub struct Shape2D {
    kind: ShapeKind,
    bbox: Aabb2,
    item: Option<BoardItemId>,
}

impl Shape2D {
    /// Create a filled circle.
    pub fn filled_circle(center: Point2, radius: f64, item: Option<BoardItemId>) -> Result<Self> {
        if radius.is_nan() || radius <= 0.0 {
            return Err(ShapeError::InvalidRadius(radius));
        }
        Ok(Self {
            kind: ShapeKind::FilledCircle { center, radius },
            bbox: Aabb2::around_circle(center, radius),
            item,
        })
    }

    /// Create a ring. `inner_radius` may be zero.
    pub fn ring(
        center: Point2,
        inner_radius: f64,
        outer_radius: f64,
        item: Option<BoardItemId>,
    ) -> Result<Self> {
        if inner_radius.is_nan() || inner_radius < 0.0 {
            return Err(ShapeError::InvalidRadius(inner_radius));
        }
        if outer_radius.is_nan() || outer_radius <= inner_radius {
            return Err(ShapeError::InvalidRadius(outer_radius));
        }
        Ok(Self {
            kind: ShapeKind::Ring {
                center,
                inner_radius,
                outer_radius,
            },
            bbox: Aabb2::around_circle(center, outer_radius),
            item,
        })
    }

    /// Create a round-capped segment of the given full width.
    pub fn round_segment(
        start: Point2,
        end: Point2,
        width: f64,
        item: Option<BoardItemId>,
    ) -> Result<Self> {
        if width.is_nan() || width <= 0.0 {
            return Err(ShapeError::InvalidWidth(width));
        }
        let r = width * 0.5;
        let mut bbox = Aabb2::around_circle(start, r);
        bbox.union(&Aabb2::around_circle(end, r));
        Ok(Self {
            kind: ShapeKind::RoundSegment { start, end, width },
            bbox,
            item,
        })
    }

    /// Wrap a polygon fragment.
    pub fn polygon(fragment: PolygonFragment, item: Option<BoardItemId>) -> Self {
        let bbox = fragment.bbox();
        Self {
            kind: ShapeKind::Polygon(fragment),
            bbox,
            item,
        }
    }

    pub(crate) fn composite(
        composite: CsgComposite,
        bbox: Aabb2,
        item: Option<BoardItemId>,
    ) -> Self {
        Self {
            kind: ShapeKind::Csg(composite),
            bbox,
            item,
        }
    }

    /// The shape variant.
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Bounding box.
    pub fn bbox(&self) -> &Aabb2 {
        &self.bbox
    }

    /// Board item this shape was derived from.
    pub fn item(&self) -> Option<BoardItemId> {
        self.item
    }

    /// Center of the bounding box.
    pub fn centroid(&self) -> Point2 {
        self.bbox.center()
    }

    /// True for composites.
    pub fn is_composite(&self) -> bool {
        matches!(self.kind, ShapeKind::Csg(_))
    }
}

#[inline]
pub(crate) fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Line/circle crossings as `(t, outward normal of the circle)`.
pub(crate) fn circle_crossings(center: &Point2, radius: f64, o: &Point2, d: &Vec2) -> Vec<Hit2> {
    let a = d.norm_squared();
    if a < 1e-300 {
        return Vec::new();
    }
    let oc = o - center;
    let b = 2.0 * d.dot(&oc);
    let c = oc.norm_squared() - radius * radius;
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sq = disc.sqrt();
    let mut hits = Vec::with_capacity(2);
    for t in [(-b - sq) / (2.0 * a), (-b + sq) / (2.0 * a)] {
        let p = o + d * t;
        hits.push(Hit2 {
            t,
            normal: (p - center) / radius,
        });
    }
    hits
}

/// Line/segment crossing. Returns `(t, s)` with `s` the segment parameter
/// in `[0, 1)`.
pub(crate) fn segment_crossing(
    o: &Point2,
    d: &Vec2,
    p1: &Point2,
    p2: &Point2,
) -> Option<(f64, f64)> {
    let e = p2 - p1;
    let denom = cross(d, &e);
    if denom.abs() < 1e-300 {
        return None;
    }
    let w = p1 - o;
    let t = cross(&w, &e) / denom;
    let s = cross(&w, d) / denom;
    if (0.0..1.0).contains(&s) {
        Some((t, s))
    } else {
        None
    }
}

/// Outward normal of a directed edge whose solid side is on the left.
pub(crate) fn edge_normal(p1: &Point2, p2: &Point2) -> Vec2 {
    let e = p2 - p1;
    let n = Vec2::new(e.y, -e.x);
    let len = n.norm();
    if len > 0.0 {
        n / len
    } else {
        n
    }
}

/// Clip a segment against a rectangle (Liang-Barsky).
///
/// Returns the parameter range of the visible part.
pub(crate) fn clip_segment(p0: &Point2, p1: &Point2, rect: &Aabb2) -> Option<(f64, f64)> {
    let d = p1 - p0;
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    let checks = [
        (-d.x, p0.x - rect.min.x),
        (d.x, rect.max.x - p0.x),
        (-d.y, p0.y - rect.min.y),
        (d.y, rect.max.y - p0.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((t0, t1))
}

/// Distance from a point to a rectangle (zero inside).
pub(crate) fn point_box_distance(p: &Point2, rect: &Aabb2) -> f64 {
    let dx = (rect.min.x - p.x).max(0.0).max(p.x - rect.max.x);
    let dy = (rect.min.y - p.y).max(0.0).max(p.y - rect.max.y);
    (dx * dx + dy * dy).sqrt()
}

/// Distance from a point to a segment.
pub(crate) fn point_segment_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < 1e-300 {
        return (p - a).norm();
    }
    let s = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * s)).norm()
}

pub(crate) fn circle_contains(center: &Point2, radius: f64, p: &Point2) -> bool {
    (p - center).norm_squared() <= radius * radius
}

pub(crate) fn ring_contains(center: &Point2, inner: f64, outer: f64, p: &Point2) -> bool {
    let d2 = (p - center).norm_squared();
    d2 >= inner * inner && d2 <= outer * outer
}

pub(crate) fn round_segment_contains(start: &Point2, end: &Point2, width: f64, p: &Point2) -> bool {
    point_segment_distance(p, start, end) <= width * 0.5
}

pub(crate) fn ring_crossings(
    center: &Point2,
    inner: f64,
    outer: f64,
    o: &Point2,
    d: &Vec2,
) -> Vec<Hit2> {
    let mut hits = circle_crossings(center, outer, o, d);
    if inner > 0.0 {
        hits.extend(circle_crossings(center, inner, o, d).into_iter().map(|h| Hit2 {
            t: h.t,
            normal: -h.normal,
        }));
    }
    hits
}

pub(crate) fn round_segment_crossings(
    start: &Point2,
    end: &Point2,
    width: f64,
    o: &Point2,
    d: &Vec2,
) -> Vec<Hit2> {
    let r = width * 0.5;
    let axis = end - start;
    let len = axis.norm();
    if len < 1e-12 {
        return circle_crossings(start, r, o, d);
    }
    let u = axis / len;
    let n = Vec2::new(-u.y, u.x);

    let mut hits = Vec::new();
    let dn = d.dot(&n);
    if dn.abs() > 1e-300 {
        let on = (o - start).dot(&n);
        for side in [1.0, -1.0] {
            let t = (side * r - on) / dn;
            let along = (o + d * t - start).dot(&u);
            if (0.0..=len).contains(&along) {
                hits.push(Hit2 { t, normal: n * side });
            }
        }
    }
    for h in circle_crossings(start, r, o, d) {
        if (o + d * h.t - start).dot(&u) < 0.0 {
            hits.push(h);
        }
    }
    for h in circle_crossings(end, r, o, d) {
        if (o + d * h.t - start).dot(&u) > len {
            hits.push(h);
        }
    }
    hits
}

pub(crate) fn circle_intersects_box(center: &Point2, radius: f64, rect: &Aabb2) -> bool {
    point_box_distance(center, rect) <= radius
}

pub(crate) fn ring_intersects_box(center: &Point2, inner: f64, outer: f64, rect: &Aabb2) -> bool {
    if !circle_intersects_box(center, outer, rect) {
        return false;
    }
    // a box swallowed by the hole misses the copper
    !rect.corners().iter().all(|c| (c - center).norm() < inner)
}

pub(crate) fn round_segment_intersects_box(
    start: &Point2,
    end: &Point2,
    width: f64,
    rect: &Aabb2,
) -> bool {
    if clip_segment(start, end, rect).is_some() {
        return true;
    }
    let r = width * 0.5;
    if point_box_distance(start, rect) <= r || point_box_distance(end, rect) <= r {
        return true;
    }
    rect.corners()
        .iter()
        .any(|c| point_segment_distance(c, start, end) <= r)
}
