//! Polygon contours and outline fragmentation.
//!
//! A board outline can be large and detailed, which makes it a poor
//! candidate for bounding-box culling. It is therefore split into grid
//! cells: each [`PolygonFragment`] shares the full contour set and is
//! restricted to one cell rectangle. No polygon clipping is performed;
//! the cell simply bounds every containment and crossing query.

use std::sync::Arc;

use boardray_math::{Aabb2, Point2, Vec2};
use tracing::debug;

use crate::error::{Result, ShapeError};
use crate::shape::{clip_segment, edge_normal, segment_crossing, Hit2};

/// Upper bound on grid cells per axis when fragmenting.
pub const MAX_CELLS_PER_AXIS: usize = 128;

/// A closed contour (the closing edge is implicit).
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    points: Vec<Point2>,
}

impl Contour {
    /// Create a contour, dropping a repeated closing point.
    pub fn new(mut points: Vec<Point2>) -> Result<Self> {
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return Err(ShapeError::DegeneratePolygon(format!(
                "{} points",
                points.len()
            )));
        }
        let contour = Self { points };
        if contour.signed_area().abs() < 1e-12 {
            return Err(ShapeError::DegeneratePolygon("zero area".into()));
        }
        Ok(contour)
    }

    /// Counter-clockwise rectangle.
    pub fn rectangle(rect: &Aabb2) -> Self {
        Self {
            points: rect.corners().to_vec(),
        }
    }

    /// Vertices in order.
    pub fn points(&self) -> &[Point2] {
        &self.points
    }

    /// Shoelace area, positive when counter-clockwise.
    pub fn signed_area(&self) -> f64 {
        self.edges()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            * 0.5
    }

    /// Bounding box of the vertices.
    pub fn bbox(&self) -> Aabb2 {
        let mut b = Aabb2::empty();
        for p in &self.points {
            b.include_point(p);
        }
        b
    }

    /// Directed edges, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (&Point2, &Point2)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (&self.points[i], &self.points[(i + 1) % n]))
    }

    fn reverse(&mut self) {
        self.points.reverse();
    }

    fn crossing_parity(&self, p: &Point2) -> bool {
        let pts = &self.points;
        let mut inside = false;
        let mut j = pts.len() - 1;
        for i in 0..pts.len() {
            let (pi, pj) = (pts[i], pts[j]);
            if (pi.y > p.y) != (pj.y > p.y)
                && p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}

/// Orient contours so the solid side is always on the left: contours at
/// even nesting depth become counter-clockwise, odd depth clockwise.
pub fn normalize_contours(mut contours: Vec<Contour>) -> Vec<Contour> {
    let depths: Vec<usize> = (0..contours.len())
        .map(|i| {
            let probe = contours[i].points[0];
            contours
                .iter()
                .enumerate()
                .filter(|(j, c)| *j != i && c.crossing_parity(&probe))
                .count()
        })
        .collect();
    for (contour, depth) in contours.iter_mut().zip(depths) {
        let ccw = contour.signed_area() > 0.0;
        if ccw != (depth % 2 == 0) {
            contour.reverse();
        }
    }
    contours
}

/// Contour set plus the rectangle this fragment is restricted to.
#[derive(Debug, Clone)]
pub struct PolygonFragment {
    contours: Arc<[Contour]>,
    clip: Option<Aabb2>,
    bbox: Aabb2,
}

impl PolygonFragment {
    /// The whole polygon set, unrestricted.
    pub fn whole(contours: Vec<Contour>) -> Result<Self> {
        if contours.is_empty() {
            return Err(ShapeError::EmptyOutline);
        }
        let contours = normalize_contours(contours);
        let mut bbox = Aabb2::empty();
        for c in &contours {
            bbox.union(&c.bbox());
        }
        Ok(Self {
            contours: contours.into(),
            clip: None,
            bbox,
        })
    }

    /// Restrict to a cell. Returns `None` when nothing of the region lies
    /// inside the cell.
    pub fn restricted_to(&self, cell: &Aabb2) -> Option<Self> {
        let cell = match &self.clip {
            Some(clip) => clip.intersection(cell)?,
            None => *cell,
        };
        // region touching only the cell border does not count
        let mut interior = cell;
        interior.expand(-1e-9 * cell.extent().max());
        let probe = self.clipped_bbox(&interior);
        if probe.is_empty() || probe.area() <= 0.0 {
            return None;
        }
        let bbox = self.clipped_bbox(&cell);
        Some(Self {
            contours: Arc::clone(&self.contours),
            clip: Some(cell),
            bbox,
        })
    }

    /// Tight bounding box of the region.
    pub fn bbox(&self) -> Aabb2 {
        self.bbox
    }

    /// Normalized contours.
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Restricting cell, if any.
    pub fn clip(&self) -> Option<&Aabb2> {
        self.clip.as_ref()
    }

    /// Exact area of the unrestricted contour set.
    pub fn contour_area(&self) -> f64 {
        self.contours.iter().map(Contour::signed_area).sum()
    }

    /// Point containment (even-odd over all contours, inside the cell).
    pub fn contains(&self, p: &Point2) -> bool {
        if let Some(clip) = &self.clip {
            if !clip.contains(p) {
                return false;
            }
        }
        self.contours_contain(p)
    }

    fn contours_contain(&self, p: &Point2) -> bool {
        self.contours
            .iter()
            .fold(false, |inside, c| inside ^ c.crossing_parity(p))
    }

    /// Boundary crossings of the line `o + t * d`.
    pub fn crossings(&self, o: &Point2, d: &Vec2) -> Vec<Hit2> {
        let mut hits = Vec::new();
        for contour in self.contours.iter() {
            for (p1, p2) in contour.edges() {
                if let Some((t, _)) = segment_crossing(o, d, p1, p2) {
                    let p = o + d * t;
                    if self.clip.map_or(true, |c| c.contains(&p)) {
                        hits.push(Hit2 {
                            t,
                            normal: edge_normal(p1, p2),
                        });
                    }
                }
            }
        }
        if let Some(clip) = &self.clip {
            let corners = clip.corners();
            for i in 0..4 {
                let (p1, p2) = (&corners[i], &corners[(i + 1) % 4]);
                if let Some((t, _)) = segment_crossing(o, d, p1, p2) {
                    if self.contours_contain(&(o + d * t)) {
                        hits.push(Hit2 {
                            t,
                            normal: edge_normal(p1, p2),
                        });
                    }
                }
            }
        }
        hits
    }

    /// Exact region/rectangle intersection test.
    pub fn intersects_box(&self, rect: &Aabb2) -> bool {
        let rect = match &self.clip {
            Some(clip) => match clip.intersection(rect) {
                Some(r) => r,
                None => return false,
            },
            None => *rect,
        };
        if !self.bbox.overlaps(&rect) {
            return false;
        }
        let edge_hit = self.contours.iter().any(|c| {
            c.edges()
                .any(|(p1, p2)| clip_segment(p1, p2, &rect).is_some())
        });
        edge_hit || self.contours_contain(&rect.center())
    }

    fn clipped_bbox(&self, cell: &Aabb2) -> Aabb2 {
        let mut b = Aabb2::empty();
        for contour in self.contours.iter() {
            for (p1, p2) in contour.edges() {
                if let Some((t0, t1)) = clip_segment(p1, p2, cell) {
                    let e = p2 - p1;
                    b.include_point(&(p1 + e * t0));
                    b.include_point(&(p1 + e * t1));
                }
            }
        }
        for corner in cell.corners() {
            if self.contours_contain(&corner) {
                b.include_point(&corner);
            }
        }
        b
    }
}

/// Split a contour set into grid fragments of roughly `cell_size`.
///
/// A non-positive cell size yields the whole set as one fragment.
pub fn fragment(contours: Vec<Contour>, cell_size: f64) -> Result<Vec<PolygonFragment>> {
    let whole = PolygonFragment::whole(contours)?;
    if cell_size.is_nan() || cell_size <= 0.0 {
        return Ok(vec![whole]);
    }
    let bbox = whole.bbox();
    let ext = bbox.extent();
    let cell_size = cell_size.max(ext.x.max(ext.y) / MAX_CELLS_PER_AXIS as f64);
    let nx = ((ext.x / cell_size).ceil() as usize).max(1);
    let ny = ((ext.y / cell_size).ceil() as usize).max(1);
    if nx == 1 && ny == 1 {
        return Ok(vec![whole]);
    }

    let mut out = Vec::new();
    for iy in 0..ny {
        for ix in 0..nx {
            let min = Point2::new(
                bbox.min.x + ix as f64 * cell_size,
                bbox.min.y + iy as f64 * cell_size,
            );
            let max = Point2::new(
                (min.x + cell_size).min(bbox.max.x),
                (min.y + cell_size).min(bbox.max.y),
            );
            if let Some(f) = whole.restricted_to(&Aabb2::new(min, max)) {
                out.push(f);
            }
        }
    }
    debug!(cells = nx * ny, fragments = out.len(), "fragmented polygon");
    Ok(out)
}

/// Contours of "bounding box minus outline": a frame rectangle around the
/// outline with every outline contour added, so even-odd containment
/// selects the area outside the board and inside its cut-outs.
pub fn anti_outline_contours(outline: &[Contour], margin: f64) -> Result<Vec<Contour>> {
    if outline.is_empty() {
        return Err(ShapeError::EmptyOutline);
    }
    let mut bbox = Aabb2::empty();
    for c in outline {
        bbox.union(&c.bbox());
    }
    bbox.expand(margin);
    let mut contours = Vec::with_capacity(outline.len() + 1);
    contours.push(Contour::rectangle(&bbox));
    contours.extend(outline.iter().cloned());
    Ok(contours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(x0: f64, y0: f64, size: f64) -> Contour {
        Contour::rectangle(&Aabb2::new(
            Point2::new(x0, y0),
            Point2::new(x0 + size, y0 + size),
        ))
    }

    fn clockwise(c: Contour) -> Contour {
        let mut pts = c.points().to_vec();
        pts.reverse();
        Contour::new(pts).unwrap()
    }

    #[test]
    fn test_degenerate_contour() {
        let err = Contour::new(vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)]).unwrap_err();
        assert!(matches!(err, ShapeError::DegeneratePolygon(_)));
        let collinear = vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(2.0, 0.0),
        ];
        assert!(Contour::new(collinear).is_err());
    }

    #[test]
    fn test_normalize_orients_holes() {
        // outer given clockwise, hole given counter-clockwise
        let outer = clockwise(square(0.0, 0.0, 10.0));
        let hole = square(4.0, 4.0, 2.0);
        let poly = PolygonFragment::whole(vec![outer, hole]).unwrap();
        assert!(poly.contours()[0].signed_area() > 0.0);
        assert!(poly.contours()[1].signed_area() < 0.0);
        assert_relative_eq!(poly.contour_area(), 96.0, epsilon = 1e-9);
        assert!(poly.contains(&Point2::new(1.0, 1.0)));
        assert!(!poly.contains(&Point2::new(5.0, 5.0)));
    }

    #[test]
    fn test_crossings_normals_point_out() {
        let poly = PolygonFragment::whole(vec![square(0.0, 0.0, 10.0), square(4.0, 4.0, 2.0)]).unwrap();
        let mut hits = poly.crossings(&Point2::new(-1.0, 5.0), &Vec2::new(1.0, 0.0));
        hits.sort_by(|a, b| a.t.total_cmp(&b.t));
        let ts: Vec<f64> = hits.iter().map(|h| h.t).collect();
        assert_eq!(ts.len(), 4);
        assert_relative_eq!(ts[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(ts[1], 5.0, epsilon = 1e-12);
        assert_relative_eq!(ts[2], 7.0, epsilon = 1e-12);
        assert_relative_eq!(ts[3], 11.0, epsilon = 1e-12);
        // entering the board faces -x, entering the hole faces +x
        assert_relative_eq!(hits[0].normal.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(hits[1].normal.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(hits[2].normal.x, -1.0, epsilon = 1e-12);
        assert_relative_eq!(hits[3].normal.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fragment_grid() {
        let frags = fragment(vec![square(0.0, 0.0, 10.0)], 4.0).unwrap();
        assert_eq!(frags.len(), 9);
        // cells partition the square
        let total: f64 = frags.iter().map(|f| f.bbox().area()).sum();
        assert_relative_eq!(total, 100.0, epsilon = 1e-9);
        let p = Point2::new(5.0, 5.0);
        assert_eq!(frags.iter().filter(|f| f.contains(&p)).count(), 1);
    }

    #[test]
    fn test_fragment_skips_empty_cells() {
        // L-shaped outline: the top-right cell is outside
        let l_shape = Contour::new(vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 5.0),
            Point2::new(5.0, 5.0),
            Point2::new(5.0, 10.0),
            Point2::new(0.0, 10.0),
        ])
        .unwrap();
        let frags = fragment(vec![l_shape], 5.0).unwrap();
        assert_eq!(frags.len(), 3);
    }

    #[test]
    fn test_no_split_without_cell_size() {
        let frags = fragment(vec![square(0.0, 0.0, 10.0)], 0.0).unwrap();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].clip().is_none());
    }

    #[test]
    fn test_anti_outline_fragments_hug_the_board_edge() {
        let outline = vec![square(0.0, 0.0, 10.0)];
        let contours = anti_outline_contours(&outline, 2.0).unwrap();
        let frags = fragment(contours, 2.0).unwrap();

        let outside = Point2::new(-1.0, 5.0);
        let inside = Point2::new(5.0, 5.0);
        assert!(frags.iter().any(|f| f.contains(&outside)));
        assert!(!frags.iter().any(|f| f.contains(&inside)));

        // no fragment reaches into the board interior
        let interior = Aabb2::new(Point2::new(0.5, 0.5), Point2::new(9.5, 9.5));
        assert!(!frags.iter().any(|f| f.bbox().overlaps(&interior)));
    }

    #[test]
    fn test_intersects_box() {
        let poly = PolygonFragment::whole(vec![square(0.0, 0.0, 10.0), square(2.0, 2.0, 6.0)]).unwrap();
        let in_hole = Aabb2::new(Point2::new(4.0, 4.0), Point2::new(5.0, 5.0));
        let on_rim = Aabb2::new(Point2::new(1.0, 1.0), Point2::new(3.0, 3.0));
        let in_solid = Aabb2::new(Point2::new(0.5, 0.5), Point2::new(1.0, 1.0));
        assert!(!poly.intersects_box(&in_hole));
        assert!(poly.intersects_box(&on_rim));
        assert!(poly.intersects_box(&in_solid));
    }
}
