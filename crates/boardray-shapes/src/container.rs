//! Frozen bounding-volume hierarchy over layer shapes.
//!
//! Shapes are collected in a [`Container2dBuilder`]; [`Container2dBuilder::build`]
//! consumes the builder, so a [`Container2d`] can only be queried after it
//! was built and its shape set can never change afterwards.

use boardray_math::{Aabb2, Point2};
use serde::{Deserialize, Serialize};

use crate::arena::{ShapeArena, ShapeId};

/// How a node's shapes are partitioned between its two children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Split at the midpoint of the centroid bounds on the dominant axis.
    #[default]
    Middle,
    /// Split into two halves of equal count on the dominant axis.
    Median,
    /// Surface area heuristic over 12 buckets.
    Sah,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    order: u32,
    bbox: Aabb2,
    centroid: Point2,
}

/// A hierarchy node - either a leaf holding shapes or an internal node.
#[derive(Debug, Clone)]
enum Node2 {
    Leaf {
        bbox: Aabb2,
        entries: Vec<u32>,
    },
    Internal {
        bbox: Aabb2,
        left: Box<Node2>,
        right: Box<Node2>,
    },
}

impl Node2 {
    fn bbox(&self) -> &Aabb2 {
        match self {
            Node2::Leaf { bbox, .. } | Node2::Internal { bbox, .. } => bbox,
        }
    }
}

/// Collects shapes before the hierarchy is built.
#[derive(Debug, Clone, Default)]
pub struct Container2dBuilder {
    ids: Vec<ShapeId>,
    entries: Vec<Entry>,
}

impl Container2dBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a shape from `arena`.
    pub fn add(&mut self, arena: &ShapeArena, id: ShapeId) {
        let bbox = *arena.get(id).bbox();
        self.entries.push(Entry {
            order: self.ids.len() as u32,
            bbox,
            centroid: bbox.center(),
        });
        self.ids.push(id);
    }

    /// Add several shapes in order.
    pub fn extend(&mut self, arena: &ShapeArena, ids: impl IntoIterator<Item = ShapeId>) {
        for id in ids {
            self.add(arena, id);
        }
    }

    /// Number of shapes collected so far.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if nothing was added.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Build the hierarchy. Leaves hold at most `leaf_size` shapes.
    pub fn build(mut self, leaf_size: usize, policy: SplitPolicy) -> Container2d {
        let leaf_size = leaf_size.max(1);
        let mut bbox = Aabb2::empty();
        for e in &self.entries {
            bbox.union(&e.bbox);
        }
        let bboxes = self.entries.iter().map(|e| e.bbox).collect();
        let root = if self.entries.is_empty() {
            None
        } else {
            Some(build_node(&mut self.entries, leaf_size, policy))
        };
        Container2d {
            ids: self.ids,
            bboxes,
            root,
            bbox,
        }
    }
}

/// A built, read-only shape hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Container2d {
    ids: Vec<ShapeId>,
    bboxes: Vec<Aabb2>,
    root: Option<Node2>,
    bbox: Aabb2,
}

impl Container2d {
    /// A container with no shapes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of shapes.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the container holds no shapes.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Union of all shape bounding boxes.
    pub fn bbox(&self) -> &Aabb2 {
        &self.bbox
    }

    /// Shapes in insertion order.
    pub fn ids(&self) -> &[ShapeId] {
        &self.ids
    }

    /// Shapes whose bounding box overlaps `rect`, in insertion order.
    ///
    /// Broad phase only; exact intersection is up to the caller.
    pub fn query_overlap(&self, rect: &Aabb2) -> Vec<ShapeId> {
        let mut found = Vec::new();
        if let Some(root) = &self.root {
            self.query_node(root, rect, &mut found);
        }
        found.sort_unstable();
        found.into_iter().map(|i| self.ids[i as usize]).collect()
    }

    /// True if any shape bounding box overlaps `rect`.
    pub fn overlaps_any(&self, rect: &Aabb2) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| self.any_in_node(root, rect))
    }

    fn query_node(&self, node: &Node2, rect: &Aabb2, found: &mut Vec<u32>) {
        if !node.bbox().overlaps(rect) {
            return;
        }
        match node {
            Node2::Leaf { entries, .. } => {
                found.extend(
                    entries
                        .iter()
                        .copied()
                        .filter(|&i| self.bboxes[i as usize].overlaps(rect)),
                );
            }
            Node2::Internal { left, right, .. } => {
                self.query_node(left, rect, found);
                self.query_node(right, rect, found);
            }
        }
    }

    fn any_in_node(&self, node: &Node2, rect: &Aabb2) -> bool {
        if !node.bbox().overlaps(rect) {
            return false;
        }
        match node {
            Node2::Leaf { entries, .. } => entries
                .iter()
                .any(|&i| self.bboxes[i as usize].overlaps(rect)),
            Node2::Internal { left, right, .. } => {
                self.any_in_node(left, rect) || self.any_in_node(right, rect)
            }
        }
    }

    /// Depth of the hierarchy (0 when empty).
    pub fn depth(&self) -> usize {
        fn depth_of(node: &Node2) -> usize {
            match node {
                Node2::Leaf { .. } => 1,
                Node2::Internal { left, right, .. } => 1 + depth_of(left).max(depth_of(right)),
            }
        }
        self.root.as_ref().map_or(0, depth_of)
    }
}

fn axis_value(p: &Point2, axis: usize) -> f64 {
    if axis == 0 {
        p.x
    } else {
        p.y
    }
}

/// Build a node recursively.
fn build_node(entries: &mut [Entry], leaf_size: usize, policy: SplitPolicy) -> Node2 {
    let mut bbox = Aabb2::empty();
    let mut centroids = Aabb2::empty();
    for e in entries.iter() {
        bbox.union(&e.bbox);
        centroids.include_point(&e.centroid);
    }

    if entries.len() <= leaf_size {
        return Node2::Leaf {
            bbox,
            entries: entries.iter().map(|e| e.order).collect(),
        };
    }

    let axis = centroids.dominant_axis();
    let mid = match policy {
        SplitPolicy::Middle => {
            let pos = axis_value(&centroids.center(), axis);
            partition(entries, axis, pos)
        }
        SplitPolicy::Median => 0,
        SplitPolicy::Sah => match find_sah_split(entries, &bbox, &centroids) {
            Some((axis, pos)) => partition(entries, axis, pos),
            None => 0,
        },
    };

    // Median fallback when the chosen split leaves one side empty
    let mid = if mid == 0 || mid == entries.len() {
        let half = entries.len() / 2;
        entries.select_nth_unstable_by(half, |a, b| {
            axis_value(&a.centroid, axis)
                .total_cmp(&axis_value(&b.centroid, axis))
                .then(a.order.cmp(&b.order))
        });
        half
    } else {
        mid
    };

    let (left, right) = entries.split_at_mut(mid);
    Node2::Internal {
        bbox,
        left: Box::new(build_node(left, leaf_size, policy)),
        right: Box::new(build_node(right, leaf_size, policy)),
    }
}

/// Partition entries by centroid along an axis.
fn partition(entries: &mut [Entry], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = entries.len();
    while left < right {
        if axis_value(&entries[left].centroid, axis) < pos {
            left += 1;
        } else {
            right -= 1;
            entries.swap(left, right);
        }
    }
    left
}

/// Half perimeter, the 2D analogue of surface area.
fn half_perimeter(b: &Aabb2) -> f64 {
    if b.is_empty() {
        return 0.0;
    }
    let e = b.extent();
    e.x + e.y
}

/// Find the best split axis and position using SAH.
fn find_sah_split(entries: &[Entry], bounds: &Aabb2, centroids: &Aabb2) -> Option<(usize, f64)> {
    const NUM_BUCKETS: usize = 12;

    let total = half_perimeter(bounds);
    if total <= 0.0 {
        return None;
    }
    let mut best: Option<(f64, usize, f64)> = None;

    for axis in 0..2 {
        let axis_min = axis_value(&centroids.min, axis);
        let axis_extent = axis_value(&centroids.max, axis) - axis_min;
        if axis_extent < 1e-10 {
            continue;
        }

        let mut counts = [0usize; NUM_BUCKETS];
        let mut boxes = [Aabb2::empty(); NUM_BUCKETS];
        for e in entries {
            let c = axis_value(&e.centroid, axis);
            let b = (((c - axis_min) / axis_extent) * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            counts[b] += 1;
            boxes[b].union(&e.bbox);
        }

        for split in 1..NUM_BUCKETS {
            let (mut lc, mut rc) = (0, 0);
            let (mut lb, mut rb) = (Aabb2::empty(), Aabb2::empty());
            for i in 0..split {
                lc += counts[i];
                lb.union(&boxes[i]);
            }
            for i in split..NUM_BUCKETS {
                rc += counts[i];
                rb.union(&boxes[i]);
            }
            if lc == 0 || rc == 0 {
                continue;
            }
            let cost = 0.125
                + half_perimeter(&lb) / total * lc as f64
                + half_perimeter(&rb) / total * rc as f64;
            if best.map_or(true, |(c, _, _)| cost < c) {
                let pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
                best = Some((cost, axis, pos));
            }
        }
    }
    best.map(|(_, axis, pos)| (axis, pos))
}
