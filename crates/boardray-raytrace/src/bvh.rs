//! Bounding Volume Hierarchy over scene objects.
//!
//! Objects are only seen through their bounding boxes; the container
//! supplies a callback that does the exact test for one object.

use boardray_math::{Aabb3, Point3};
use boardray_shapes::SplitPolicy;

use crate::ray::Ray;

/// A BVH node - either a leaf containing object indices or an internal node
/// with children.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node containing object indices.
    Leaf {
        /// Axis-aligned bounding box of this node.
        aabb: Aabb3,
        /// Objects contained in this leaf.
        objects: Vec<u32>,
    },
    /// Internal node with two children.
    Internal {
        /// Axis-aligned bounding box of this node.
        aabb: Aabb3,
        /// Left child node.
        left: Box<BvhNode>,
        /// Right child node.
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    /// Bounds of this node.
    pub fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } | BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Top-level acceleration structure for nearest-hit queries.
#[derive(Debug, Clone, Default)]
pub struct SceneBvh {
    root: Option<BvhNode>,
    len: usize,
}

type Item = (u32, Aabb3, Point3);

impl SceneBvh {
    /// Build over `bboxes`, indexed by position.
    pub fn build(bboxes: &[Aabb3], leaf_size: usize, policy: SplitPolicy) -> Self {
        let mut items: Vec<Item> = bboxes
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.is_empty())
            .map(|(i, b)| (i as u32, *b, b.center()))
            .collect();
        let len = items.len();
        let root = if items.is_empty() {
            None
        } else {
            Some(build_node(&mut items, leaf_size.max(1), policy))
        };
        Self { root, len }
    }

    /// Number of indexed objects.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get a reference to the root node, if any.
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Bounds of everything indexed.
    pub fn bbox(&self) -> Aabb3 {
        self.root.as_ref().map(|r| *r.aabb()).unwrap_or_default()
    }

    /// Maximum depth of the tree.
    pub fn depth(&self) -> usize {
        fn walk(node: &BvhNode) -> usize {
            match node {
                BvhNode::Leaf { .. } => 1,
                BvhNode::Internal { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        self.root.as_ref().map_or(0, walk)
    }

    /// Nearest hit in `[t_min, t_max]`.
    ///
    /// `test(object, t_min, t_max)` performs the exact test for one object
    /// and returns the hit parameter plus any payload.
    pub fn trace_closest<H>(
        &self,
        ray: &Ray,
        t_min: f64,
        t_max: f64,
        mut test: impl FnMut(u32, f64, f64) -> Option<(f64, H)>,
    ) -> Option<(f64, H)> {
        let mut closest = None;
        let mut closest_t = t_max;
        if let Some(root) = &self.root {
            trace_node_closest(ray, root, t_min, &mut closest_t, &mut closest, &mut test);
        }
        closest
    }
}

fn trace_node_closest<H>(
    ray: &Ray,
    node: &BvhNode,
    t_min: f64,
    closest_t: &mut f64,
    closest: &mut Option<(f64, H)>,
    test: &mut impl FnMut(u32, f64, f64) -> Option<(f64, H)>,
) {
    match node {
        BvhNode::Leaf { aabb, objects } => {
            if ray.intersect_aabb_in(aabb, t_min, *closest_t).is_none() {
                return;
            }
            for &obj in objects {
                if let Some((t, payload)) = test(obj, t_min, *closest_t) {
                    if t < *closest_t || closest.is_none() {
                        *closest_t = t;
                        *closest = Some((t, payload));
                    }
                }
            }
        }
        BvhNode::Internal { left, right, .. } => {
            // Test children in order of AABB distance
            let left_t = ray
                .intersect_aabb_in(left.aabb(), t_min, *closest_t)
                .map(|(t, _)| t);
            let right_t = ray
                .intersect_aabb_in(right.aabb(), t_min, *closest_t)
                .map(|(t, _)| t);

            match (left_t, right_t) {
                (Some(lt), Some(rt)) => {
                    let (near, far, far_t) = if lt <= rt {
                        (left, right, rt)
                    } else {
                        (right, left, lt)
                    };
                    trace_node_closest(ray, near, t_min, closest_t, closest, test);
                    // Early out if the far box starts beyond the current closest
                    if far_t <= *closest_t {
                        trace_node_closest(ray, far, t_min, closest_t, closest, test);
                    }
                }
                (Some(_), None) => trace_node_closest(ray, left, t_min, closest_t, closest, test),
                (None, Some(_)) => trace_node_closest(ray, right, t_min, closest_t, closest, test),
                (None, None) => {}
            }
        }
    }
}

fn bounds_of(items: &[Item]) -> Aabb3 {
    let mut bounds = Aabb3::empty();
    for (_, aabb, _) in items {
        bounds.union(aabb);
    }
    bounds
}

fn centroid_bounds(items: &[Item]) -> Aabb3 {
    let mut bounds = Aabb3::empty();
    for (_, _, c) in items {
        bounds.include_point(c);
    }
    bounds
}

/// Build a BVH node recursively.
fn build_node(items: &mut [Item], leaf_size: usize, policy: SplitPolicy) -> BvhNode {
    let bounds = bounds_of(items);

    // Base case: small number of objects -> leaf
    if items.len() <= leaf_size {
        return BvhNode::Leaf {
            aabb: bounds,
            objects: items.iter().map(|(id, _, _)| *id).collect(),
        };
    }

    let centroids = centroid_bounds(items);
    let axis = centroids.dominant_axis();
    let extent = centroids.extent()[axis];

    let mid = match policy {
        SplitPolicy::Middle => {
            let pos = centroids.min[axis] + extent * 0.5;
            partition(items, axis, pos)
        }
        SplitPolicy::Median => 0,
        SplitPolicy::Sah => {
            let (axis, pos) = find_best_split(items, &bounds, &centroids);
            partition(items, axis, pos)
        }
    };

    // Fallback if partition fails (and the median policy): split at the
    // median centroid along the dominant axis. Coincident centroids end up
    // here too and are halved by object index.
    let mid = if mid == 0 || mid == items.len() {
        let mid = items.len() / 2;
        items.select_nth_unstable_by(mid, |a, b| a.2[axis].total_cmp(&b.2[axis]).then(a.0.cmp(&b.0)));
        mid
    } else {
        mid
    };

    let (left_items, right_items) = items.split_at_mut(mid);

    BvhNode::Internal {
        aabb: bounds,
        left: Box::new(build_node(left_items, leaf_size, policy)),
        right: Box::new(build_node(right_items, leaf_size, policy)),
    }
}

/// Find the best split axis and position using SAH.
fn find_best_split(items: &[Item], bounds: &Aabb3, centroids: &Aabb3) -> (usize, f64) {
    const NUM_BUCKETS: usize = 12;

    let mut best_cost = f64::INFINITY;
    let mut best_axis = centroids.dominant_axis();
    let mut best_pos = centroids.center()[best_axis];
    let total_area = bounds.surface_area().max(1e-300);

    for axis in 0..3 {
        let axis_extent = centroids.extent()[axis];
        if axis_extent < 1e-10 {
            continue;
        }
        let axis_min = centroids.min[axis];

        let mut bucket_counts = [0usize; NUM_BUCKETS];
        let mut bucket_bounds = [Aabb3::empty(); NUM_BUCKETS];

        for (_, aabb, centroid) in items {
            let b = ((centroid[axis] - axis_min) / axis_extent * NUM_BUCKETS as f64) as usize;
            let b = b.min(NUM_BUCKETS - 1);
            bucket_counts[b] += 1;
            bucket_bounds[b].union(aabb);
        }

        // Sweep to find best split
        for split in 1..NUM_BUCKETS {
            let mut left_count = 0;
            let mut left_bounds = Aabb3::empty();
            for i in 0..split {
                left_count += bucket_counts[i];
                left_bounds.union(&bucket_bounds[i]);
            }

            let mut right_count = 0;
            let mut right_bounds = Aabb3::empty();
            for i in split..NUM_BUCKETS {
                right_count += bucket_counts[i];
                right_bounds.union(&bucket_bounds[i]);
            }

            if left_count == 0 || right_count == 0 {
                continue;
            }

            // SAH cost: traversal + P(left) * N_left + P(right) * N_right
            let cost = 0.125
                + left_bounds.surface_area() / total_area * left_count as f64
                + right_bounds.surface_area() / total_area * right_count as f64;

            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_pos = axis_min + (split as f64 / NUM_BUCKETS as f64) * axis_extent;
            }
        }
    }

    (best_axis, best_pos)
}

/// Partition objects by centroid along an axis.
fn partition(items: &mut [Item], axis: usize, pos: f64) -> usize {
    let mut left = 0;
    let mut right = items.len();

    while left < right {
        if items[left].2[axis] < pos {
            left += 1;
        } else {
            right -= 1;
            items.swap(left, right);
        }
    }

    left
}
