//! Extrusion of 2D shapes into layer items, with CSG subtraction.
//!
//! A pass takes a list of positive shapes already in the scene arena and a
//! list of subtract sources. Each positive gathers the source shapes that
//! touch it; if none do it becomes a plain [`Primitive::LayerItem`],
//! otherwise a [`CsgComposite`] is stored and extruded instead.
//!
//! Candidate gathering only reads the arena and runs in parallel. Arena
//! writes happen afterwards, in positive order, so the result is the same
//! as a sequential pass.

use boardray_math::Rgb;
use boardray_raytrace::{MaterialId, Object3D, Primitive, SceneContainer};
use boardray_shapes::{Container2d, CsgComposite, ShapeArena, ShapeId};
use rayon::prelude::*;

/// A set of shapes to subtract, and how candidates are tested.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Every shape whose bounding box overlaps the positive's.
    Overlapping(&'a Container2d),
    /// Shapes whose bounding box touches the positive shape itself.
    Intersecting(&'a Container2d),
}

impl Source<'_> {
    fn collect_into(&self, arena: &ShapeArena, positive: ShapeId, out: &mut Vec<ShapeId>) {
        let bbox = *arena.get(positive).bbox();
        match self {
            Source::Overlapping(container) => out.extend(container.query_overlap(&bbox)),
            Source::Intersecting(container) => out.extend(
                container
                    .query_overlap(&bbox)
                    .into_iter()
                    .filter(|&hole| arena.intersects_box(positive, arena.get(hole).bbox())),
            ),
        }
    }
}

/// Subtract candidates for one positive shape, in source order.
pub fn subtract_candidates(arena: &ShapeArena, positive: ShapeId, sources: &[Source<'_>]) -> Vec<ShapeId> {
    let mut out = Vec::new();
    for source in sources {
        source.collect_into(arena, positive, &mut out);
    }
    out
}

/// One extrusion pass.
#[derive(Debug, Clone)]
pub struct LayerPass<'a> {
    /// Shapes to extrude.
    pub positives: &'a [ShapeId],
    /// What to cut out of them.
    pub sources: Vec<Source<'a>>,
    /// Layer plane facing the board core.
    pub bottom: f64,
    /// Outer layer plane.
    pub top: f64,
    /// Grows the item outwards on both planes.
    pub offset: f64,
    /// Material of every item.
    pub material: MaterialId,
    /// Linear color of every item.
    pub color: Rgb,
}

impl LayerPass<'_> {
    /// Z range of the emitted items, lowest first.
    pub fn z_range(&self) -> (f64, f64) {
        let a = self.bottom - self.offset;
        let b = self.top + self.offset;
        (a.min(b), a.max(b))
    }
}

/// What a pass produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Items extruded from the positive shape itself.
    pub plain: usize,
    /// Items extruded from a new composite.
    pub composites: usize,
}

impl PassStats {
    /// Items of either kind.
    pub fn total(&self) -> usize {
        self.plain + self.composites
    }
}

impl std::ops::AddAssign for PassStats {
    fn add_assign(&mut self, rhs: Self) {
        self.plain += rhs.plain;
        self.composites += rhs.composites;
    }
}

/// Extrude every positive of `pass` into `scene`.
pub fn composite_pass(scene: &mut SceneContainer, pass: &LayerPass<'_>) -> PassStats {
    let plans: Vec<Vec<ShapeId>> = {
        let arena = scene.arena();
        pass.positives
            .par_iter()
            .map(|&positive| subtract_candidates(arena, positive, &pass.sources))
            .collect()
    };

    let (z_min, z_max) = pass.z_range();
    let mut stats = PassStats::default();
    for (&positive, subtract) in pass.positives.iter().zip(plans) {
        let item = scene.arena().get(positive).item();
        let shape = if subtract.is_empty() {
            stats.plain += 1;
            positive
        } else {
            stats.composites += 1;
            scene
                .arena_mut()
                .add_composite(CsgComposite::new(positive, subtract), item)
        };
        scene.add(
            Object3D::new(Primitive::LayerItem { shape, z_min, z_max }, pass.material, pass.color)
                .with_item(item),
        );
    }
    stats
}
