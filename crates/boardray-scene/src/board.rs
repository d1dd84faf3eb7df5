//! Board geometry as handed over by the board adapter.
//!
//! The adapter (which knows the PCB file format) produces a
//! [`BoardDescription`]: plain serde data in scene units with the layer
//! stack, per-layer shapes, through-hole sets and footprints. [`Board`]
//! turns it into arena shapes indexed by frozen [`Container2d`]s, which is
//! what the scene assembler consumes.

use std::collections::BTreeMap;
use std::path::Path;

use boardray_math::{Aabb3, Point2};
use boardray_shapes::polygon::normalize_contours;
use boardray_shapes::{
    BoardItemId, Container2d, Container2dBuilder, Contour, PolygonFragment, Shape2D, ShapeArena,
    ShapeId, SplitPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, SceneError};
use crate::layer::{LayerId, Side};

/// Leaf size of the per-layer shape containers.
pub const LAYER_CONTAINER_LEAF_SIZE: usize = 4;

fn point(p: [f64; 2]) -> Point2 {
    Point2::new(p[0], p[1])
}

fn contours_from(raw: &[Vec<[f64; 2]>]) -> boardray_shapes::Result<Vec<Contour>> {
    raw.iter()
        .map(|c| Contour::new(c.iter().copied().map(point).collect()))
        .collect()
}

/// Geometry of one shape in a [`BoardDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeGeometry {
    /// Solid disc.
    Circle {
        /// Center.
        center: [f64; 2],
        /// Radius.
        radius: f64,
    },
    /// Annulus.
    Ring {
        /// Center.
        center: [f64; 2],
        /// Hole radius.
        inner_radius: f64,
        /// Outer radius.
        outer_radius: f64,
    },
    /// Round-capped segment.
    Segment {
        /// First end of the center line.
        start: [f64; 2],
        /// Second end of the center line.
        end: [f64; 2],
        /// Full width.
        width: f64,
    },
    /// Polygon set with even-odd holes.
    Polygon {
        /// Closed contours.
        contours: Vec<Vec<[f64; 2]>>,
    },
}

/// A shape and the board item it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDescription {
    /// Geometry.
    #[serde(flatten)]
    pub geometry: ShapeGeometry,
    /// Originating board item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<u64>,
}

impl ShapeDescription {
    /// A solid disc.
    pub fn circle(center: [f64; 2], radius: f64) -> Self {
        ShapeGeometry::Circle { center, radius }.into()
    }

    /// An annulus.
    pub fn ring(center: [f64; 2], inner_radius: f64, outer_radius: f64) -> Self {
        ShapeGeometry::Ring {
            center,
            inner_radius,
            outer_radius,
        }
        .into()
    }

    /// A round-capped segment.
    pub fn segment(start: [f64; 2], end: [f64; 2], width: f64) -> Self {
        ShapeGeometry::Segment { start, end, width }.into()
    }

    /// A polygon set.
    pub fn polygon(contours: Vec<Vec<[f64; 2]>>) -> Self {
        ShapeGeometry::Polygon { contours }.into()
    }

    /// Tag with a board item.
    pub fn with_item(mut self, item: u64) -> Self {
        self.item = Some(item);
        self
    }

    /// Validate and build the arena shape.
    pub fn to_shape(&self) -> boardray_shapes::Result<Shape2D> {
        let item = self.item.map(BoardItemId);
        match &self.geometry {
            ShapeGeometry::Circle { center, radius } => {
                Shape2D::filled_circle(point(*center), *radius, item)
            }
            ShapeGeometry::Ring {
                center,
                inner_radius,
                outer_radius,
            } => Shape2D::ring(point(*center), *inner_radius, *outer_radius, item),
            ShapeGeometry::Segment { start, end, width } => {
                Shape2D::round_segment(point(*start), point(*end), *width, item)
            }
            ShapeGeometry::Polygon { contours } => {
                let contours = normalize_contours(contours_from(contours)?);
                Ok(Shape2D::polygon(PolygonFragment::whole(contours)?, item))
            }
        }
    }
}

impl From<ShapeGeometry> for ShapeDescription {
    fn from(geometry: ShapeGeometry) -> Self {
        Self {
            geometry,
            item: None,
        }
    }
}

/// Z extent of a layer.
///
/// `bottom` is the surface facing the board core and `top` the one facing
/// away from it, so on back layers `top < bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerZ {
    /// Surface facing the board core.
    pub bottom: f64,
    /// Surface facing away from the core.
    pub top: f64,
}

/// One layer of a [`BoardDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescription {
    /// Which layer.
    pub layer: LayerId,
    /// Z extent.
    #[serde(flatten)]
    pub z: LayerZ,
    /// Shapes drawn on the layer.
    #[serde(default)]
    pub shapes: Vec<ShapeDescription>,
    /// Holes cut through the layer (vias and pads drilled through it).
    #[serde(default)]
    pub holes: Vec<ShapeDescription>,
}

/// Thicknesses and unit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stackup {
    /// Copper thickness in scene units.
    pub copper_thickness: f64,
    /// Barrel plating thickness in scene units.
    pub hole_plating_thickness: f64,
    /// Scene units per millimetre.
    #[serde(default = "default_units_per_mm")]
    pub units_per_mm: f64,
    /// Z of front footprints' model origin. Defaults to the top of the
    /// front paste (or copper) layer.
    #[serde(default)]
    pub model_z_front: Option<f64>,
    /// Z of flipped footprints' model origin.
    #[serde(default)]
    pub model_z_back: Option<f64>,
}

fn default_units_per_mm() -> f64 {
    1.0
}

fn default_scale() -> [f64; 3] {
    [1.0; 3]
}

fn default_opacity() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Through-hole shape sets, all in board-plane coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughHoleDescription {
    /// Hole outlines inflated by the plating.
    #[serde(default)]
    pub outer: Vec<ShapeDescription>,
    /// Hole outlines inflated to the outer edge of the annular ring.
    #[serde(default)]
    pub outer_ring: Vec<ShapeDescription>,
    /// Drill outlines, not inflated.
    #[serde(default)]
    pub inner: Vec<ShapeDescription>,
    /// Via holes only.
    #[serde(default)]
    pub vias_only: Vec<ShapeDescription>,
}

/// Pads on outer copper rendered with the plated finish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatedPadsDescription {
    /// Pads on the front copper.
    #[serde(default)]
    pub front: Vec<ShapeDescription>,
    /// Pads on the back copper.
    #[serde(default)]
    pub back: Vec<ShapeDescription>,
}

/// Via construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViaType {
    /// Drilled through every layer.
    #[default]
    Through,
    /// Spans a subset of inner layers.
    BlindBuried,
    /// Laser-drilled between adjacent layers.
    Micro,
}

/// A via.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    /// Center.
    pub position: [f64; 2],
    /// Drill diameter.
    pub drill: f64,
    /// Top and bottom copper layer of the span.
    pub layers: [LayerId; 2],
    /// Construction.
    #[serde(default)]
    pub via_type: ViaType,
    /// Board item.
    #[serde(default)]
    pub item: Option<u64>,
}

/// Pad fabrication type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadAttribute {
    /// Plated through hole.
    #[default]
    Pth,
    /// Surface mount.
    Smd,
    /// Edge connector.
    Conn,
    /// Non-plated hole.
    Npth,
}

/// A footprint pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    /// Center.
    pub position: [f64; 2],
    /// Drill size along the pad's local X and Y. Zero means no hole.
    #[serde(default)]
    pub drill: [f64; 2],
    /// Orientation in degrees, counter-clockwise.
    #[serde(default)]
    pub orientation: f64,
    /// Fabrication type.
    #[serde(default)]
    pub attribute: PadAttribute,
    /// Board item.
    #[serde(default)]
    pub item: Option<u64>,
}

impl Pad {
    /// True when the pad is drilled.
    pub fn has_hole(&self) -> bool {
        self.drill[0] > 0.0 && self.drill[1] > 0.0
    }
}

/// Footprint mounting class, used for model visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintKind {
    /// Through-hole component.
    #[default]
    ThroughHole,
    /// Surface-mount component.
    Smd,
    /// Neither (mechanical parts, logos).
    Virtual,
}

/// A 3D model attached to a footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPlacement {
    /// Model file.
    pub filename: String,
    /// Offset in model units.
    #[serde(default)]
    pub offset: [f64; 3],
    /// Rotation about X, Y, Z in degrees.
    #[serde(default)]
    pub rotation: [f64; 3],
    /// Scale per axis.
    #[serde(default = "default_scale")]
    pub scale: [f64; 3],
    /// Opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Whether the model is shown at all.
    #[serde(default = "default_true")]
    pub show: bool,
}

impl ModelPlacement {
    /// An opaque, unrotated model at the footprint origin.
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            offset: [0.0; 3],
            rotation: [0.0; 3],
            scale: default_scale(),
            opacity: 1.0,
            show: true,
        }
    }
}

/// A placed footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    /// Anchor position.
    pub position: [f64; 2],
    /// Orientation in degrees, counter-clockwise.
    #[serde(default)]
    pub orientation: f64,
    /// Mounted on the back face.
    #[serde(default)]
    pub flipped: bool,
    /// Mounting class.
    #[serde(default)]
    pub kind: FootprintKind,
    /// Pads.
    #[serde(default)]
    pub pads: Vec<Pad>,
    /// Attached models.
    #[serde(default)]
    pub models: Vec<ModelPlacement>,
    /// Board item.
    #[serde(default)]
    pub item: Option<u64>,
}

/// Drill statistics, used to size outline fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardStats {
    /// Number of vias.
    pub via_count: usize,
    /// Number of drilled pads.
    pub hole_count: usize,
    /// Median via drill diameter.
    pub median_via_diameter: f64,
    /// Median pad drill diameter.
    pub median_hole_diameter: f64,
}

impl BoardStats {
    /// Statistics of the vias and pads of a description.
    pub fn compute(vias: &[Via], footprints: &[Footprint]) -> Self {
        let via_drills: Vec<f64> = vias.iter().map(|v| v.drill).collect();
        let hole_drills: Vec<f64> = footprints
            .iter()
            .flat_map(|f| &f.pads)
            .filter(|p| p.has_hole())
            .map(|p| (p.drill[0] + p.drill[1]) * 0.5)
            .collect();
        Self {
            via_count: via_drills.len(),
            hole_count: hole_drills.len(),
            median_via_diameter: median(via_drills),
            median_hole_diameter: median(hole_drills),
        }
    }

    /// Grid cell used to split the board outline: 18 via diameters, else 8
    /// hole diameters, else 0 (no split).
    pub fn outline_cell_size(&self) -> f64 {
        if self.via_count > 0 {
            self.median_via_diameter * 18.0
        } else if self.hole_count > 0 {
            self.median_hole_diameter * 8.0
        } else {
            0.0
        }
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    values[values.len() / 2]
}

/// Everything the board adapter hands over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardDescription {
    /// Board outline contours; holes in the board are contours nested
    /// inside the outer boundary.
    pub outline: Vec<Vec<[f64; 2]>>,
    /// Thicknesses.
    pub stackup: Stackup,
    /// Layers with their Z extent and shapes.
    pub layers: Vec<LayerDescription>,
    /// Through-hole sets.
    #[serde(default)]
    pub through_holes: ThroughHoleDescription,
    /// Plated pad sets.
    #[serde(default)]
    pub plated_pads: PlatedPadsDescription,
    /// Vias.
    #[serde(default)]
    pub vias: Vec<Via>,
    /// Footprints.
    #[serde(default)]
    pub footprints: Vec<Footprint>,
    /// Drill statistics; computed from vias and pads when absent.
    #[serde(default)]
    pub stats: Option<BoardStats>,
}

impl BoardDescription {
    /// Parse from JSON.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read a JSON board file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

/// A layer's Z extent and frozen shape sets.
#[derive(Debug, Clone)]
pub struct BoardLayer {
    /// Z extent.
    pub z: LayerZ,
    /// Shapes on the layer.
    pub shapes: Container2d,
    /// Holes through the layer.
    pub holes: Container2d,
}

/// Frozen through-hole sets.
#[derive(Debug, Clone, Default)]
pub struct ThroughHoles {
    /// Hole plus plating.
    pub outer: Container2d,
    /// Hole plus annular ring.
    pub outer_ring: Container2d,
    /// Bare drill.
    pub inner: Container2d,
    /// Via holes.
    pub vias_only: Container2d,
}

/// A board ready for scene assembly.
#[derive(Debug, Clone)]
pub struct Board {
    arena: ShapeArena,
    layers: BTreeMap<LayerId, BoardLayer>,
    outline: Vec<Contour>,
    through_holes: ThroughHoles,
    plated_pads_front: Container2d,
    plated_pads_back: Container2d,
    vias: Vec<Via>,
    footprints: Vec<Footprint>,
    stackup: Stackup,
    stats: BoardStats,
    bbox: Aabb3,
    skipped: usize,
}

struct ShapeSink {
    arena: ShapeArena,
    skipped: usize,
}

impl ShapeSink {
    fn container(&mut self, what: &str, shapes: &[ShapeDescription]) -> Container2d {
        let mut builder = Container2dBuilder::new();
        for desc in shapes {
            match desc.to_shape() {
                Ok(shape) => {
                    let id: ShapeId = self.arena.push(shape);
                    builder.add(&self.arena, id);
                }
                Err(e) => {
                    warn!(set = what, item = ?desc.item, error = %e, "skipping invalid shape");
                    self.skipped += 1;
                }
            }
        }
        builder.build(LAYER_CONTAINER_LEAF_SIZE, SplitPolicy::Median)
    }
}

impl Board {
    /// Build arena shapes and containers from a description.
    ///
    /// Invalid individual shapes are skipped with a warning. The board as a
    /// whole is rejected when the outer copper layers are missing, a layer
    /// is listed twice, or the stackup is not finite and non-negative.
    pub fn from_description(desc: BoardDescription) -> Result<Self> {
        let st = &desc.stackup;
        for (name, v) in [
            ("copper_thickness", st.copper_thickness),
            ("hole_plating_thickness", st.hole_plating_thickness),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(SceneError::InvalidBoard(format!(
                    "{name} must be finite and non-negative"
                )));
            }
        }
        if !st.units_per_mm.is_finite() || st.units_per_mm <= 0.0 {
            return Err(SceneError::InvalidBoard(
                "units_per_mm must be positive".into(),
            ));
        }

        let mut sink = ShapeSink {
            arena: ShapeArena::new(),
            skipped: 0,
        };
        let mut bbox = Aabb3::empty();
        let mut layers = BTreeMap::new();
        for l in &desc.layers {
            let shapes = sink.container(&l.layer.name(), &l.shapes);
            let holes = sink.container(&l.layer.name(), &l.holes);
            let layer = BoardLayer {
                z: l.z,
                shapes,
                holes,
            };
            if layers.insert(l.layer, layer).is_some() {
                return Err(SceneError::InvalidBoard(format!(
                    "layer {} listed twice",
                    l.layer
                )));
            }
        }
        for required in [LayerId::FrontCopper, LayerId::BackCopper] {
            if !layers.contains_key(&required) {
                return Err(SceneError::InvalidBoard(format!("missing layer {required}")));
            }
        }

        let mut outline = Vec::with_capacity(desc.outline.len());
        for raw in &desc.outline {
            match Contour::new(raw.iter().copied().map(point).collect()) {
                Ok(c) => outline.push(c),
                Err(e) => {
                    warn!(error = %e, "skipping invalid outline contour");
                    sink.skipped += 1;
                }
            }
        }
        let outline = normalize_contours(outline);

        let through_holes = ThroughHoles {
            outer: sink.container("through_holes.outer", &desc.through_holes.outer),
            outer_ring: sink.container("through_holes.outer_ring", &desc.through_holes.outer_ring),
            inner: sink.container("through_holes.inner", &desc.through_holes.inner),
            vias_only: sink.container("through_holes.vias_only", &desc.through_holes.vias_only),
        };
        let plated_pads_front = sink.container("plated_pads.front", &desc.plated_pads.front);
        let plated_pads_back = sink.container("plated_pads.back", &desc.plated_pads.back);

        let (z_lo, z_hi) = layers.values().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, l| {
            (
                acc.0.min(l.z.bottom.min(l.z.top)),
                acc.1.max(l.z.bottom.max(l.z.top)),
            )
        });
        let mut plane = boardray_math::Aabb2::empty();
        for c in &outline {
            plane.union(&c.bbox());
        }
        if plane.is_empty() {
            for l in layers.values() {
                plane.union(l.shapes.bbox());
            }
        }
        if !plane.is_empty() {
            bbox = Aabb3::from_2d(&plane, z_lo, z_hi);
        }

        let stats = desc
            .stats
            .unwrap_or_else(|| BoardStats::compute(&desc.vias, &desc.footprints));

        debug!(
            layers = layers.len(),
            shapes = sink.arena.len(),
            skipped = sink.skipped,
            vias = desc.vias.len(),
            footprints = desc.footprints.len(),
            "board prepared"
        );

        Ok(Self {
            arena: sink.arena,
            layers,
            outline,
            through_holes,
            plated_pads_front,
            plated_pads_back,
            vias: desc.vias,
            footprints: desc.footprints,
            stackup: desc.stackup,
            stats,
            bbox,
            skipped: sink.skipped,
        })
    }

    /// Parse and build from a JSON board file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_description(BoardDescription::load(path)?)
    }

    /// Shapes of the board. Scene generations start from a copy of it.
    pub fn arena(&self) -> &ShapeArena {
        &self.arena
    }

    /// Layers in stacking order.
    pub fn layers(&self) -> &BTreeMap<LayerId, BoardLayer> {
        &self.layers
    }

    /// One layer.
    pub fn layer(&self, id: LayerId) -> Option<&BoardLayer> {
        self.layers.get(&id)
    }

    /// Board-facing surface of a layer.
    pub fn layer_bottom(&self, id: LayerId) -> Option<f64> {
        self.layer(id).map(|l| l.z.bottom)
    }

    /// Outward-facing surface of a layer.
    pub fn layer_top(&self, id: LayerId) -> Option<f64> {
        self.layer(id).map(|l| l.z.top)
    }

    /// Board-facing surface of an outer copper layer. Both outer copper
    /// layers always exist.
    pub fn copper_bottom(&self, side: Side) -> f64 {
        let id = match side {
            Side::Front => LayerId::FrontCopper,
            Side::Back => LayerId::BackCopper,
        };
        self.layer_bottom(id).unwrap_or_default()
    }

    /// Outline contours.
    pub fn outline(&self) -> &[Contour] {
        &self.outline
    }

    /// Through-hole sets.
    pub fn through_holes(&self) -> &ThroughHoles {
        &self.through_holes
    }

    /// Plated pads of one face.
    pub fn plated_pads(&self, side: Side) -> &Container2d {
        match side {
            Side::Front => &self.plated_pads_front,
            Side::Back => &self.plated_pads_back,
        }
    }

    /// Vias.
    pub fn vias(&self) -> &[Via] {
        &self.vias
    }

    /// Footprints.
    pub fn footprints(&self) -> &[Footprint] {
        &self.footprints
    }

    /// Thicknesses and unit scale.
    pub fn stackup(&self) -> &Stackup {
        &self.stackup
    }

    /// Drill statistics.
    pub fn stats(&self) -> &BoardStats {
        &self.stats
    }

    /// Board bounds: outline extent times the full layer stack.
    pub fn bbox(&self) -> &Aabb3 {
        &self.bbox
    }

    /// Shapes dropped while preparing the board.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Z of a footprint's model origin.
    pub fn model_z(&self, flipped: bool) -> f64 {
        let (explicit, paste, copper) = if flipped {
            (self.stackup.model_z_back, LayerId::BackPaste, LayerId::BackCopper)
        } else {
            (self.stackup.model_z_front, LayerId::FrontPaste, LayerId::FrontCopper)
        };
        explicit
            .or_else(|| self.layer_top(paste))
            .or_else(|| self.layer_top(copper))
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A 20 x 10 two-layer board, 1.6 thick with 0.035 copper.
    pub(crate) fn two_layer_board() -> BoardDescription {
        let z = |bottom: f64, top: f64| LayerZ { bottom, top };
        let layer = |layer, z, shapes| LayerDescription {
            layer,
            z,
            shapes,
            holes: Vec::new(),
        };
        BoardDescription {
            outline: vec![vec![[0.0, 0.0], [20.0, 0.0], [20.0, 10.0], [0.0, 10.0]]],
            stackup: Stackup {
                copper_thickness: 0.035,
                hole_plating_thickness: 0.025,
                units_per_mm: 1.0,
                model_z_front: None,
                model_z_back: None,
            },
            layers: vec![
                layer(
                    LayerId::FrontCopper,
                    z(0.8, 0.835),
                    vec![ShapeDescription::segment([2.0, 5.0], [18.0, 5.0], 0.5).with_item(1)],
                ),
                layer(LayerId::BackCopper, z(-0.8, -0.835), Vec::new()),
                layer(LayerId::FrontMask, z(0.835, 0.855), Vec::new()),
                layer(LayerId::BackMask, z(-0.835, -0.855), Vec::new()),
            ],
            through_holes: ThroughHoleDescription::default(),
            plated_pads: PlatedPadsDescription::default(),
            vias: Vec::new(),
            footprints: Vec::new(),
            stats: None,
        }
    }

    #[test]
    fn test_board_from_description() {
        let board = Board::from_description(two_layer_board()).unwrap();
        assert_eq!(board.layers().len(), 4);
        assert_eq!(board.layer(LayerId::FrontCopper).unwrap().shapes.len(), 1);
        assert_eq!(board.copper_bottom(Side::Front), 0.8);
        assert_eq!(board.copper_bottom(Side::Back), -0.8);
        assert_eq!(board.outline().len(), 1);
        assert_relative_eq!(board.bbox().min.z, -0.855);
        assert_relative_eq!(board.bbox().max.z, 0.855);
        assert_relative_eq!(board.bbox().max.x, 20.0);
        assert_eq!(board.model_z(false), 0.835);
        assert_eq!(board.model_z(true), -0.835);
        assert_eq!(board.skipped(), 0);
    }

    #[test]
    fn test_invalid_shapes_are_skipped() {
        let mut desc = two_layer_board();
        desc.layers[0]
            .shapes
            .push(ShapeDescription::circle([1.0, 1.0], -1.0));
        desc.layers[0]
            .shapes
            .push(ShapeDescription::polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]));
        let board = Board::from_description(desc).unwrap();
        assert_eq!(board.skipped(), 2);
        assert_eq!(board.layer(LayerId::FrontCopper).unwrap().shapes.len(), 1);
    }

    #[test]
    fn test_missing_copper_rejected() {
        let mut desc = two_layer_board();
        desc.layers.retain(|l| l.layer != LayerId::BackCopper);
        assert!(matches!(
            Board::from_description(desc),
            Err(SceneError::InvalidBoard(_))
        ));
    }

    #[test]
    fn test_duplicate_layer_rejected() {
        let mut desc = two_layer_board();
        let dup = desc.layers[2].clone();
        desc.layers.push(dup);
        assert!(Board::from_description(desc).is_err());
    }

    #[test]
    fn test_stats_and_cell_size() {
        let via = |drill| Via {
            position: [0.0, 0.0],
            drill,
            layers: [LayerId::FrontCopper, LayerId::BackCopper],
            via_type: ViaType::Through,
            item: None,
        };
        let pad = |drill: [f64; 2]| Pad {
            position: [0.0, 0.0],
            drill,
            orientation: 0.0,
            attribute: PadAttribute::Pth,
            item: None,
        };
        let fp = Footprint {
            position: [0.0, 0.0],
            orientation: 0.0,
            flipped: false,
            kind: FootprintKind::ThroughHole,
            pads: vec![pad([1.0, 1.0]), pad([0.0, 0.0]), pad([0.8, 1.2])],
            models: Vec::new(),
            item: None,
        };

        let stats = BoardStats::compute(&[via(0.3), via(0.4), via(0.3)], &[fp.clone()]);
        assert_eq!(stats.via_count, 3);
        assert_eq!(stats.hole_count, 2);
        assert_relative_eq!(stats.median_via_diameter, 0.3);
        assert_relative_eq!(stats.outline_cell_size(), 0.3 * 18.0);

        let holes_only = BoardStats::compute(&[], &[fp]);
        assert_relative_eq!(holes_only.outline_cell_size(), 8.0);
        assert_eq!(BoardStats::default().outline_cell_size(), 0.0);
    }

    #[test]
    fn test_json_round_trip_defaults() {
        let json = r#"{
            "outline": [[[0,0],[10,0],[10,10],[0,10]]],
            "stackup": { "copper_thickness": 0.035, "hole_plating_thickness": 0.025 },
            "layers": [
                { "layer": "F.Cu", "bottom": 0.8, "top": 0.835,
                  "shapes": [ { "kind": "circle", "center": [5,5], "radius": 1, "item": 7 } ] },
                { "layer": "B.Cu", "bottom": -0.8, "top": -0.835 }
            ],
            "footprints": [ { "position": [5,5], "models": [ { "filename": "r.stl" } ] } ]
        }"#;
        let desc = BoardDescription::from_json_str(json).unwrap();
        assert_eq!(desc.stackup.units_per_mm, 1.0);
        assert_eq!(desc.layers[0].shapes[0].item, Some(7));
        let model = &desc.footprints[0].models[0];
        assert_eq!(model.scale, [1.0; 3]);
        assert_eq!(model.opacity, 1.0);
        assert!(model.show);

        let board = Board::from_description(desc).unwrap();
        assert_eq!(board.stats().via_count, 0);
    }
}
