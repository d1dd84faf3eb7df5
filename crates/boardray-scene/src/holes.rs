//! Plated barrels of vias and pad holes.

use boardray_math::{Point2, Rgb, Vec2};
use boardray_raytrace::{MaterialId, Object3D, Primitive, SceneContainer};
use boardray_shapes::{BoardItemId, Container2d, CsgComposite, Shape2D, ShapeId};
use tracing::warn;

use crate::board::{Board, Pad, PadAttribute, Via};
use crate::compositor::{subtract_candidates, Source};
use crate::layer::Side;
use crate::settings::SceneSettings;

/// Pad barrels stop this fraction of the copper thickness beyond the
/// copper planes, slightly short of the copper surface.
pub const PAD_BARREL_COPPER_FACTOR: f64 = 0.99;

/// Barrel counts of one reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BarrelStats {
    /// Barrels added.
    pub barrels: usize,
    /// Barrels stored as composites.
    pub composites: usize,
    /// Holes skipped because their geometry was invalid.
    pub skipped: usize,
}

fn barrel_color(settings: &SceneSettings, technical: Rgb) -> Rgb {
    if settings.flags.realistic_mode {
        settings.colors.copper.to_linear()
    } else {
        technical.to_linear()
    }
}

/// Add a copper ring extruded through the via's layer span for every via.
///
/// The barrel reaches one copper thickness beyond the board-facing planes
/// of its two layers. Vias naming a layer the board lacks are skipped.
pub fn add_via_barrels(
    scene: &mut SceneContainer,
    board: &Board,
    settings: &SceneSettings,
    copper: MaterialId,
) -> BarrelStats {
    let mut stats = BarrelStats::default();
    let cu = board.stackup().copper_thickness;
    let plating = board.stackup().hole_plating_thickness;

    for via in board.vias() {
        let [top_layer, bottom_layer] = via.layers;
        let (Some(top), Some(bottom)) = (board.layer_bottom(top_layer), board.layer_bottom(bottom_layer))
        else {
            warn!(item = ?via.item, %top_layer, %bottom_layer, "via spans a missing layer");
            stats.skipped += 1;
            continue;
        };
        let Some(shape) = via_ring(scene, via, plating) else {
            stats.skipped += 1;
            continue;
        };
        let z_top = top + cu;
        let z_bottom = bottom - cu;
        let color = barrel_color(settings, settings.colors.technical.via_color(via.via_type));
        scene.add(
            Object3D::new(
                Primitive::LayerItem {
                    shape,
                    z_min: z_top.min(z_bottom),
                    z_max: z_top.max(z_bottom),
                },
                copper,
                color,
            )
            .with_item(via.item.map(BoardItemId)),
        );
        stats.barrels += 1;
    }
    stats
}

fn via_ring(scene: &mut SceneContainer, via: &Via, plating: f64) -> Option<ShapeId> {
    let r = via.drill * 0.5;
    let center = Point2::new(via.position[0], via.position[1]);
    match Shape2D::ring(center, r, r + plating, via.item.map(BoardItemId)) {
        Ok(ring) => Some(scene.arena_mut().push(ring)),
        Err(e) => {
            warn!(item = ?via.item, error = %e, "skipping via barrel");
            None
        }
    }
}

/// Add a barrel for every drilled, plated pad.
///
/// Barrels that cross the board edge are trimmed by the anti-outline, and
/// other through-holes crossing a barrel are cut out of it.
pub fn add_pad_barrels(
    scene: &mut SceneContainer,
    board: &Board,
    settings: &SceneSettings,
    anti_outline: &Container2d,
    copper: MaterialId,
) -> BarrelStats {
    let mut stats = BarrelStats::default();
    let cu = board.stackup().copper_thickness;
    let z_top = board.copper_bottom(Side::Front) + cu * PAD_BARREL_COPPER_FACTOR;
    let z_bottom = board.copper_bottom(Side::Back) - cu * PAD_BARREL_COPPER_FACTOR;
    let (z_min, z_max) = (z_top.min(z_bottom), z_top.max(z_bottom));
    let color = barrel_color(settings, settings.colors.technical.pad_through_hole);
    let inner = &board.through_holes().inner;

    let pads = board
        .footprints()
        .iter()
        .flat_map(|fp| &fp.pads)
        .filter(|pad| pad.attribute != PadAttribute::Npth && pad.has_hole());

    for pad in pads {
        let Some(barrel) = pad_barrel(scene, pad, board.stackup().hole_plating_thickness, anti_outline)
        else {
            stats.skipped += 1;
            continue;
        };
        let item = pad.item.map(BoardItemId);

        let mut subtract = subtract_candidates(scene.arena(), barrel.shape, &[Source::Intersecting(inner)]);
        subtract.extend(barrel.anti_outline);
        let shape = if subtract.is_empty() {
            barrel.shape
        } else {
            stats.composites += 1;
            scene
                .arena_mut()
                .add_composite(CsgComposite::new(barrel.shape, subtract), item)
        };
        scene.add(
            Object3D::new(Primitive::LayerItem { shape, z_min, z_max }, copper, color).with_item(item),
        );
        stats.barrels += 1;
    }
    stats
}

struct PadBarrel {
    shape: ShapeId,
    anti_outline: Vec<ShapeId>,
}

fn pad_barrel(
    scene: &mut SceneContainer,
    pad: &Pad,
    plating: f64,
    anti_outline: &Container2d,
) -> Option<PadBarrel> {
    let item = pad.item.map(BoardItemId);
    let center = Point2::new(pad.position[0], pad.position[1]);
    let [dx, dy] = pad.drill;

    let built = if dx == dy {
        round_barrel(scene, center, dx * 0.5, plating, item, anti_outline)
    } else {
        oblong_barrel(scene, center, pad, plating, item, anti_outline)
    };
    match built {
        Ok(barrel) => Some(barrel),
        Err(e) => {
            warn!(item = ?pad.item, error = %e, "skipping pad barrel");
            None
        }
    }
}

fn round_barrel(
    scene: &mut SceneContainer,
    center: Point2,
    r: f64,
    plating: f64,
    item: Option<BoardItemId>,
    anti_outline: &Container2d,
) -> boardray_shapes::Result<PadBarrel> {
    let ring = Shape2D::ring(center, r, r + plating, item)?;
    let near_edge = anti_outline.query_overlap(ring.bbox());
    if near_edge.is_empty() {
        let shape = scene.arena_mut().push(ring);
        return Ok(PadBarrel {
            shape,
            anti_outline: near_edge,
        });
    }
    // near the edge the barrel is outer disc minus inner disc
    let outer = Shape2D::filled_circle(center, r + plating, item)?;
    let inner = Shape2D::filled_circle(center, r, item)?;
    let arena = scene.arena_mut();
    let outer = arena.push(outer);
    let inner = arena.push(inner);
    let shape = arena.add_composite(CsgComposite::new(outer, vec![inner]), item);
    Ok(PadBarrel {
        shape,
        anti_outline: near_edge,
    })
}

/// Offset from the pad center to each end of an oblong drill.
pub fn oblong_ends_offset(drill: [f64; 2], orientation_deg: f64) -> (Vec2, f64) {
    let [dx, dy] = drill;
    let (offset, width) = if dx > dy {
        (Vec2::new((dx - dy) * 0.5, 0.0), dy)
    } else {
        (Vec2::new(0.0, (dy - dx) * 0.5), dx)
    };
    let (s, c) = orientation_deg.to_radians().sin_cos();
    (Vec2::new(c * offset.x - s * offset.y, s * offset.x + c * offset.y), width)
}

fn oblong_barrel(
    scene: &mut SceneContainer,
    center: Point2,
    pad: &Pad,
    plating: f64,
    item: Option<BoardItemId>,
    anti_outline: &Container2d,
) -> boardray_shapes::Result<PadBarrel> {
    let (offset, width) = oblong_ends_offset(pad.drill, pad.orientation);
    let start = center + offset;
    let end = center - offset;
    let inner = Shape2D::round_segment(start, end, width, item)?;
    let outer = Shape2D::round_segment(start, end, width + 2.0 * plating, item)?;
    let arena = scene.arena_mut();
    let inner = arena.push(inner);
    let outer = arena.push(outer);
    let shape = arena.add_composite(CsgComposite::new(outer, vec![inner]), item);
    let near_edge = anti_outline.query_overlap(arena.get(shape).bbox());
    Ok(PadBarrel {
        shape,
        anti_outline: near_edge,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::two_layer_board;
    use crate::board::{Footprint, FootprintKind, ViaType};
    use crate::layer::LayerId;
    use approx::assert_relative_eq;
    use boardray_math::{Point3, Vec3};
    use boardray_raytrace::{Material, PrimitiveKind, Ray};

    fn copper(scene: &mut SceneContainer) -> MaterialId {
        scene.add_material(Material::blinn_phong(Rgb::gray(0.2), Rgb::BLACK, Rgb::BLACK, 0.0, 0.0, 0.0))
    }

    fn pad(position: [f64; 2], drill: [f64; 2], attribute: PadAttribute) -> Pad {
        Pad {
            position,
            drill,
            orientation: 0.0,
            attribute,
            item: Some(9),
        }
    }

    #[test]
    fn test_oblong_offset_rotates_ccw() {
        let (o, w) = oblong_ends_offset([2.0, 1.0], 0.0);
        assert_relative_eq!(o, Vec2::new(0.5, 0.0));
        assert_relative_eq!(w, 1.0);
        let (o, _) = oblong_ends_offset([2.0, 1.0], 90.0);
        assert_relative_eq!(o, Vec2::new(0.0, 0.5), epsilon = 1e-12);
        let (o, w) = oblong_ends_offset([1.0, 3.0], 0.0);
        assert_relative_eq!(o, Vec2::new(0.0, 1.0));
        assert_relative_eq!(w, 1.0);
    }

    #[test]
    fn test_via_barrels() {
        let mut desc = two_layer_board();
        desc.vias.push(Via {
            position: [5.0, 5.0],
            drill: 0.4,
            layers: [LayerId::FrontCopper, LayerId::BackCopper],
            via_type: ViaType::Through,
            item: Some(4),
        });
        desc.vias.push(Via {
            position: [6.0, 5.0],
            drill: 0.4,
            layers: [LayerId::FrontCopper, LayerId::InnerCopper(2)],
            via_type: ViaType::BlindBuried,
            item: Some(5),
        });
        let board = Board::from_description(desc).unwrap();
        let mut scene = SceneContainer::new(board.arena().clone());
        let cu = copper(&mut scene);
        let stats = add_via_barrels(&mut scene, &board, &SceneSettings::default(), cu);
        assert_eq!(stats.barrels, 1);
        assert_eq!(stats.skipped, 1);

        match &scene.objects()[0].primitive {
            Primitive::LayerItem { z_min, z_max, .. } => {
                assert_relative_eq!(*z_max, 0.835);
                assert_relative_eq!(*z_min, -0.835);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(scene.objects()[0].item, Some(BoardItemId(4)));
        assert_eq!(scene.objects()[0].color, SceneSettings::default().colors.copper.to_linear());
    }

    #[test]
    fn test_pad_barrels_skip_npth_and_smd() {
        let mut desc = two_layer_board();
        desc.footprints.push(Footprint {
            position: [10.0, 5.0],
            orientation: 0.0,
            flipped: false,
            kind: FootprintKind::ThroughHole,
            pads: vec![
                pad([10.0, 5.0], [1.0, 1.0], PadAttribute::Pth),
                pad([12.0, 5.0], [1.0, 1.0], PadAttribute::Npth),
                pad([14.0, 5.0], [0.0, 0.0], PadAttribute::Smd),
                pad([16.0, 5.0], [2.0, 1.0], PadAttribute::Pth),
            ],
            models: Vec::new(),
            item: None,
        });
        let board = Board::from_description(desc).unwrap();
        let mut scene = SceneContainer::new(board.arena().clone());
        let cu = copper(&mut scene);
        let stats = add_pad_barrels(&mut scene, &board, &SceneSettings::default(), &Container2d::empty(), cu);
        assert_eq!(stats.barrels, 2);
        let kinds = scene.count_by_kind();
        // round pad is a plain ring, oblong pad is a composite
        assert_eq!(kinds.get(&PrimitiveKind::LayerItem), Some(&1));
        assert_eq!(kinds.get(&PrimitiveKind::CsgLayerItem), Some(&1));

        scene.build_bvh(4, boardray_shapes::SplitPolicy::Middle);
        let sideways = Vec3::new(1.0, 0.0, 0.0);
        // a ray along the barrel axis plane hits the ring wall
        let hit = scene.intersect(&Ray::new(Point3::new(8.0, 5.0, 0.0), sideways), 0.0, 1.9);
        let hit = hit.expect("barrel wall");
        assert_relative_eq!(hit.point.x, 10.0 - 0.5 - 0.025, epsilon = 1e-9);
    }

    #[test]
    fn test_pad_barrel_technical_color() {
        let mut desc = two_layer_board();
        desc.footprints.push(Footprint {
            position: [10.0, 5.0],
            orientation: 0.0,
            flipped: false,
            kind: FootprintKind::ThroughHole,
            pads: vec![pad([10.0, 5.0], [1.0, 1.0], PadAttribute::Pth)],
            models: Vec::new(),
            item: None,
        });
        let board = Board::from_description(desc).unwrap();
        let mut settings = SceneSettings::default();
        settings.flags.realistic_mode = false;
        let mut scene = SceneContainer::new(board.arena().clone());
        let cu = copper(&mut scene);
        add_pad_barrels(&mut scene, &board, &settings, &Container2d::empty(), cu);
        assert_eq!(
            scene.objects()[0].color,
            settings.colors.technical.pad_through_hole.to_linear()
        );
    }
}
