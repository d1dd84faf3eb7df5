//! Board body, backdrop and lights.
//!
//! The outline is split into fragments so each extruded piece has a tight
//! bounding box. The anti-outline (a frame around the board minus the
//! board itself) is what trims copper, barrels and the body at the board
//! edge and inside cut-outs.

use boardray_math::{next_float_down, next_float_up, spherical_to_cartesian, Aabb2, Point2, Point3, Rgb};
use boardray_raytrace::{Light, MaterialId, Object3D, Primitive, SceneContainer, Triangle};
use boardray_shapes::polygon::{anti_outline_contours, fragment};
use boardray_shapes::{Container2d, Container2dBuilder, Shape2D, ShapeId, ShapeKind, SplitPolicy};
use std::f64::consts::PI;
use tracing::{debug, warn};

use crate::board::{Board, LAYER_CONTAINER_LEAF_SIZE};
use crate::compositor::{composite_pass, LayerPass, PassStats, Source};
use crate::layer::Side;
use crate::settings::SceneSettings;

/// Size of the board's largest side in the viewer's normalized units.
/// Backdrop and point light distances are multiples of it.
pub const RANGE_SCALE_3D: f64 = 8.0;

/// Distance the anti-outline frame extends past the outline (mm).
pub const ANTI_OUTLINE_MARGIN_MM: f64 = 1.0;

/// The anti-outline is split into this many cells along its longer side.
pub const ANTI_OUTLINE_CELLS: f64 = 4.0;

/// Body cylinders are this fraction of their hole's radius, so the barrel
/// wall wins against the body wall.
pub const HOLE_CYLINDER_SHRINK: f64 = 0.999;

/// Outline fragments and the anti-outline of one reload.
#[derive(Debug, Clone, Default)]
pub struct OutlinePieces {
    /// Board outline fragments, in the scene arena.
    pub fragments: Vec<ShapeId>,
    /// Region outside the board, as a queryable container.
    pub anti_outline: Container2d,
}

impl OutlinePieces {
    /// No outline: nothing is trimmed at the edge.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Split the outline and build the anti-outline. An empty or degenerate
/// outline yields no pieces.
pub fn build_outline(scene: &mut SceneContainer, board: &Board) -> OutlinePieces {
    let outline = board.outline();
    if outline.is_empty() {
        return OutlinePieces::empty();
    }

    let cell = board.stats().outline_cell_size();
    let fragments = match fragment(outline.to_vec(), cell) {
        Ok(pieces) => pieces
            .into_iter()
            .map(|f| scene.arena_mut().push(Shape2D::polygon(f, None)))
            .collect(),
        Err(e) => {
            warn!(error = %e, "board outline could not be fragmented");
            Vec::new()
        }
    };

    let margin = ANTI_OUTLINE_MARGIN_MM * board.stackup().units_per_mm;
    let anti_outline = match anti_outline_contours(outline, margin).and_then(|contours| {
        let mut frame = Aabb2::empty();
        for c in &contours {
            frame.union(&c.bbox());
        }
        let ext = frame.extent();
        fragment(contours, ext.x.max(ext.y) / ANTI_OUTLINE_CELLS)
    }) {
        Ok(pieces) => {
            let mut builder = Container2dBuilder::new();
            for piece in pieces {
                let id = scene.arena_mut().push(Shape2D::polygon(piece, None));
                builder.add(scene.arena(), id);
            }
            builder.build(LAYER_CONTAINER_LEAF_SIZE, SplitPolicy::Median)
        }
        Err(e) => {
            warn!(error = %e, "anti-outline could not be built");
            Container2d::empty()
        }
    };

    debug!(
        fragments = fragments.len(),
        cell,
        anti_outline = anti_outline.len(),
        "board outline prepared"
    );
    OutlinePieces {
        fragments,
        anti_outline,
    }
}

/// What the board body added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyStats {
    /// Outline fragment slabs.
    pub slabs: PassStats,
    /// Hole wall cylinders.
    pub cylinders: usize,
}

/// Extrude the outline fragments between the two outer copper planes,
/// with through-holes and the anti-outline cut out, and line every round
/// through-hole that stays clear of the board edge with a cylinder.
pub fn add_board_body(
    scene: &mut SceneContainer,
    board: &Board,
    pieces: &OutlinePieces,
    epoxy: MaterialId,
    color: Rgb,
) -> BodyStats {
    let front = board.copper_bottom(Side::Front);
    let back = board.copper_bottom(Side::Back);
    let outer = &board.through_holes().outer;

    let slabs = composite_pass(
        scene,
        &LayerPass {
            positives: &pieces.fragments,
            sources: vec![
                Source::Intersecting(outer),
                Source::Overlapping(&pieces.anti_outline),
            ],
            bottom: front,
            top: back,
            offset: 0.0,
            material: epoxy,
            color,
        },
    );

    // fragment borders may run through a hole; the cylinder closes its wall
    let (lo, hi) = (front.min(back), front.max(back));
    let mut cylinders = Vec::new();
    for &hole in outer.ids() {
        let shape = scene.arena().get(hole);
        if pieces.anti_outline.overlaps_any(shape.bbox()) {
            continue;
        }
        if let ShapeKind::FilledCircle { .. } = shape.kind() {
            let radius = shape.bbox().extent().x * 0.5 * HOLE_CYLINDER_SHRINK;
            cylinders.push(Object3D::new(
                Primitive::VerticalCylinder {
                    center: shape.centroid(),
                    radius,
                    z_min: next_float_up(lo),
                    z_max: next_float_down(hi),
                },
                epoxy,
                color,
            ));
        }
    }
    let cylinder_count = cylinders.len();
    for cylinder in cylinders {
        scene.add(cylinder);
    }

    BodyStats {
        slabs,
        cylinders: cylinder_count,
    }
}

/// Length that maps onto [`RANGE_SCALE_3D`]: the board's longer side.
pub fn scene_range(board: &Board) -> f64 {
    let bbox = board.bbox();
    if bbox.is_empty() {
        return RANGE_SCALE_3D;
    }
    let e = bbox.extent();
    let side = e.x.max(e.y);
    if side > 0.0 {
        side
    } else {
        RANGE_SCALE_3D
    }
}

/// Add a floor under and a ceiling over everything already in the scene.
///
/// Returns the number of triangles added: zero when the board has no
/// bounds or the scene is empty.
pub fn add_backdrop(scene: &mut SceneContainer, board: &Board, floor: MaterialId, color: Rgb) -> usize {
    if board.bbox().is_empty() || scene.is_empty() {
        return 0;
    }
    let mut board_box = *board.bbox();
    board_box.scale_about_center(3.0);
    let mut content_box = *scene.bbox();
    content_box.scale_about_center(1.3);
    let center = content_box.center();

    // the viewer spans 4 board sizes either way of the content
    let half = 4.0 * scene_range(board);
    let min_z = content_box.min.z.min(board_box.min.z);
    let max_z = content_box.max.z.max(board_box.max.z);

    let corner = |x: f64, y: f64, z: f64| Point3::new(center.x + x, center.y + y, z);
    let v1 = corner(-half, -half, min_z);
    let v3 = corner(half, half, min_z);
    let v2 = Point3::new(v1.x, v3.y, min_z);
    let v4 = Point3::new(v3.x, v1.y, min_z);
    let v5 = Point3::new(v1.x, v1.y, max_z);
    let v6 = Point3::new(v2.x, v2.y, max_z);
    let v7 = Point3::new(v3.x, v3.y, max_z);
    let v8 = Point3::new(v4.x, v4.y, max_z);

    let mut added = 0;
    for [a, b, c] in [[v1, v2, v3], [v3, v4, v1], [v7, v6, v5], [v5, v8, v7]] {
        if let Some(tri) = Triangle::new(a, b, c) {
            scene.add(Object3D::new(Primitive::Triangle(tri), floor, color));
            added += 1;
        }
    }
    added
}

/// Add the camera, top, bottom and directional lights. Lights whose color
/// is below one 8-bit step in every channel are left out.
///
/// Returns the number of lights added.
pub fn add_lights(scene: &mut SceneContainer, board: &Board, settings: &SceneSettings) -> usize {
    let lights = &settings.lights;
    let mut added = Vec::new();

    if !lights.camera.is_near_black() {
        added.push(Light::Camera {
            color: lights.camera,
        });
    }

    let center = board.bbox().center();
    let height = 2.0 * scene_range(board);
    let center = if board.bbox().is_empty() {
        Point2::origin()
    } else {
        Point2::new(center.x, center.y)
    };
    if !lights.top.is_near_black() {
        added.push(Light::Point {
            position: Point3::new(center.x, center.y, height),
            color: lights.top,
        });
    }
    if !lights.bottom.is_near_black() {
        added.push(Light::Point {
            position: Point3::new(center.x, center.y, -height),
            color: lights.bottom,
        });
    }

    for light in &lights.directional {
        if light.color.is_near_black() {
            continue;
        }
        // the spherical angles give the direction the light travels
        let (theta, phi) = light.spherical();
        added.push(Light::Directional {
            direction: -spherical_to_cartesian(PI * theta, PI * phi),
            color: light.color,
        });
    }

    let count = added.len();
    for light in added {
        scene.add_light(light);
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::two_layer_board;
    use crate::board::ShapeDescription;
    use crate::settings::DirectionalLightSettings;
    use approx::assert_relative_eq;
    use boardray_math::Vec3;
    use boardray_raytrace::{Material, PrimitiveKind, Ray};

    fn material(scene: &mut SceneContainer) -> MaterialId {
        scene.add_material(Material::blinn_phong(Rgb::gray(0.2), Rgb::BLACK, Rgb::BLACK, 0.0, 0.0, 0.0))
    }

    fn board_with_holes(holes: &[([f64; 2], f64)]) -> Board {
        let mut desc = two_layer_board();
        for (center, radius) in holes {
            desc.through_holes
                .outer
                .push(ShapeDescription::circle(*center, *radius));
        }
        Board::from_description(desc).unwrap()
    }

    #[test]
    fn test_outline_pieces_cover_board() {
        let board = board_with_holes(&[]);
        let mut scene = SceneContainer::new(board.arena().clone());
        let pieces = build_outline(&mut scene, &board);
        assert!(!pieces.fragments.is_empty());
        assert!(!pieces.anti_outline.is_empty());

        let inside = Point2::new(10.0, 5.0);
        let outside = Point2::new(20.5, 5.0);
        let arena = scene.arena();
        assert!(pieces.fragments.iter().any(|&f| arena.contains(f, &inside)));
        assert!(!pieces.fragments.iter().any(|&f| arena.contains(f, &outside)));
        assert!(pieces.anti_outline.ids().iter().any(|&f| arena.contains(f, &outside)));
        assert!(!pieces.anti_outline.ids().iter().any(|&f| arena.contains(f, &inside)));
    }

    #[test]
    fn test_edge_hole_gets_no_cylinder() {
        // one hole well inside, one straddling the right edge
        let board = board_with_holes(&[([10.0, 5.0], 0.5), ([20.0, 5.0], 0.5)]);
        let mut scene = SceneContainer::new(board.arena().clone());
        let pieces = build_outline(&mut scene, &board);
        let epoxy = material(&mut scene);
        let stats = add_board_body(&mut scene, &board, &pieces, epoxy, Rgb::gray(0.3));
        assert_eq!(stats.cylinders, 1);

        let cylinder = scene
            .objects()
            .iter()
            .find_map(|o| match &o.primitive {
                Primitive::VerticalCylinder { center, radius, z_min, z_max } => {
                    Some((*center, *radius, *z_min, *z_max))
                }
                _ => None,
            })
            .unwrap();
        assert_relative_eq!(cylinder.0, Point2::new(10.0, 5.0));
        assert_relative_eq!(cylinder.1, 0.5 * 0.999);
        assert!(cylinder.2 > -0.8 && cylinder.3 < 0.8);
    }

    #[test]
    fn test_body_is_cut_by_holes() {
        let board = board_with_holes(&[([10.0, 5.0], 0.5)]);
        let mut scene = SceneContainer::new(board.arena().clone());
        let pieces = build_outline(&mut scene, &board);
        let epoxy = material(&mut scene);
        add_board_body(&mut scene, &board, &pieces, epoxy, Rgb::gray(0.3));
        scene.build_bvh(4, SplitPolicy::Middle);

        let down = Vec3::new(0.0, 0.0, -1.0);
        let solid = scene.intersect(&Ray::new(Point3::new(5.0, 5.0, 5.0), down), 0.0, f64::INFINITY);
        assert_relative_eq!(solid.unwrap().point.z, 0.8, epsilon = 1e-9);
        // through the hole the ray meets only the cylinder wall, never a cap
        let hole = scene.intersect(&Ray::new(Point3::new(10.0, 5.0, 5.0), down), 0.0, f64::INFINITY);
        assert!(hole.is_none());
        // outside the board
        let off = scene.intersect(&Ray::new(Point3::new(25.0, 5.0, 5.0), down), 0.0, f64::INFINITY);
        assert!(off.is_none());
    }

    #[test]
    fn test_backdrop_needs_content() {
        let board = board_with_holes(&[]);
        let mut scene = SceneContainer::new(board.arena().clone());
        let floor = material(&mut scene);
        assert_eq!(add_backdrop(&mut scene, &board, floor, Rgb::gray(0.5)), 0);

        let pieces = build_outline(&mut scene, &board);
        add_board_body(&mut scene, &board, &pieces, floor, Rgb::gray(0.3));
        let before = *scene.bbox();
        assert_eq!(add_backdrop(&mut scene, &board, floor, Rgb::gray(0.5)), 4);
        assert_eq!(scene.count_by_kind().get(&PrimitiveKind::Triangle), Some(&4));
        assert!(scene.bbox().min.z < before.min.z);
        assert!(scene.bbox().max.z > before.max.z);
        // 4 board sizes either way
        assert_relative_eq!(scene.bbox().extent().x, 8.0 * 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lights_skip_dark_colors() {
        let board = board_with_holes(&[]);
        let mut scene = SceneContainer::new(board.arena().clone());
        let mut settings = SceneSettings::default();
        settings.lights.bottom = Rgb::gray(0.001);
        settings.lights.directional = vec![
            DirectionalLightSettings {
                color: Rgb::gray(0.5),
                elevation: 90.0,
                azimuth: 0.0,
            },
            DirectionalLightSettings {
                color: Rgb::BLACK,
                elevation: 0.0,
                azimuth: 0.0,
            },
        ];
        assert_eq!(add_lights(&mut scene, &board, &settings), 3);
        let lights = scene.lights();
        assert!(matches!(lights[0], Light::Camera { .. }));
        match &lights[1] {
            Light::Point { position, .. } => {
                assert_relative_eq!(*position, Point3::new(10.0, 5.0, 40.0));
            }
            other => panic!("unexpected {other:?}"),
        }
        match &lights[2] {
            // elevation 90 is straight above the board
            Light::Directional { direction, .. } => {
                assert_relative_eq!(*direction, Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
