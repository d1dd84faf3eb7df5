//! Layer, plated-pad and solder-mask passes.

use boardray_shapes::Container2d;
use tracing::debug;

use crate::board::Board;
use crate::compositor::{composite_pass, LayerPass, PassStats, Source};
use crate::layer::{LayerId, Side};
use crate::materials::{layer_appearance, mask_color, BoardMaterial, BoardMaterialIds};
use crate::settings::SceneSettings;

/// Fraction of the copper thickness plated pads rise above their layer.
pub const PLATED_PAD_LIFT: f64 = 0.1;

/// Subtract sources for shapes drawn on `layer`.
///
/// Paste keeps its holes: the drill and through-hole steps are left out.
pub fn layer_sources<'a>(
    board: &'a Board,
    layer: LayerId,
    settings: &SceneSettings,
    anti_outline: &'a Container2d,
) -> Vec<Source<'a>> {
    let flags = &settings.flags;
    let mut sources = Vec::new();

    if !layer.is_paste() {
        if let Some(l) = board.layer(layer) {
            sources.push(Source::Overlapping(&l.holes));
        }
        let th = board.through_holes();
        let through = if flags.clip_silk_on_via_annulus && flags.realistic_mode && layer.is_silkscreen() {
            &th.outer_ring
        } else {
            &th.outer
        };
        sources.push(Source::Overlapping(through));
    }

    sources.push(Source::Overlapping(anti_outline));

    if flags.subtract_mask_from_silk && flags.realistic_mode {
        if let Some(mask) = layer.silkscreen_mask().and_then(|m| board.layer(m)) {
            sources.push(Source::Overlapping(&mask.shapes));
        }
    }
    sources
}

/// Extrude every non-mask layer. With `copper_only` the other layers are
/// left out.
pub fn add_layers(
    scene: &mut boardray_raytrace::SceneContainer,
    board: &Board,
    settings: &SceneSettings,
    anti_outline: &Container2d,
    materials: &BoardMaterialIds,
    copper_only: bool,
) -> PassStats {
    let mut stats = PassStats::default();
    for (&id, layer) in board.layers() {
        if id.is_mask() || (copper_only && !id.is_copper()) {
            continue;
        }
        let positives = layer.shapes.ids();
        if positives.is_empty() {
            continue;
        }
        let (material, color) = layer_appearance(id, settings);
        let pass = composite_pass(
            scene,
            &LayerPass {
                positives,
                sources: layer_sources(board, id, settings, anti_outline),
                bottom: layer.z.bottom,
                top: layer.z.top,
                offset: 0.0,
                material: materials.get(material),
                color: color.to_linear(),
            },
        );
        debug!(layer = %id, plain = pass.plain, composites = pass.composites, "layer extruded");
        stats += pass;
    }
    stats
}

/// Extrude the plated pads of both outer copper layers, lifted slightly
/// clear of the plain copper. Does nothing unless the board is shown
/// realistically with plated pads.
pub fn add_plated_pads(
    scene: &mut boardray_raytrace::SceneContainer,
    board: &Board,
    settings: &SceneSettings,
    anti_outline: &Container2d,
    materials: &BoardMaterialIds,
) -> PassStats {
    let flags = &settings.flags;
    let mut stats = PassStats::default();
    if !(flags.plated_pads_as_plated && flags.realistic_mode) {
        return stats;
    }
    let lift = board.stackup().copper_thickness * PLATED_PAD_LIFT;

    for (side, layer_id, offset) in [
        (Side::Front, LayerId::FrontCopper, lift),
        (Side::Back, LayerId::BackCopper, -lift),
    ] {
        let Some(layer) = board.layer(layer_id) else {
            continue;
        };
        let positives = board.plated_pads(side).ids();
        if positives.is_empty() {
            continue;
        }
        stats += composite_pass(
            scene,
            &LayerPass {
                positives,
                sources: layer_sources(board, layer_id, settings, anti_outline),
                bottom: layer.z.bottom,
                top: layer.z.top,
                offset,
                material: materials.get(BoardMaterial::Copper),
                color: settings.colors.copper.to_linear(),
            },
        );
    }
    stats
}

/// Cover the outline with both solder mask layers, opened where the mask
/// layer has shapes and where through-holes pass.
pub fn add_masks(
    scene: &mut boardray_raytrace::SceneContainer,
    board: &Board,
    settings: &SceneSettings,
    fragments: &[boardray_shapes::ShapeId],
    materials: &BoardMaterialIds,
) -> PassStats {
    let mut stats = PassStats::default();
    if !settings.flags.solder_mask_visible || fragments.is_empty() {
        return stats;
    }
    for (side, id) in [(Side::Back, LayerId::BackMask), (Side::Front, LayerId::FrontMask)] {
        let Some(mask) = board.layer(id) else {
            continue;
        };
        stats += composite_pass(
            scene,
            &LayerPass {
                positives: fragments,
                sources: vec![
                    Source::Intersecting(&board.through_holes().outer),
                    Source::Overlapping(&mask.shapes),
                ],
                bottom: mask.z.bottom,
                top: mask.z.top,
                offset: 0.0,
                material: materials.get(BoardMaterial::SolderMask),
                color: mask_color(side, settings).to_linear(),
            },
        );
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::two_layer_board;
    use crate::board::ShapeDescription;
    use crate::environment::build_outline;
    use crate::materials::BoardMaterials;
    use boardray_math::{Point3, Vec3};
    use boardray_raytrace::{Ray, SceneContainer};
    use boardray_shapes::SplitPolicy;

    fn scene_for(board: &Board, settings: &SceneSettings) -> (SceneContainer, BoardMaterialIds) {
        let mut scene = SceneContainer::new(board.arena().clone());
        let ids = BoardMaterials::new(settings, 1.0).register(&mut scene);
        (scene, ids)
    }

    fn down(scene: &SceneContainer, x: f64, y: f64) -> Option<f64> {
        scene
            .intersect(&Ray::new(Point3::new(x, y, 10.0), Vec3::new(0.0, 0.0, -1.0)), 0.0, f64::INFINITY)
            .map(|h| h.point.z)
    }

    #[test]
    fn test_paste_keeps_holes() {
        let mut desc = two_layer_board();
        desc.through_holes.outer.push(ShapeDescription::circle([5.0, 5.0], 0.5));
        let board = Board::from_description(desc).unwrap();
        let settings = SceneSettings::default();
        let anti = Container2d::empty();

        let paste = layer_sources(&board, LayerId::FrontPaste, &settings, &anti);
        assert_eq!(paste.len(), 1);
        let copper = layer_sources(&board, LayerId::FrontCopper, &settings, &anti);
        assert_eq!(copper.len(), 3);
    }

    #[test]
    fn test_mask_subtraction_only_when_realistic() {
        let board = Board::from_description(two_layer_board()).unwrap();
        let anti = Container2d::empty();
        let mut settings = SceneSettings::default();
        settings.flags.subtract_mask_from_silk = true;
        assert_eq!(layer_sources(&board, LayerId::FrontSilkscreen, &settings, &anti).len(), 3);
        settings.flags.realistic_mode = false;
        assert_eq!(layer_sources(&board, LayerId::FrontSilkscreen, &settings, &anti).len(), 2);
    }

    #[test]
    fn test_copper_track_cut_by_hole() {
        let mut desc = two_layer_board();
        desc.through_holes.outer.push(ShapeDescription::circle([10.0, 5.0], 0.4));
        let board = Board::from_description(desc).unwrap();
        let settings = SceneSettings::default();
        let (mut scene, ids) = scene_for(&board, &settings);

        let stats = add_layers(&mut scene, &board, &settings, &Container2d::empty(), &ids, false);
        assert_eq!(stats, PassStats { plain: 0, composites: 1 });
        scene.build_bvh(2, SplitPolicy::Median);

        assert_eq!(down(&scene, 10.0, 5.0), None);
        let z = down(&scene, 4.0, 5.0).unwrap();
        assert!((z - 0.835).abs() < 1e-9);
    }

    #[test]
    fn test_plated_pads_sit_above_copper() {
        let mut desc = two_layer_board();
        desc.plated_pads.front.push(ShapeDescription::circle([4.0, 2.0], 0.6));
        let board = Board::from_description(desc).unwrap();
        let mut settings = SceneSettings::default();
        let (mut scene, ids) = scene_for(&board, &settings);

        assert_eq!(add_plated_pads(&mut scene, &board, &settings, &Container2d::empty(), &ids).total(), 0);

        settings.flags.plated_pads_as_plated = true;
        let stats = add_plated_pads(&mut scene, &board, &settings, &Container2d::empty(), &ids);
        assert_eq!(stats.total(), 1);
        scene.build_bvh(2, SplitPolicy::Median);
        let z = down(&scene, 4.0, 2.0).unwrap();
        assert!((z - (0.835 + 0.0035)).abs() < 1e-9);
    }

    #[test]
    fn test_mask_opened_over_pad() {
        let mut desc = two_layer_board();
        for layer in &mut desc.layers {
            if layer.layer == LayerId::FrontMask {
                layer.shapes.push(ShapeDescription::circle([15.0, 3.0], 1.0));
            }
        }
        let board = Board::from_description(desc).unwrap();
        let settings = SceneSettings::default();
        let (mut scene, ids) = scene_for(&board, &settings);
        let pieces = build_outline(&mut scene, &board);

        let stats = add_masks(&mut scene, &board, &settings, &pieces.fragments, &ids);
        assert_eq!(stats.total(), 2 * pieces.fragments.len());
        scene.build_bvh(4, SplitPolicy::Median);

        let over_board = down(&scene, 5.0, 8.0).unwrap();
        assert!((over_board - 0.855).abs() < 1e-9);
        // through the opening the ray reaches the back mask
        let through = down(&scene, 15.0, 3.0).unwrap();
        assert!((through - -0.835).abs() < 1e-9);
    }
}
