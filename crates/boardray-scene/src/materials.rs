//! Board-layer materials.
//!
//! A pure function of the settings: the table is rebuilt on every reload
//! and registered into the new scene container.

use boardray_math::Rgb;
use boardray_raytrace::{Material, MaterialId, NormalPerturbation, SceneContainer};

use crate::layer::{LayerId, Side};
use crate::settings::SceneSettings;

/// Board weave feature size (mm).
pub const BOARD_TEXTURE_MM: f64 = 0.40;
/// Bare copper grain feature size (mm).
pub const COPPER_TEXTURE_MM: f64 = 4.0;
/// Plated copper feature size (mm).
pub const PLATED_COPPER_TEXTURE_MM: f64 = 0.5;
/// Silkscreen ink feature size (mm).
pub const SILKSCREEN_TEXTURE_MM: f64 = 0.25;

/// Plated copper finish, used for plated pads when they render as plated.
pub const PLATED_COPPER_COLOR: Rgb = Rgb::new(184.0 / 255.0, 115.0 / 255.0, 50.0 / 255.0);

/// Map a gray level and a nominal transparency to the transparency used for
/// a tinted film: bright films stay more opaque.
pub fn transparency_control(gray: f64, transparency: f64) -> f64 {
    let cubed = transparency * transparency * transparency;
    let ca = 1.0 - transparency;
    let ca = 1.0 - 1.05 * ca * ca * ca;
    (gray * ca + cubed).clamp(0.0, 1.0)
}

/// The board material slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoardMaterial {
    /// Plated copper: barrels and plated pads.
    Copper,
    /// Etched copper on copper layers.
    NonPlatedCopper,
    /// Solder paste.
    Paste,
    /// Silkscreen, also used for the technical layers.
    Silkscreen,
    /// Solder mask.
    SolderMask,
    /// Board substrate.
    Epoxy,
    /// Backdrop floor and ceiling.
    Floor,
}

impl BoardMaterial {
    const ALL: [BoardMaterial; 7] = [
        Self::Copper,
        Self::NonPlatedCopper,
        Self::Paste,
        Self::Silkscreen,
        Self::SolderMask,
        Self::Epoxy,
        Self::Floor,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Board materials for one reload.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardMaterials {
    materials: [Material; 7],
}

impl BoardMaterials {
    /// Derive the table from colors and flags. `units_per_mm` scales the
    /// procedural texture sizes.
    pub fn new(settings: &SceneSettings, units_per_mm: f64) -> Self {
        let colors = &settings.colors;
        let textured = settings.flags.procedural_textures;
        let mm = units_per_mm;
        let texture = |p: NormalPerturbation| textured.then_some(p);

        let copper = Material::blinn_phong(
            (colors.copper * 0.3).to_linear(),
            Rgb::BLACK,
            (colors.copper * 0.5 + Rgb::gray(0.25)).clamp(0.0, 1.0).to_linear(),
            0.4 * 128.0,
            0.0,
            0.0,
        )
        .with_perturbation(texture(NormalPerturbation::PlatedCopper {
            scale: PLATED_COPPER_TEXTURE_MM * mm,
        }));

        let non_plated_copper = Material::blinn_phong(
            Rgb::new(0.191, 0.073, 0.022).to_linear(),
            Rgb::BLACK,
            Rgb::new(0.256, 0.137, 0.086),
            0.15 * 128.0,
            0.0,
            0.0,
        )
        .with_perturbation(texture(NormalPerturbation::Copper {
            scale: COPPER_TEXTURE_MM * mm,
            board_scale: BOARD_TEXTURE_MM * mm,
        }));

        let paste_lin = colors.solder_paste.to_linear();
        let paste_sq = paste_lin.modulate(&paste_lin);
        let paste = Material::blinn_phong(paste_sq, Rgb::BLACK, paste_sq, 0.10 * 128.0, 0.0, 0.0);

        let silkscreen = Material::blinn_phong(
            Rgb::gray(0.11).to_linear(),
            Rgb::BLACK,
            (Rgb::gray(1.0) - colors.silkscreen_top.to_linear()).clamp(0.0, 0.10),
            0.078125 * 128.0,
            0.0,
            0.0,
        )
        .with_perturbation(texture(NormalPerturbation::Silkscreen {
            scale: SILKSCREEN_TEXTURE_MM * mm,
        }));

        // both faces share the front mask parameters
        let mask = colors.solder_mask_top;
        let mask_gray = mask.rgb().gray_value();
        let solder_mask = Material::blinn_phong(
            mask.rgb().to_linear() * 0.10,
            Rgb::BLACK,
            Rgb::gray((mask_gray * 2.0).clamp(0.25, 1.0)),
            0.85 * 128.0,
            transparency_control(mask_gray, 1.0 - mask.a),
            0.16,
        )
        .with_shadows(true)
        .with_perturbation(texture(NormalPerturbation::SolderMask {
            board_scale: BOARD_TEXTURE_MM * mm,
        }));

        let epoxy = Material::blinn_phong(
            Rgb::from_u8(16, 14, 10).to_linear(),
            Rgb::BLACK,
            Rgb::from_u8(10, 8, 10).to_linear(),
            0.1 * 128.0,
            1.0 - colors.board_body.a,
            0.0,
        )
        .with_absorbance(10.0)
        .with_perturbation(texture(NormalPerturbation::Board {
            scale: BOARD_TEXTURE_MM * mm,
        }));

        let bg_top = colors.background_top.to_linear();
        let floor = Material::blinn_phong(
            bg_top * 0.125,
            Rgb::BLACK,
            (Rgb::gray(1.0) - bg_top) * (1.0 / 3.0),
            0.10 * 128.0,
            0.0,
            0.50,
        )
        .with_shadows(false);

        Self {
            materials: [
                copper,
                non_plated_copper,
                paste,
                silkscreen,
                solder_mask,
                epoxy,
                floor,
            ],
        }
    }

    /// One material.
    pub fn get(&self, which: BoardMaterial) -> &Material {
        &self.materials[which.slot()]
    }

    /// Add every material to `scene`.
    pub fn register(&self, scene: &mut SceneContainer) -> BoardMaterialIds {
        BoardMaterialIds(BoardMaterial::ALL.map(|m| scene.add_material(self.get(m).clone())))
    }
}

/// Container ids of a registered [`BoardMaterials`] table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardMaterialIds([MaterialId; 7]);

impl BoardMaterialIds {
    /// Id of one slot.
    pub fn get(&self, which: BoardMaterial) -> MaterialId {
        self.0[which.slot()]
    }
}

/// Material slot and sRGB color of items on a non-mask layer.
pub fn layer_appearance(layer: LayerId, settings: &SceneSettings) -> (BoardMaterial, Rgb) {
    let realistic = settings.flags.realistic_mode;
    let colors = &settings.colors;
    let technical = || colors.technical.layer_color(layer);
    match layer {
        LayerId::FrontPaste | LayerId::BackPaste => (
            BoardMaterial::Paste,
            if realistic {
                colors.solder_paste
            } else {
                technical()
            },
        ),
        LayerId::FrontSilkscreen => (
            BoardMaterial::Silkscreen,
            if realistic {
                colors.silkscreen_top
            } else {
                technical()
            },
        ),
        LayerId::BackSilkscreen => (
            BoardMaterial::Silkscreen,
            if realistic {
                colors.silkscreen_bottom
            } else {
                technical()
            },
        ),
        LayerId::FrontCopper | LayerId::InnerCopper(_) | LayerId::BackCopper => {
            let color = match (realistic, settings.flags.plated_pads_as_plated) {
                (true, true) => PLATED_COPPER_COLOR,
                (true, false) => colors.copper,
                (false, _) => technical(),
            };
            (BoardMaterial::NonPlatedCopper, color)
        }
        _ => (BoardMaterial::Silkscreen, Rgb::BLACK),
    }
}

/// sRGB color of a solder mask layer.
pub fn mask_color(side: Side, settings: &SceneSettings) -> Rgb {
    let colors = &settings.colors;
    match (settings.flags.realistic_mode, side) {
        (true, Side::Front) => colors.solder_mask_top.rgb(),
        (true, Side::Back) => colors.solder_mask_bottom.rgb(),
        (false, Side::Front) => colors.technical.layer_color(LayerId::FrontMask),
        (false, Side::Back) => colors.technical.layer_color(LayerId::BackMask),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use boardray_math::Rgba;
    use boardray_shapes::ShapeArena;

    #[test]
    fn test_transparency_control_endpoints() {
        // fully opaque film stays opaque whatever its color
        assert_relative_eq!(transparency_control(0.5, 0.0), 0.0, epsilon = 1e-12);
        // fully transparent film is fully transparent
        assert_relative_eq!(transparency_control(0.5, 1.0), 1.0, epsilon = 1e-12);
        let dark = transparency_control(0.1, 0.5);
        let bright = transparency_control(0.9, 0.5);
        assert!(dark < bright);
        assert!((0.0..=1.0).contains(&dark));
    }

    #[test]
    fn test_solder_mask_material() {
        let mut settings = SceneSettings::default();
        settings.colors.solder_mask_top = Rgba::new(0.1, 0.4, 0.1, 0.8);
        let table = BoardMaterials::new(&settings, 1.0);
        let mask = table.get(BoardMaterial::SolderMask);
        assert_relative_eq!(mask.transparency, transparency_control(0.2, 0.2), epsilon = 1e-12);
        assert_relative_eq!(mask.reflection, 0.16);
        assert_relative_eq!(mask.specular.r, 0.4);
        assert!(mask.casts_shadows);
        assert!(matches!(
            mask.perturbation,
            Some(NormalPerturbation::SolderMask { .. })
        ));
    }

    #[test]
    fn test_textures_follow_flag_and_units() {
        let mut settings = SceneSettings::default();
        let table = BoardMaterials::new(&settings, 2.0);
        assert_eq!(
            table.get(BoardMaterial::Epoxy).perturbation,
            Some(NormalPerturbation::Board { scale: 0.8 })
        );
        assert_eq!(table.get(BoardMaterial::Paste).perturbation, None);

        settings.flags.procedural_textures = false;
        let table = BoardMaterials::new(&settings, 2.0);
        for m in BoardMaterial::ALL {
            assert!(table.get(m).perturbation.is_none());
        }
    }

    #[test]
    fn test_epoxy_and_floor() {
        let mut settings = SceneSettings::default();
        settings.colors.board_body.a = 0.75;
        let table = BoardMaterials::new(&settings, 1.0);
        let epoxy = table.get(BoardMaterial::Epoxy);
        assert_relative_eq!(epoxy.transparency, 0.25);
        assert_relative_eq!(epoxy.absorbance, 10.0);
        let floor = table.get(BoardMaterial::Floor);
        assert!(!floor.casts_shadows);
        assert_relative_eq!(floor.reflection, 0.5);
    }

    #[test]
    fn test_layer_appearance() {
        let mut settings = SceneSettings::default();
        let (m, c) = layer_appearance(LayerId::FrontCopper, &settings);
        assert_eq!(m, BoardMaterial::NonPlatedCopper);
        assert_eq!(c, settings.colors.copper);

        settings.flags.plated_pads_as_plated = true;
        assert_eq!(layer_appearance(LayerId::InnerCopper(1), &settings).1, PLATED_COPPER_COLOR);

        let (m, c) = layer_appearance(LayerId::FrontFab, &settings);
        assert_eq!(m, BoardMaterial::Silkscreen);
        assert_eq!(c, Rgb::BLACK);

        settings.flags.realistic_mode = false;
        let (m, c) = layer_appearance(LayerId::BackSilkscreen, &settings);
        assert_eq!(m, BoardMaterial::Silkscreen);
        assert_eq!(c, settings.colors.technical.layer_color(LayerId::BackSilkscreen));
        assert_eq!(
            mask_color(Side::Back, &settings),
            settings.colors.technical.layer_color(LayerId::BackMask)
        );
    }

    #[test]
    fn test_register_assigns_distinct_ids() {
        let table = BoardMaterials::new(&SceneSettings::default(), 1.0);
        let mut scene = SceneContainer::new(ShapeArena::new());
        let ids = table.register(&mut scene);
        assert_eq!(scene.materials().len(), 7);
        assert_ne!(ids.get(BoardMaterial::Copper), ids.get(BoardMaterial::Floor));
        assert_eq!(
            scene.material(ids.get(BoardMaterial::Epoxy)),
            table.get(BoardMaterial::Epoxy)
        );
    }
}
