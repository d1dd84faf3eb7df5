//! Scene settings: render flags, colors, lights and BVH parameters.
//!
//! Every struct deserializes with `#[serde(default)]`, so a settings file
//! only needs to list what it changes.

use std::collections::BTreeMap;
use std::path::Path;

use boardray_math::{Rgb, Rgba};
use boardray_shapes::SplitPolicy;
use serde::{Deserialize, Serialize};

use crate::board::{FootprintKind, ViaType};
use crate::error::{Result, SceneError};
use crate::layer::LayerId;

/// Boolean render switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderFlags {
    /// Use physical board colors instead of per-layer technical colors.
    pub realistic_mode: bool,
    /// Render the board substrate.
    pub show_board_body: bool,
    /// Render pads on outer copper with a plated finish.
    pub plated_pads_as_plated: bool,
    /// Clip silkscreen at the outer edge of annular rings.
    pub clip_silk_on_via_annulus: bool,
    /// Remove silkscreen where the solder mask is open.
    pub subtract_mask_from_silk: bool,
    /// Attach procedural normal perturbations to materials.
    pub procedural_textures: bool,
    /// Add a floor and ceiling around the board.
    pub backfloor: bool,
    /// Render the solder mask layers.
    pub solder_mask_visible: bool,
    /// Show models of through-hole footprints.
    pub show_through_hole_models: bool,
    /// Show models of SMD footprints.
    pub show_smd_models: bool,
    /// Show models of footprints that are neither.
    pub show_virtual_models: bool,
}

impl Default for RenderFlags {
    fn default() -> Self {
        Self {
            realistic_mode: true,
            show_board_body: true,
            plated_pads_as_plated: false,
            clip_silk_on_via_annulus: false,
            subtract_mask_from_silk: false,
            procedural_textures: true,
            backfloor: false,
            solder_mask_visible: true,
            show_through_hole_models: true,
            show_smd_models: true,
            show_virtual_models: true,
        }
    }
}

impl RenderFlags {
    /// Whether models of a footprint of this kind are shown.
    pub fn shows_footprint(&self, kind: FootprintKind) -> bool {
        match kind {
            FootprintKind::ThroughHole => self.show_through_hole_models,
            FootprintKind::Smd => self.show_smd_models,
            FootprintKind::Virtual => self.show_virtual_models,
        }
    }
}

/// How component model materials are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialMode {
    /// Full material from the model file.
    #[default]
    Normal,
    /// Flat ambient material, diffuse color only.
    DiffuseOnly,
    /// Flat material with diffuse colors quantized to a CAD-like palette.
    CadMode,
}

/// Technical colors used outside realistic mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalColors {
    /// Per-layer overrides of [`TechnicalColors::default_layer_color`].
    pub layers: BTreeMap<LayerId, Rgb>,
    /// Through via barrels.
    pub via_through: Rgb,
    /// Blind and buried via barrels.
    pub via_blind_buried: Rgb,
    /// Micro via barrels.
    pub via_micro: Rgb,
    /// Plated pad barrels.
    pub pad_through_hole: Rgb,
}

impl Default for TechnicalColors {
    fn default() -> Self {
        Self {
            layers: BTreeMap::new(),
            via_through: Rgb::from_u8(236, 236, 236),
            via_blind_buried: Rgb::from_u8(187, 151, 38),
            via_micro: Rgb::from_u8(0, 132, 132),
            pad_through_hole: Rgb::from_u8(227, 183, 46),
        }
    }
}

impl TechnicalColors {
    /// Color of a layer: the override if any, else the built-in one.
    pub fn layer_color(&self, layer: LayerId) -> Rgb {
        self.layers
            .get(&layer)
            .copied()
            .unwrap_or_else(|| Self::default_layer_color(layer))
    }

    /// Built-in technical color of a layer.
    pub fn default_layer_color(layer: LayerId) -> Rgb {
        match layer {
            LayerId::FrontCopper => Rgb::from_u8(200, 52, 52),
            LayerId::InnerCopper(n) => match n % 4 {
                1 => Rgb::from_u8(127, 200, 127),
                2 => Rgb::from_u8(206, 125, 44),
                3 => Rgb::from_u8(79, 203, 203),
                _ => Rgb::from_u8(219, 98, 139),
            },
            LayerId::BackCopper => Rgb::from_u8(77, 127, 196),
            LayerId::FrontAdhesive => Rgb::from_u8(132, 0, 132),
            LayerId::BackAdhesive => Rgb::from_u8(0, 0, 132),
            LayerId::FrontPaste => Rgb::from_u8(180, 160, 154),
            LayerId::BackPaste => Rgb::from_u8(0, 194, 194),
            LayerId::FrontSilkscreen => Rgb::from_u8(242, 237, 161),
            LayerId::BackSilkscreen => Rgb::from_u8(232, 178, 167),
            LayerId::FrontMask => Rgb::from_u8(216, 100, 255),
            LayerId::BackMask => Rgb::from_u8(2, 255, 238),
            LayerId::Drawings => Rgb::from_u8(194, 194, 194),
            LayerId::Comments => Rgb::from_u8(89, 148, 220),
            LayerId::Eco1 => Rgb::from_u8(180, 219, 210),
            LayerId::Eco2 => Rgb::from_u8(216, 200, 82),
            LayerId::EdgeCuts => Rgb::from_u8(208, 210, 205),
            LayerId::Margin => Rgb::from_u8(255, 38, 226),
            LayerId::FrontCourtyard => Rgb::from_u8(255, 38, 226),
            LayerId::BackCourtyard => Rgb::from_u8(38, 233, 255),
            LayerId::FrontFab => Rgb::from_u8(175, 175, 175),
            LayerId::BackFab => Rgb::from_u8(88, 93, 132),
        }
    }

    /// Barrel color of a via.
    pub fn via_color(&self, via_type: ViaType) -> Rgb {
        match via_type {
            ViaType::Through => self.via_through,
            ViaType::BlindBuried => self.via_blind_buried,
            ViaType::Micro => self.via_micro,
        }
    }
}

/// Board colors in sRGB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardColors {
    /// Background at the top of the view; also the floor color.
    pub background_top: Rgb,
    /// Background at the bottom of the view.
    pub background_bottom: Rgb,
    /// Board substrate; alpha is its opacity.
    pub board_body: Rgba,
    /// Copper.
    pub copper: Rgb,
    /// Front silkscreen.
    pub silkscreen_top: Rgb,
    /// Back silkscreen.
    pub silkscreen_bottom: Rgb,
    /// Front solder mask; alpha is its opacity.
    pub solder_mask_top: Rgba,
    /// Back solder mask.
    pub solder_mask_bottom: Rgba,
    /// Solder paste.
    pub solder_paste: Rgb,
    /// Colors outside realistic mode.
    pub technical: TechnicalColors,
}

impl Default for BoardColors {
    fn default() -> Self {
        Self {
            background_top: Rgb::new(0.8, 0.8, 0.9),
            background_bottom: Rgb::new(0.4, 0.4, 0.5),
            board_body: Rgba::new(51.0 / 255.0, 43.0 / 255.0, 22.0 / 255.0, 0.9),
            copper: Rgb::from_u8(184, 115, 50),
            silkscreen_top: Rgb::from_u8(241, 241, 241),
            silkscreen_bottom: Rgb::from_u8(241, 241, 241),
            solder_mask_top: Rgba::new(20.0 / 255.0, 51.0 / 255.0, 36.0 / 255.0, 0.83),
            solder_mask_bottom: Rgba::new(20.0 / 255.0, 51.0 / 255.0, 36.0 / 255.0, 0.83),
            solder_paste: Rgb::from_u8(230, 230, 230),
            technical: TechnicalColors::default(),
        }
    }
}

/// One directional light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLightSettings {
    /// Color; a near-black color disables the light.
    pub color: Rgb,
    /// Elevation in degrees, `[-90, 90]`.
    pub elevation: f64,
    /// Azimuth in degrees.
    pub azimuth: f64,
}

impl DirectionalLightSettings {
    /// Spherical coordinates as fractions of pi: `((elevation + 90) / 180,
    /// azimuth / 180)`.
    pub fn spherical(&self) -> (f64, f64) {
        ((self.elevation + 90.0) / 180.0, self.azimuth / 180.0)
    }
}

/// Scene lights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    /// Headlight following the camera.
    pub camera: Rgb,
    /// Point light above the board.
    pub top: Rgb,
    /// Point light below the board.
    pub bottom: Rgb,
    /// Fixed directional lights.
    pub directional: Vec<DirectionalLightSettings>,
}

impl Default for LightSettings {
    fn default() -> Self {
        let directional = [45.0, 135.0, 225.0, 315.0]
            .into_iter()
            .flat_map(|azimuth| {
                [67.0, -67.0].map(|elevation| DirectionalLightSettings {
                    color: Rgb::gray(0.168),
                    elevation,
                    azimuth,
                })
            })
            .collect();
        Self {
            camera: Rgb::gray(0.2),
            top: Rgb::gray(0.247),
            bottom: Rgb::gray(0.247),
            directional,
        }
    }
}

/// Top-level BVH parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhSettings {
    /// Maximum objects per leaf.
    pub leaf_size: usize,
    /// Split policy.
    pub split: SplitPolicy,
}

impl Default for BvhSettings {
    fn default() -> Self {
        Self {
            leaf_size: 8,
            split: SplitPolicy::Middle,
        }
    }
}

/// Settings that shape model materials. When they change the model
/// material memo is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelMaterialKey {
    /// Material mode.
    pub mode: MaterialMode,
    /// Procedural textures flag.
    pub procedural_textures: bool,
}

/// Everything that configures a scene reload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Model material mode.
    pub material_mode: MaterialMode,
    /// Render switches.
    pub flags: RenderFlags,
    /// Colors.
    pub colors: BoardColors,
    /// Lights.
    pub lights: LightSettings,
    /// Top-level BVH.
    pub bvh: BvhSettings,
}

fn check_unit(name: &str, v: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&v) {
        return Err(SceneError::InvalidSettings(format!(
            "{name} must be between 0 and 1"
        )));
    }
    Ok(())
}

fn check_rgb(name: &str, c: &Rgb) -> Result<()> {
    for v in [c.r, c.g, c.b] {
        check_unit(name, v)?;
    }
    Ok(())
}

fn check_rgba(name: &str, c: &Rgba) -> Result<()> {
    for v in [c.r, c.g, c.b, c.a] {
        check_unit(name, v)?;
    }
    Ok(())
}

impl SceneSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.bvh.leaf_size == 0 {
            return Err(SceneError::InvalidSettings(
                "bvh.leaf_size must be at least 1".into(),
            ));
        }
        let c = &self.colors;
        for (name, rgb) in [
            ("colors.background_top", &c.background_top),
            ("colors.background_bottom", &c.background_bottom),
            ("colors.copper", &c.copper),
            ("colors.silkscreen_top", &c.silkscreen_top),
            ("colors.silkscreen_bottom", &c.silkscreen_bottom),
            ("colors.solder_paste", &c.solder_paste),
            ("colors.technical.via_through", &c.technical.via_through),
            ("colors.technical.via_blind_buried", &c.technical.via_blind_buried),
            ("colors.technical.via_micro", &c.technical.via_micro),
            ("colors.technical.pad_through_hole", &c.technical.pad_through_hole),
        ] {
            check_rgb(name, rgb)?;
        }
        for (layer, rgb) in &c.technical.layers {
            check_rgb(&format!("colors.technical.layers.{layer}"), rgb)?;
        }
        for (name, rgba) in [
            ("colors.board_body", &c.board_body),
            ("colors.solder_mask_top", &c.solder_mask_top),
            ("colors.solder_mask_bottom", &c.solder_mask_bottom),
        ] {
            check_rgba(name, rgba)?;
        }
        let l = &self.lights;
        for (name, rgb) in [
            ("lights.camera", &l.camera),
            ("lights.top", &l.top),
            ("lights.bottom", &l.bottom),
        ] {
            check_rgb(name, rgb)?;
        }
        for d in &l.directional {
            check_rgb("lights.directional.color", &d.color)?;
            if !(-90.0..=90.0).contains(&d.elevation) {
                return Err(SceneError::InvalidSettings(
                    "lights.directional.elevation must be between -90 and 90".into(),
                ));
            }
            if !d.azimuth.is_finite() {
                return Err(SceneError::InvalidSettings(
                    "lights.directional.azimuth must be finite".into(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate TOML settings.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and validate a TOML settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SceneError::InvalidSettings(format!("cannot serialize: {e}")))
    }

    /// The part of the settings model materials depend on.
    pub fn model_material_key(&self) -> ModelMaterialKey {
        ModelMaterialKey {
            mode: self.material_mode,
            procedural_textures: self.flags.procedural_textures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_defaults_are_valid() {
        let s = SceneSettings::default();
        s.validate().unwrap();
        assert_eq!(s.bvh.leaf_size, 8);
        assert_eq!(s.bvh.split, SplitPolicy::Middle);
        assert_eq!(s.lights.directional.len(), 8);
        assert!(s.flags.realistic_mode);
    }

    #[test]
    fn test_partial_toml() {
        let s = SceneSettings::from_toml_str(
            r#"
            material_mode = "cad_mode"

            [flags]
            backfloor = true
            realistic_mode = false

            [colors.technical.layers]
            "F.Cu" = { r = 1.0, g = 0.0, b = 0.0 }

            [bvh]
            split = "sah"
            "#,
        )
        .unwrap();
        assert!(s.flags.backfloor);
        assert!(!s.flags.realistic_mode);
        assert!(s.flags.show_board_body);
        assert_eq!(s.material_mode, MaterialMode::CadMode);
        assert_eq!(s.bvh.split, SplitPolicy::Sah);
        assert_eq!(s.bvh.leaf_size, 8);
        assert_eq!(
            s.colors.technical.layer_color(LayerId::FrontCopper),
            Rgb::new(1.0, 0.0, 0.0)
        );
        assert_eq!(
            s.colors.technical.layer_color(LayerId::BackCopper),
            TechnicalColors::default_layer_color(LayerId::BackCopper)
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut s = SceneSettings::default();
        s.bvh.leaf_size = 0;
        assert!(matches!(s.validate(), Err(SceneError::InvalidSettings(_))));

        let mut s = SceneSettings::default();
        s.colors.solder_mask_top.a = 1.5;
        assert!(s.validate().is_err());

        let mut s = SceneSettings::default();
        s.lights.directional[0].elevation = 120.0;
        assert!(s.validate().is_err());

        assert!(matches!(
            SceneSettings::from_toml_str("flags = 3"),
            Err(SceneError::Toml(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut s = SceneSettings::default();
        s.flags.backfloor = true;
        s.colors
            .technical
            .layers
            .insert(LayerId::InnerCopper(2), Rgb::gray(0.5));
        let text = s.to_toml_string().unwrap();
        assert_eq!(SceneSettings::from_toml_str(&text).unwrap(), s);
    }

    #[test]
    fn test_spherical_coordinates() {
        let d = DirectionalLightSettings {
            color: Rgb::gray(0.1),
            elevation: 90.0,
            azimuth: 90.0,
        };
        let (theta, phi) = d.spherical();
        assert_relative_eq!(theta, 1.0);
        assert_relative_eq!(phi, 0.5);
    }

    #[test]
    fn test_footprint_visibility() {
        let mut flags = RenderFlags::default();
        flags.show_smd_models = false;
        assert!(flags.shows_footprint(FootprintKind::ThroughHole));
        assert!(!flags.shows_footprint(FootprintKind::Smd));
    }

    #[test]
    fn test_material_key_tracks_mode_and_textures() {
        let a = SceneSettings::default();
        let mut b = a.clone();
        b.colors.copper = Rgb::gray(0.3);
        assert_eq!(a.model_material_key(), b.model_material_key());
        b.flags.procedural_textures = false;
        assert_ne!(a.model_material_key(), b.model_material_key());
    }

    #[test]
    fn test_material_keys_are_hashable() {
        use std::collections::HashSet;

        let mut keys = HashSet::new();
        for mode in [MaterialMode::Normal, MaterialMode::DiffuseOnly, MaterialMode::CadMode] {
            for procedural_textures in [true, false] {
                keys.insert(ModelMaterialKey { mode, procedural_textures });
            }
        }
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&SceneSettings::default().model_material_key()));
    }
}
