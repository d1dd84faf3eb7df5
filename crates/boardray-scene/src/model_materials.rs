//! Materials of imported component models.
//!
//! Converting a model's material table is cheap but done for every
//! footprint that uses the model, so the result is memoized per model
//! identity (its content hash). The memo belongs to the assembler and is
//! dropped wholesale when the settings it depends on change.

use std::collections::HashMap;
use std::sync::Arc;

use boardray_math::Rgb;
use boardray_model_cache::{ContentHash, MeshMaterial};
use boardray_raytrace::{Material, NormalPerturbation};
use tracing::debug;

use crate::settings::{MaterialMode, ModelMaterialKey};

/// Matte plastic bump size (mm).
pub const PLASTIC_TEXTURE_MM: f64 = 0.05;
/// Glossy plastic bump size (mm).
pub const PLASTIC_SHINE_TEXTURE_MM: f64 = 0.1;
/// Brushed metal groove size (mm).
pub const BRUSHED_METAL_TEXTURE_MM: f64 = 0.05;

/// Dark plastic: gray level below this.
pub const PLASTIC_MAX_GRAY: f64 = 0.3;
/// Dark plastic: shininess below this.
pub const PLASTIC_MAX_SHININESS: f64 = 0.36;
/// Dark plastic: every channel pair closer than this (near neutral).
pub const PLASTIC_MAX_CHANNEL_SPREAD: f64 = 0.15;
/// Colored plastic: gray level above this.
pub const SHINY_PLASTIC_MIN_GRAY: f64 = 0.3;
/// Colored plastic: shininess below this.
pub const SHINY_PLASTIC_MAX_SHININESS: f64 = 0.30;
/// Colored plastic: some channel pair further apart than this (saturated).
pub const SHINY_PLASTIC_MIN_CHANNEL_SPREAD: f64 = 0.25;
/// Brushed metal: gray level above this.
pub const METAL_MIN_GRAY: f64 = 0.6;
/// Brushed metal: shininess above this.
pub const METAL_MIN_SHININESS: f64 = 0.35;
/// Brushed metal: every channel pair closer than this.
pub const METAL_MAX_CHANNEL_SPREAD: f64 = 0.40;

/// Shininess is in `[0, 1]` in model files; the tracer exponent is this
/// multiple of it.
pub const SHININESS_EXPONENT_SCALE: f64 = 180.0;

/// Ambient level of the flat material used outside [`MaterialMode::Normal`].
pub const FLAT_AMBIENT: f64 = 0.2;

/// Surface guessed from a model material, selecting a normal perturbation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceClass {
    /// Dark, matte, neutral: black plastic bodies.
    Plastic,
    /// Bright, matte, saturated: colored plastic.
    ShinyPlastic,
    /// Bright, shiny, near neutral: pins and cans.
    BrushedMetal,
    /// No guess.
    Unclassified,
}

fn channel_spreads(c: &Rgb) -> [f64; 3] {
    [(c.r - c.g).abs(), (c.b - c.g).abs(), (c.r - c.b).abs()]
}

/// Guess the surface of an opaque material. Transparent materials are
/// never classified.
pub fn classify(material: &MeshMaterial) -> SurfaceClass {
    if material.transparency != 0.0 {
        return SurfaceClass::Unclassified;
    }
    let gray = material.diffuse.gray_value();
    let shin = material.shininess;
    let spreads = channel_spreads(&material.diffuse);

    if gray < PLASTIC_MAX_GRAY
        && shin < PLASTIC_MAX_SHININESS
        && spreads.iter().all(|&s| s < PLASTIC_MAX_CHANNEL_SPREAD)
    {
        SurfaceClass::Plastic
    } else if gray > SHINY_PLASTIC_MIN_GRAY
        && shin < SHINY_PLASTIC_MAX_SHININESS
        && spreads.iter().any(|&s| s > SHINY_PLASTIC_MIN_CHANNEL_SPREAD)
    {
        SurfaceClass::ShinyPlastic
    } else if gray > METAL_MIN_GRAY
        && shin > METAL_MIN_SHININESS
        && spreads.iter().all(|&s| s < METAL_MAX_CHANNEL_SPREAD)
    {
        SurfaceClass::BrushedMetal
    } else {
        SurfaceClass::Unclassified
    }
}

/// Mirror reflection from model shininess:
/// `clamp(sqrt(shininess - 0.35) * 0.40 - 0.05, 0, 0.5)`, zero at or below
/// 0.35.
pub fn reflection_factor(shininess: f64) -> f64 {
    let excess = shininess - 0.35;
    if excess > f64::from(f32::EPSILON) {
        (excess.sqrt() * 0.40 - 0.05).clamp(0.0, 0.5)
    } else {
        0.0
    }
}

/// Transparency of a model triangle: the material transparency combined
/// with the footprint model's opacity.
pub fn combined_transparency(material_transparency: f64, opacity: f64) -> f64 {
    1.0 - (1.0 - material_transparency) * opacity
}

/// Map a diffuse color onto the CAD palette: four gray levels tinted by
/// the color's hue.
pub fn cad_color(diffuse: &Rgb) -> Rgb {
    let level = (4.0 * diffuse.gray_value()).max(0.0).floor();
    let luminance = ((level + 0.5) / 4.0).min(1.0);
    let max = diffuse.max_channel().max(f64::from(f32::EPSILON));
    *diffuse * (0.125 / max) + Rgb::gray(luminance * 0.875)
}

/// Tracer material for one model material slot.
pub fn derive_material(material: &MeshMaterial, key: ModelMaterialKey, units_per_mm: f64) -> Material {
    if key.mode != MaterialMode::Normal {
        return flat_material();
    }
    let base = Material::blinn_phong(
        material.ambient.to_linear(),
        material.emissive.to_linear(),
        material.specular.to_linear(),
        material.shininess * SHININESS_EXPONENT_SCALE,
        material.transparency,
        reflection_factor(material.shininess),
    );
    if !key.procedural_textures {
        return base;
    }
    let perturbation = match classify(material) {
        SurfaceClass::Plastic => Some(NormalPerturbation::Plastic {
            scale: PLASTIC_TEXTURE_MM * units_per_mm,
        }),
        SurfaceClass::ShinyPlastic => Some(NormalPerturbation::PlasticShine {
            scale: PLASTIC_SHINE_TEXTURE_MM * units_per_mm,
        }),
        SurfaceClass::BrushedMetal => Some(NormalPerturbation::BrushedMetal {
            scale: BRUSHED_METAL_TEXTURE_MM * units_per_mm,
        }),
        SurfaceClass::Unclassified => None,
    };
    base.with_perturbation(perturbation)
}

/// The material used when model materials are not rendered in full.
pub fn flat_material() -> Material {
    Material::blinn_phong(Rgb::gray(FLAT_AMBIENT), Rgb::BLACK, Rgb::BLACK, 0.0, 0.0, 0.0)
}

/// Memo of derived model materials, keyed by model content hash.
#[derive(Debug, Default)]
pub struct ModelMaterialCache {
    key: Option<(ModelMaterialKey, u64)>,
    entries: HashMap<ContentHash, Arc<[Material]>>,
    derivations: usize,
}

impl ModelMaterialCache {
    /// An empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the memo valid for `key` and unit scale, dropping every entry
    /// if either differs from what the entries were derived with.
    pub fn prepare(&mut self, key: ModelMaterialKey, units_per_mm: f64) {
        let full_key = (key, units_per_mm.to_bits());
        if self.key != Some(full_key) {
            if !self.entries.is_empty() {
                debug!(entries = self.entries.len(), "model material memo invalidated");
            }
            self.entries.clear();
            self.key = Some(full_key);
        }
    }

    /// Materials of a model, derived on first request.
    ///
    /// # Panics
    ///
    /// Panics if [`prepare`](Self::prepare) was never called.
    pub fn get_or_derive(&mut self, model: &ContentHash, materials: &[MeshMaterial]) -> Arc<[Material]> {
        let Some((key, units_bits)) = self.key else {
            panic!("ModelMaterialCache::prepare must be called before use");
        };
        if let Some(found) = self.entries.get(model) {
            return Arc::clone(found);
        }
        let units_per_mm = f64::from_bits(units_bits);
        let derived: Arc<[Material]> = materials
            .iter()
            .map(|m| derive_material(m, key, units_per_mm))
            .collect();
        self.derivations += 1;
        self.entries.insert(*model, Arc::clone(&derived));
        derived
    }

    /// Number of memoized models.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is memoized.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many material tables were derived since creation.
    pub fn derivations(&self) -> usize {
        self.derivations
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn material(diffuse: Rgb, shininess: f64, transparency: f64) -> MeshMaterial {
        MeshMaterial {
            name: "m".into(),
            diffuse,
            ambient: Rgb::gray(0.1),
            emissive: Rgb::BLACK,
            specular: Rgb::gray(0.5),
            shininess,
            transparency,
        }
    }

    fn normal_key() -> ModelMaterialKey {
        ModelMaterialKey {
            mode: MaterialMode::Normal,
            procedural_textures: true,
        }
    }

    #[test]
    fn test_reflection_factor() {
        assert_eq!(reflection_factor(0.2), 0.0);
        assert_eq!(reflection_factor(0.35), 0.0);
        // sqrt(0.25) * 0.4 - 0.05
        assert_relative_eq!(reflection_factor(0.6), 0.15, epsilon = 1e-12);
        assert_relative_eq!(reflection_factor(10.0), 0.5);
    }

    #[test]
    fn test_combined_transparency() {
        assert_relative_eq!(combined_transparency(0.5, 0.4), 0.8);
        assert_relative_eq!(combined_transparency(0.0, 0.3), 0.7);
        assert_relative_eq!(combined_transparency(0.25, 1.0), 0.25);
        assert_relative_eq!(combined_transparency(0.4, 0.5), 0.7);
    }

    #[test]
    fn test_classifier() {
        assert_eq!(classify(&material(Rgb::gray(0.1), 0.2, 0.0)), SurfaceClass::Plastic);
        assert_eq!(
            classify(&material(Rgb::new(0.9, 0.1, 0.1), 0.1, 0.0)),
            SurfaceClass::ShinyPlastic
        );
        assert_eq!(
            classify(&material(Rgb::new(0.8, 0.8, 0.75), 0.6, 0.0)),
            SurfaceClass::BrushedMetal
        );
        // transparent materials are left alone
        assert_eq!(
            classify(&material(Rgb::gray(0.1), 0.2, 0.5)),
            SurfaceClass::Unclassified
        );
        // bright neutral matte matches nothing
        assert_eq!(
            classify(&material(Rgb::gray(0.5), 0.2, 0.0)),
            SurfaceClass::Unclassified
        );
    }

    #[test]
    fn test_derive_material() {
        let m = derive_material(&material(Rgb::gray(0.1), 0.2, 0.0), normal_key(), 1.0);
        assert_relative_eq!(m.shininess, 0.2 * 180.0);
        assert_eq!(m.perturbation, Some(NormalPerturbation::Plastic { scale: 0.05 }));
        assert_relative_eq!(m.specular.r, Rgb::gray(0.5).to_linear().r);

        let plain = derive_material(
            &material(Rgb::gray(0.1), 0.2, 0.0),
            ModelMaterialKey {
                mode: MaterialMode::Normal,
                procedural_textures: false,
            },
            1.0,
        );
        assert!(plain.perturbation.is_none());

        let flat = derive_material(
            &material(Rgb::gray(0.1), 0.9, 0.3),
            ModelMaterialKey {
                mode: MaterialMode::DiffuseOnly,
                procedural_textures: true,
            },
            1.0,
        );
        assert_eq!(flat, flat_material());
        assert_eq!(flat.ambient, Rgb::gray(0.2));
    }

    #[test]
    fn test_cad_color_quantizes() {
        let a = cad_color(&Rgb::gray(0.30));
        let b = cad_color(&Rgb::gray(0.45));
        // same quarter, same result
        assert_eq!(a, b);
        assert_relative_eq!(a.r, 0.125 + 0.375 * 0.875);
        let c = cad_color(&Rgb::gray(0.9));
        assert!(c.r > a.r);
    }

    #[test]
    fn test_memo_derives_once_per_model() {
        let mut memo = ModelMaterialCache::new();
        memo.prepare(normal_key(), 1.0);
        let hash = ContentHash([7; 20]);
        let mats = vec![material(Rgb::gray(0.1), 0.2, 0.0)];
        let a = memo.get_or_derive(&hash, &mats);
        let b = memo.get_or_derive(&hash, &mats);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memo.derivations(), 1);

        // same key keeps entries
        memo.prepare(normal_key(), 1.0);
        assert_eq!(memo.len(), 1);

        // any change drops everything
        memo.prepare(
            ModelMaterialKey {
                mode: MaterialMode::CadMode,
                procedural_textures: true,
            },
            1.0,
        );
        assert!(memo.is_empty());
        memo.get_or_derive(&hash, &mats);
        assert_eq!(memo.derivations(), 2);
        memo.prepare(
            ModelMaterialKey {
                mode: MaterialMode::CadMode,
                procedural_textures: true,
            },
            2.0,
        );
        assert!(memo.is_empty());
    }
}
