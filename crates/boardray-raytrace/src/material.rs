//! Blinn-Phong materials and procedural normal perturbation.

use boardray_math::{Point3, Rgb, Vec3};
use serde::{Deserialize, Serialize};

/// Index of a material in a [`SceneContainer`](crate::SceneContainer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub(crate) u32);

impl MaterialId {
    /// Position in the material table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Surface parameters consumed by the integrator. Colors are linear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Ambient color.
    pub ambient: Rgb,
    /// Emissive color.
    pub emissive: Rgb,
    /// Specular color.
    pub specular: Rgb,
    /// Blinn-Phong exponent.
    pub shininess: f64,
    /// 0 = opaque, 1 = invisible.
    pub transparency: f64,
    /// Mirror reflection weight in `[0, 1]`.
    pub reflection: f64,
    /// Light absorbed per unit of distance travelled inside the material.
    pub absorbance: f64,
    /// Whether objects with this material occlude lights.
    pub casts_shadows: bool,
    /// Procedural bump applied to shading normals.
    pub perturbation: Option<NormalPerturbation>,
}

impl Material {
    /// A Blinn-Phong material that casts shadows and has no bump.
    pub fn blinn_phong(
        ambient: Rgb,
        emissive: Rgb,
        specular: Rgb,
        shininess: f64,
        transparency: f64,
        reflection: f64,
    ) -> Self {
        Self {
            ambient,
            emissive,
            specular,
            shininess,
            transparency: transparency.clamp(0.0, 1.0),
            reflection: reflection.clamp(0.0, 1.0),
            absorbance: 0.0,
            casts_shadows: true,
            perturbation: None,
        }
    }

    /// Attach a normal perturbation.
    pub fn with_perturbation(mut self, perturbation: Option<NormalPerturbation>) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Set whether the material occludes lights.
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    /// Set the absorbance.
    pub fn with_absorbance(mut self, absorbance: f64) -> Self {
        self.absorbance = absorbance;
        self
    }

    /// Normal used for shading at `point`: the geometric normal, bumped if
    /// the material has a perturbation.
    pub fn shading_normal(&self, point: &Point3, normal: &Vec3) -> Vec3 {
        match &self.perturbation {
            Some(p) => p.perturb(point, normal),
            None => *normal,
        }
    }
}

/// Procedural surface textures. `scale` is the feature size in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NormalPerturbation {
    /// Woven glass fibre of the board substrate.
    Board {
        /// Feature size.
        scale: f64,
    },
    /// Bare etched copper, riding on the board texture.
    Copper {
        /// Feature size of the copper grain.
        scale: f64,
        /// Feature size of the underlying board weave.
        board_scale: f64,
    },
    /// Electroplated copper.
    PlatedCopper {
        /// Feature size.
        scale: f64,
    },
    /// Solder mask, showing the board weave through it.
    SolderMask {
        /// Feature size of the underlying board weave.
        board_scale: f64,
    },
    /// Printed silkscreen ink.
    Silkscreen {
        /// Feature size.
        scale: f64,
    },
    /// Matte plastic.
    Plastic {
        /// Feature size.
        scale: f64,
    },
    /// Glossy plastic.
    PlasticShine {
        /// Feature size.
        scale: f64,
    },
    /// Brushed metal, grooved along X.
    BrushedMetal {
        /// Feature size.
        scale: f64,
    },
}

impl NormalPerturbation {
    /// Bumped unit normal at `point`. Deterministic in its inputs.
    pub fn perturb(&self, point: &Point3, normal: &Vec3) -> Vec3 {
        let offset = match *self {
            Self::Board { scale } => weave(point, scale) * 0.7,
            Self::Copper { scale, board_scale } => {
                bump(point, Vec3::repeat(1.0 / scale), 0.5) + weave(point, board_scale) * 0.2
            }
            Self::PlatedCopper { scale } => bump(point, Vec3::repeat(1.0 / scale), 0.25),
            Self::SolderMask { board_scale } => weave(point, board_scale) * 0.25,
            Self::Silkscreen { scale } => bump(point, Vec3::repeat(1.0 / scale), 0.3),
            Self::Plastic { scale } => bump(point, Vec3::repeat(1.0 / scale), 0.15),
            Self::PlasticShine { scale } => bump(point, Vec3::repeat(1.0 / scale), 0.08),
            Self::BrushedMetal { scale } => {
                // long along X, fine across
                bump(point, Vec3::new(0.02 / scale, 1.0 / scale, 1.0 / scale), 0.35)
            }
        };
        // only the tangential part bends the normal
        let n = normal.try_normalize(1e-12).unwrap_or(*normal);
        let tangential = offset - n * offset.dot(&n);
        (n + tangential).try_normalize(1e-12).unwrap_or(n)
    }
}

fn weave(point: &Point3, scale: f64) -> Vec3 {
    let f = std::f64::consts::TAU / scale.max(1e-9);
    let x = (point.x * f).sin();
    let y = (point.y * f).sin();
    Vec3::new(x * 0.1, y * 0.1, 0.0) + bump(point, Vec3::repeat(2.0 / scale.max(1e-9)), 0.05)
}

fn bump(point: &Point3, freq: Vec3, amplitude: f64) -> Vec3 {
    let p = Vec3::new(point.x * freq.x, point.y * freq.y, point.z * freq.z);
    Vec3::new(
        value_noise(p + Vec3::new(17.3, 0.0, 0.0)),
        value_noise(p + Vec3::new(0.0, 41.9, 0.0)),
        value_noise(p + Vec3::new(0.0, 0.0, 73.1)),
    ) * amplitude
}

/// Smooth lattice noise in `[-1, 1]`.
fn value_noise(p: Vec3) -> f64 {
    let cell = p.map(f64::floor);
    let f = p - cell;
    let s = f.map(|x| x * x * (3.0 - 2.0 * x));
    let (ix, iy, iz) = (cell.x as i64, cell.y as i64, cell.z as i64);

    let corner = |dx: i64, dy: i64, dz: i64| lattice(ix + dx, iy + dy, iz + dz);
    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;

    let x00 = lerp(corner(0, 0, 0), corner(1, 0, 0), s.x);
    let x10 = lerp(corner(0, 1, 0), corner(1, 1, 0), s.x);
    let x01 = lerp(corner(0, 0, 1), corner(1, 0, 1), s.x);
    let x11 = lerp(corner(0, 1, 1), corner(1, 1, 1), s.x);
    let y0 = lerp(x00, x10, s.y);
    let y1 = lerp(x01, x11, s.y);
    lerp(y0, y1, s.z)
}

fn lattice(x: i64, y: i64, z: i64) -> f64 {
    let mut h = (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (y as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
        ^ (z as u64).wrapping_mul(0x1656_67B1_9E37_79F9);
    h ^= h >> 33;
    h = h.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    h ^= h >> 33;
    (h >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_transparency_clamped() {
        let m = Material::blinn_phong(Rgb::BLACK, Rgb::BLACK, Rgb::BLACK, 10.0, 1.5, -0.2);
        assert_relative_eq!(m.transparency, 1.0);
        assert_relative_eq!(m.reflection, 0.0);
        assert!(m.casts_shadows);
    }

    #[test]
    fn test_noise_is_bounded_and_continuous() {
        let mut prev = value_noise(Vec3::new(0.0, 0.3, 0.7));
        for i in 1..2000 {
            let v = value_noise(Vec3::new(i as f64 * 0.01, 0.3, 0.7));
            assert!((-1.0..=1.0).contains(&v));
            assert!((v - prev).abs() < 0.1);
            prev = v;
        }
    }

    #[test]
    fn test_perturbation_keeps_unit_normal_near_original() {
        let kinds = [
            NormalPerturbation::Board { scale: 0.4 },
            NormalPerturbation::Copper { scale: 4.0, board_scale: 0.4 },
            NormalPerturbation::PlatedCopper { scale: 0.5 },
            NormalPerturbation::SolderMask { board_scale: 0.4 },
            NormalPerturbation::Silkscreen { scale: 0.25 },
            NormalPerturbation::Plastic { scale: 0.05 },
            NormalPerturbation::PlasticShine { scale: 0.1 },
            NormalPerturbation::BrushedMetal { scale: 0.05 },
        ];
        let up = Vec3::new(0.0, 0.0, 1.0);
        for kind in kinds {
            for i in 0..50 {
                let p = Point3::new(i as f64 * 0.137, i as f64 * 0.071, 1.6);
                let n = kind.perturb(&p, &up);
                assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
                assert!(n.z > 0.5, "{kind:?} bent the normal too far: {n:?}");
                assert_eq!(n, kind.perturb(&p, &up));
            }
        }
    }

    #[test]
    fn test_shading_normal_without_perturbation() {
        let m = Material::blinn_phong(Rgb::BLACK, Rgb::BLACK, Rgb::BLACK, 10.0, 0.0, 0.0);
        let n = Vec3::new(0.0, 1.0, 0.0);
        assert_eq!(m.shading_normal(&Point3::origin(), &n), n);
    }
}
