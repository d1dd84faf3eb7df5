//! Scene lights.

use boardray_math::{Point3, Rgb, Vec3};
use serde::{Deserialize, Serialize};

/// A light source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Light {
    /// Directional light that follows the camera. Its direction is only
    /// known at render time; it never casts shadows.
    Camera {
        /// Linear color.
        color: Rgb,
    },
    /// Light arriving from a fixed direction.
    Directional {
        /// Unit vector pointing from the scene towards the light.
        direction: Vec3,
        /// Linear color.
        color: Rgb,
    },
    /// Omnidirectional light at a point.
    Point {
        /// Light position.
        position: Point3,
        /// Linear color.
        color: Rgb,
    },
}

impl Light {
    /// Color of the light.
    pub fn color(&self) -> Rgb {
        match self {
            Self::Camera { color } | Self::Directional { color, .. } | Self::Point { color, .. } => {
                *color
            }
        }
    }

    /// Whether the light is blocked by occluders.
    pub fn casts_shadows(&self) -> bool {
        !matches!(self, Self::Camera { .. })
    }

    /// Unit vector from `point` towards the light and the distance to it
    /// (infinite for directional lights). `None` for the camera light.
    pub fn towards(&self, point: &Point3) -> Option<(Vec3, f64)> {
        match self {
            Self::Camera { .. } => None,
            Self::Directional { direction, .. } => {
                Some((direction.try_normalize(1e-12)?, f64::INFINITY))
            }
            Self::Point { position, .. } => {
                let d = position - point;
                let dist = d.norm();
                (dist > 1e-12).then(|| (d / dist, dist))
            }
        }
    }
}
