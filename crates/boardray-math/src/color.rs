//! Colors.
//!
//! User-facing colors are sRGB; everything handed to the tracer is linear.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// An RGB color with channels nominally in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
}

impl Rgb {
    /// Black.
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    /// Create a color from channels.
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Same value on every channel.
    pub const fn gray(v: f64) -> Self {
        Self { r: v, g: v, b: v }
    }

    /// From 8-bit channels.
    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(r as f64 / 255.0, g as f64 / 255.0, b as f64 / 255.0)
    }

    /// Average of the three channels.
    pub fn gray_value(&self) -> f64 {
        (self.r + self.g + self.b) / 3.0
    }

    /// Largest channel.
    pub fn max_channel(&self) -> f64 {
        self.r.max(self.g).max(self.b)
    }

    /// Clamp each channel into `[lo, hi]`.
    pub fn clamp(&self, lo: f64, hi: f64) -> Self {
        Self::new(self.r.clamp(lo, hi), self.g.clamp(lo, hi), self.b.clamp(lo, hi))
    }

    /// Channel-wise product.
    pub fn modulate(&self, other: &Rgb) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    /// True when every channel is below one 8-bit step.
    pub fn is_near_black(&self) -> bool {
        const STEP: f64 = 1.0 / 255.0;
        self.r < STEP && self.g < STEP && self.b < STEP
    }

    /// Convert from sRGB to linear light.
    pub fn to_linear(&self) -> Self {
        Self::new(srgb_to_linear(self.r), srgb_to_linear(self.g), srgb_to_linear(self.b))
    }
}

impl Add for Rgb {
    type Output = Rgb;
    fn add(self, o: Rgb) -> Rgb {
        Rgb::new(self.r + o.r, self.g + o.g, self.b + o.b)
    }
}

impl Sub for Rgb {
    type Output = Rgb;
    fn sub(self, o: Rgb) -> Rgb {
        Rgb::new(self.r - o.r, self.g - o.g, self.b - o.b)
    }
}

impl Mul<f64> for Rgb {
    type Output = Rgb;
    fn mul(self, s: f64) -> Rgb {
        Rgb::new(self.r * s, self.g * s, self.b * s)
    }
}

/// An RGB color with an alpha (opacity) channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red.
    pub r: f64,
    /// Green.
    pub g: f64,
    /// Blue.
    pub b: f64,
    /// Opacity, 1 = opaque.
    pub a: f64,
}

impl Rgba {
    /// Create a color from channels.
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Drop the alpha channel.
    pub fn rgb(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }
}

/// sRGB transfer function, inverse.
pub fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_srgb_endpoints() {
        assert_relative_eq!(srgb_to_linear(0.0), 0.0);
        assert_relative_eq!(srgb_to_linear(1.0), 1.0, epsilon = 1e-12);
        // mid gray is much darker in linear light
        assert_relative_eq!(srgb_to_linear(0.5), 0.214, epsilon = 1e-3);
    }

    #[test]
    fn test_near_black() {
        assert!(Rgb::gray(0.002).is_near_black());
        assert!(!Rgb::new(0.0, 0.01, 0.0).is_near_black());
    }
}
